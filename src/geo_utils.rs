//! Geographic utilities.

use geo::{Distance, Haversine, Point};

use crate::LatLng;

fn to_point(p: &LatLng) -> Point<f64> {
    Point::new(p.lng, p.lat)
}

/// Great-circle distance between two coordinates in meters.
pub fn haversine_distance(a: &LatLng, b: &LatLng) -> f64 {
    Haversine::distance(to_point(a), to_point(b))
}

/// Total length of a polyline in meters.
pub fn path_length(points: &[LatLng]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}
