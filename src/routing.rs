//! Routing providers.
//!
//! Path computation is delegated: the overlay only needs something that turns
//! an origin and a destination into line geometry, or fails.

use serde::{Deserialize, Serialize};

use crate::geo_utils::path_length;
use crate::{LatLng, Result};

/// Line geometry returned by a routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    pub points: Vec<LatLng>,
    /// Route length in meters
    pub distance_m: f64,
    /// Expected travel time in seconds, when the provider estimates one
    pub duration_s: Option<f64>,
}

impl RoutePath {
    /// Path through `points` with its length measured along the line.
    pub fn from_points(points: Vec<LatLng>) -> Self {
        let distance_m = path_length(&points);
        Self {
            points,
            distance_m,
            duration_s: None,
        }
    }
}

/// Computes a path between two coordinates.
pub trait RoutingProvider: Send + Sync {
    fn route(&self, from: LatLng, to: LatLng) -> Result<RoutePath>;

    /// Short name for log messages.
    fn name(&self) -> &str {
        "routing"
    }
}

/// Straight line from origin to destination.
///
/// Stand-in for hosts without a routing backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRouter;

impl RoutingProvider for DirectRouter {
    fn route(&self, from: LatLng, to: LatLng) -> Result<RoutePath> {
        let from = from.validated()?;
        let to = to.validated()?;
        Ok(RoutePath::from_points(vec![from, to]))
    }

    fn name(&self) -> &str {
        "direct"
    }
}
