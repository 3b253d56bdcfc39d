//! Raster tile addressing for the base map.
//!
//! Web mercator math to find which `{z}/{x}/{y}` tiles cover a viewport and
//! to expand the provider's URL template for each of them.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::config::TileLayerConfig;
use crate::{Bounds, LatLng};

/// Tile size in pixels (256 is standard)
pub const TILE_SIZE: u32 = 256;

/// Web mercator latitude limit
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Deepest zoom served by common raster tile providers
pub const MAX_ZOOM: u8 = 22;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

// ============================================================================
// Web Mercator Math
// ============================================================================

/// Convert longitude to tile X coordinate at given zoom
#[inline]
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    (lon + 180.0) / 360.0 * n
}

/// Convert latitude to tile Y coordinate at given zoom
#[inline]
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n
}

/// Convert tile X coordinate to longitude
#[inline]
pub fn tile_x_to_lon(x: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    x / n * 360.0 - 180.0
}

/// Convert tile Y coordinate to latitude
#[inline]
pub fn tile_y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = 2.0_f64.powi(zoom as i32);
    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    lat_rad.to_degrees()
}

/// Get the WGS84 bounds of a tile
pub fn tile_bounds(tile: TileCoord) -> Bounds {
    Bounds {
        min_lng: tile_x_to_lon(tile.x as f64, tile.z),
        max_lng: tile_x_to_lon((tile.x + 1) as f64, tile.z),
        max_lat: tile_y_to_lat(tile.y as f64, tile.z), // Y is inverted in web mercator
        min_lat: tile_y_to_lat((tile.y + 1) as f64, tile.z),
    }
}

/// Tile containing a point.
pub fn tile_for_point(point: &LatLng, zoom: u8) -> TileCoord {
    let zoom = zoom.min(MAX_ZOOM);
    let max_index = (1u32 << zoom) - 1;
    let x = lon_to_tile_x(point.lng, zoom).floor().max(0.0) as u32;
    let y = lat_to_tile_y(point.lat, zoom).floor().max(0.0) as u32;
    TileCoord {
        z: zoom,
        x: x.min(max_index),
        y: y.min(max_index),
    }
}

/// Tiles covering a `width` x `height` pixel viewport centered on `center`.
///
/// Columns wrap around the antimeridian; rows are clamped to the map.
/// Zoom is capped at [`MAX_ZOOM`].
pub fn tiles_for_viewport(center: &LatLng, zoom: u8, width: u32, height: u32) -> Vec<TileCoord> {
    let zoom = zoom.min(MAX_ZOOM);
    let n = 1i64 << zoom;
    let cx = lon_to_tile_x(center.lng, zoom);
    let cy = lat_to_tile_y(center.lat, zoom);
    let half_w = width as f64 / 2.0 / TILE_SIZE as f64;
    let half_h = height as f64 / 2.0 / TILE_SIZE as f64;

    let min_x = (cx - half_w).floor() as i64;
    let max_x = ((cx + half_w).ceil() as i64 - 1).max(min_x);
    let min_y = ((cy - half_h).floor() as i64).clamp(0, n - 1);
    let max_y = ((cy + half_h).ceil() as i64 - 1).clamp(min_y, n - 1);

    // A viewport wider than the world still needs each column once
    let span_x = (max_x - min_x + 1).min(n);

    let mut tiles = Vec::with_capacity((span_x * (max_y - min_y + 1)) as usize);
    for y in min_y..=max_y {
        for x in min_x..min_x + span_x {
            tiles.push(TileCoord {
                z: zoom,
                x: x.rem_euclid(n) as u32,
                y: y as u32,
            });
        }
    }
    tiles
}

impl TileLayerConfig {
    /// Expand the URL template for a tile. The subdomain rotates with `x + y`.
    pub fn tile_url(&self, tile: TileCoord) -> String {
        let subdomain = if self.subdomains.is_empty() {
            ""
        } else {
            let index = (tile.x as usize + tile.y as usize) % self.subdomains.len();
            self.subdomains[index].as_str()
        };
        self.url_template
            .replace("{s}", subdomain)
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
