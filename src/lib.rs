//! # WiFi Finder
//!
//! Application core for a WiFi hotspot finder map.
//!
//! This library provides:
//! - An in-memory spot store with fixed seed spots that follow the user's position
//! - Client-side filtering (search text, free-only, minimum rating, minimum speed)
//! - Map view bookkeeping: markers, popups, idempotent recentering, tile addressing
//! - A route overlay state machine backed by a pluggable routing provider
//! - A creation modal for dropping new spots on the map
//!
//! The host UI (browser shell, mobile app) owns the actual map widget and the
//! platform geolocation service; both are reached through the [`MapSurface`]
//! and [`PositionSource`] traits.
//!
//! ## Features
//!
//! - **`http`** - Enable the OSRM HTTP routing provider
//! - **`ffi`** - Enable FFI bindings for mobile/web hosts
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use wifi_finder::{FilterState, FinderEngine, Fix, LatLng};
//!
//! let mut engine = FinderEngine::new();
//! engine.apply_fix(Fix::new(LatLng::new(10.0, 20.0)));
//!
//! engine.set_filter(FilterState {
//!     free_only: true,
//!     ..FilterState::default()
//! });
//!
//! let view = engine.view();
//! assert_eq!(view.center, LatLng::new(10.0, 20.0));
//! assert!(view.spot_markers.iter().all(|m| m.popup.access == "Free"));
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{FinderError, OptionExt, Result};

// Configuration (center, tiles, route style)
pub mod config;
pub use config::{FinderConfig, RouteStyle, TileLayerConfig};

// Geographic utilities (distance)
pub mod geo_utils;

// WiFi spot records and drafts
pub mod spot;
pub use spot::{SpotDraft, SpotId, WifiSpot};

// In-memory spot store with seed spots and spatial index
pub mod store;
pub use store::SpotStore;

// Filter predicate over spots
pub mod filter;
pub use filter::{filter_spots, rating_threshold, speed_threshold, FilterState};

// Geolocation adapter (position sources and watches)
pub mod geolocation;
pub use geolocation::{
    BridgedPositionSource, Fix, GeoUpdate, GeolocationAdapter, GeolocationError, PositionFeed,
    PositionSource, WatchId,
};

// Web mercator tile addressing
pub mod tiles;
pub use tiles::TileCoord;

// Map view state, markers and the host map surface
pub mod map;
pub use map::{HeadlessSurface, LayerId, MapSurface, MapView, SpotMarker, SpotPopup, UserMarker};

// Routing providers
pub mod routing;
pub use routing::{DirectRouter, RoutePath, RoutingProvider};

// Route overlay state machine
pub mod overlay;
pub use overlay::{RouteKey, RouteOverlay, RouteTicket, RouteView};

// New-spot creation modal
pub mod modal;
pub use modal::CreationModal;

// Stateful finder engine (singleton with all application state)
pub mod engine;
pub use engine::{
    with_engine, AppView, EngineStats, FinderEngine, PromptView, RouteRequest, ENGINE,
};

// OSRM routing over HTTP
#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{OsrmClient, OsrmConfig, OsrmRouter};

// FFI bindings for mobile/web hosts
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("WifiFinderRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use wifi_finder::LatLng;
/// let point = LatLng::new(34.052235, -118.243683); // Los Angeles
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat >= -90.0
            && self.lat <= 90.0
            && self.lng >= -180.0
            && self.lng <= 180.0
    }

    /// Translate by a fixed number of degrees.
    pub fn offset(&self, dlat: f64, dlng: f64) -> Self {
        Self::new(self.lat + dlat, self.lng + dlng)
    }

    /// Validate, returning an error describing the bad coordinate.
    pub fn validated(self) -> Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(FinderError::InvalidCoordinates {
                message: format!("({}, {}) is not a valid lat/lng", self.lat, self.lng),
            })
        }
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from points.
    pub fn from_points(points: &[LatLng]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lng = f64::MAX;
        let mut max_lng = f64::MIN;

        for p in points {
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lng = min_lng.min(p.lng);
            max_lng = max_lng.max(p.lng);
        }

        Some(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Square bounds of `radius_degrees` around a point.
    pub fn around(center: LatLng, radius_degrees: f64) -> Self {
        Self {
            min_lat: center.lat - radius_degrees,
            max_lat: center.lat + radius_degrees,
            min_lng: center.lng - radius_degrees,
            max_lng: center.lng + radius_degrees,
        }
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// Whether the point lies inside (edges inclusive).
    pub fn contains(&self, point: &LatLng) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

// ============================================================================
// Tests
// ============================================================================
