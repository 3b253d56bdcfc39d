//! # Map View
//!
//! The host owns the actual map widget. Rust talks to it through
//! [`MapSurface`], an imperative API in the style of a JS map library
//! (`setView`, add/remove layers), and keeps the declarative parts (markers,
//! popups) as plain data the host renders.
//!
//! Recentering is idempotent: [`MapView::sync`] calls `set_view` only when the
//! requested center differs from the one last applied.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::RouteStyle;
use crate::geo_utils::haversine_distance;
use crate::routing::RoutePath;
use crate::spot::{SpotId, WifiSpot};
use crate::{LatLng, Result};

/// Handle of a layer added to a surface.
pub type LayerId = u64;

/// Imperative map widget.
pub trait MapSurface: Send {
    /// Move the map to a center and zoom.
    fn set_view(&mut self, center: LatLng, zoom: u8) -> Result<()>;

    /// Draw a route line and return its layer handle.
    fn add_route_layer(&mut self, path: &RoutePath, style: &RouteStyle) -> Result<LayerId>;

    /// Remove a previously added layer.
    fn remove_layer(&mut self, layer: LayerId) -> Result<()>;
}

/// In-memory surface for hosts that render from the exported view model.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    view: Option<(LatLng, u8)>,
    layers: Vec<(LayerId, RoutePath)>,
    next_layer: LayerId,
    set_view_calls: u32,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last applied center and zoom.
    pub fn view(&self) -> Option<(LatLng, u8)> {
        self.view
    }

    pub fn layers(&self) -> &[(LayerId, RoutePath)] {
        &self.layers
    }

    pub fn set_view_calls(&self) -> u32 {
        self.set_view_calls
    }
}

impl MapSurface for HeadlessSurface {
    fn set_view(&mut self, center: LatLng, zoom: u8) -> Result<()> {
        self.view = Some((center, zoom));
        self.set_view_calls += 1;
        Ok(())
    }

    fn add_route_layer(&mut self, path: &RoutePath, _style: &RouteStyle) -> Result<LayerId> {
        self.next_layer += 1;
        self.layers.push((self.next_layer, path.clone()));
        Ok(self.next_layer)
    }

    fn remove_layer(&mut self, layer: LayerId) -> Result<()> {
        self.layers.retain(|(id, _)| *id != layer);
        Ok(())
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Requested camera state and what has been pushed to the surface.
#[derive(Debug, Clone)]
pub struct MapView {
    center: LatLng,
    zoom: u8,
    applied: Option<(LatLng, u8)>,
}

impl MapView {
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            center,
            zoom,
            applied: None,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn set_center(&mut self, center: LatLng) {
        self.center = center;
    }

    pub fn set_zoom(&mut self, zoom: u8) {
        self.zoom = zoom;
    }

    /// Whether the surface lags behind the requested view.
    pub fn needs_sync(&self) -> bool {
        self.applied != Some((self.center, self.zoom))
    }

    /// Push the requested view to the surface if it changed.
    ///
    /// Returns true when `set_view` was called and succeeded. A failure is
    /// logged and retried on the next sync.
    pub fn sync(&mut self, surface: &mut dyn MapSurface) -> bool {
        if !self.needs_sync() {
            return false;
        }
        match surface.set_view(self.center, self.zoom) {
            Ok(()) => {
                debug!(
                    "[MapView] Recentered to ({}, {}) z{}",
                    self.center.lat, self.center.lng, self.zoom
                );
                self.applied = Some((self.center, self.zoom));
                true
            }
            Err(e) => {
                warn!("[MapView] set_view failed: {}", e);
                false
            }
        }
    }

    /// Forget what was applied, e.g. after the host recreated its widget.
    pub fn invalidate(&mut self) {
        self.applied = None;
    }
}

// ============================================================================
// Markers
// ============================================================================

/// Popup content of a spot marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPopup {
    pub name: String,
    pub speed: String,
    /// "Free" or "Paid"
    pub access: String,
    pub rating: f64,
    pub reviews: u32,
    /// "Show Route" is offered only once the user's position is known
    pub show_route: bool,
    /// Straight-line distance from the user in meters
    pub distance_m: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotMarker {
    pub id: SpotId,
    pub position: LatLng,
    pub selected: bool,
    pub popup: SpotPopup,
}

impl SpotMarker {
    pub fn for_spot(spot: &WifiSpot, user: Option<LatLng>, selected: Option<SpotId>) -> Self {
        let position = spot.position();
        Self {
            id: spot.id,
            position,
            selected: selected == Some(spot.id),
            popup: SpotPopup {
                name: spot.name.clone(),
                speed: spot.speed.clone(),
                access: spot.access_label().to_string(),
                rating: spot.rating,
                reviews: spot.reviews,
                show_route: user.is_some(),
                distance_m: user.map(|u| haversine_distance(&u, &position)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMarker {
    pub position: LatLng,
    pub popup: String,
}

impl UserMarker {
    pub fn at(position: LatLng) -> Self {
        Self {
            position,
            popup: "You are here".to_string(),
        }
    }
}

/// Markers for the given (already filtered) spots.
pub fn spot_markers(
    spots: &[&WifiSpot],
    user: Option<LatLng>,
    selected: Option<SpotId>,
) -> Vec<SpotMarker> {
    spots
        .iter()
        .map(|spot| SpotMarker::for_spot(spot, user, selected))
        .collect()
}
