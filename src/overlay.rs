//! # Route Overlay
//!
//! Two-state machine for the route line between the user and the selected
//! spot.
//!
//! - **Inactive**: nothing drawn. Holds while either input is missing.
//! - **Active**: a route was requested for a [`RouteKey`]; it may be waiting
//!   for the routing provider, drawn, or failed.
//!
//! Any change of the key tears the current route down before a new one is
//! requested. There is no incremental update. Path computation happens
//! outside the overlay: [`RouteOverlay::take_request`] hands out a
//! [`RouteTicket`] and the result comes back through
//! [`RouteOverlay::complete`], which drops tickets that no longer match.
//! Failures on either side (routing provider, surface layer removal) are
//! logged and swallowed here so the rest of the view keeps working.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RouteStyle;
use crate::map::{LayerId, MapSurface};
use crate::routing::RoutePath;
use crate::{LatLng, Result};

/// Identity of a route: the exact coordinate pair it was built for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RouteKey {
    pub origin: LatLng,
    pub destination: LatLng,
}

impl RouteKey {
    /// Key for the pair, if both ends are present.
    pub fn from_inputs(origin: Option<LatLng>, destination: Option<LatLng>) -> Option<Self> {
        Some(Self {
            origin: origin?,
            destination: destination?,
        })
    }
}

/// One routing request handed out by the overlay.
///
/// `seq` tells apart two requests for the same key, e.g. after the router
/// was swapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteTicket {
    pub key: RouteKey,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
enum RouteState {
    /// Waiting to be handed to a routing provider
    Requested,
    InFlight { seq: u64 },
    Done {
        path: Option<RoutePath>,
        layer: Option<LayerId>,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OverlayState {
    Inactive,
    Active { key: RouteKey, route: RouteState },
}

/// Snapshot of the overlay for the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteView {
    pub active: bool,
    pub key: Option<RouteKey>,
    /// Waiting for the routing provider
    pub pending: bool,
    pub points: Vec<LatLng>,
    pub distance_m: Option<f64>,
    pub duration_s: Option<f64>,
    /// A layer is on the map
    pub drawn: bool,
    /// Last routing or drawing failure for the current key
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct RouteOverlay {
    state: OverlayState,
    builds: u64,
}

impl RouteOverlay {
    pub fn new() -> Self {
        Self {
            state: OverlayState::Inactive,
            builds: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, OverlayState::Active { .. })
    }

    /// Active, with no result yet for the current key.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.state,
            OverlayState::Active {
                route: RouteState::Requested | RouteState::InFlight { .. },
                ..
            }
        )
    }

    pub fn key(&self) -> Option<RouteKey> {
        match &self.state {
            OverlayState::Active { key, .. } => Some(*key),
            OverlayState::Inactive => None,
        }
    }

    /// Number of routing requests handed out so far.
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// Bring the overlay in line with its inputs. A new key only records a
    /// request; nothing is routed here.
    ///
    /// Returns true when the overlay was torn down and/or re-requested.
    pub fn sync(
        &mut self,
        surface: &mut dyn MapSurface,
        origin: Option<LatLng>,
        destination: Option<LatLng>,
    ) -> bool {
        let desired = RouteKey::from_inputs(origin, destination);
        if desired == self.key() {
            return false;
        }

        self.teardown(surface);

        if let Some(key) = desired {
            debug!(
                "[RouteOverlay] Requesting route ({}, {}) -> ({}, {})",
                key.origin.lat, key.origin.lng, key.destination.lat, key.destination.lng
            );
            self.state = OverlayState::Active {
                key,
                route: RouteState::Requested,
            };
        }
        true
    }

    /// Hand out the outstanding request, if any. Each request is handed out
    /// once.
    pub fn take_request(&mut self) -> Option<RouteTicket> {
        match &mut self.state {
            OverlayState::Active {
                key,
                route: route @ RouteState::Requested,
            } => {
                self.builds += 1;
                *route = RouteState::InFlight { seq: self.builds };
                Some(RouteTicket {
                    key: *key,
                    seq: self.builds,
                })
            }
            _ => None,
        }
    }

    /// Apply a routing result. Returns false and changes nothing when the
    /// ticket is no longer the one in flight.
    pub fn complete(
        &mut self,
        surface: &mut dyn MapSurface,
        style: &RouteStyle,
        ticket: RouteTicket,
        result: Result<RoutePath>,
    ) -> bool {
        let current = matches!(
            self.state,
            OverlayState::Active {
                key,
                route: RouteState::InFlight { seq },
            } if key == ticket.key && seq == ticket.seq
        );
        if !current {
            debug!("[RouteOverlay] Dropping stale route #{}", ticket.seq);
            return false;
        }

        let route = match result {
            Ok(path) => match surface.add_route_layer(&path, style) {
                Ok(layer) => {
                    info!(
                        "[RouteOverlay] Route #{}: {} points, {:.0}m (layer {})",
                        ticket.seq,
                        path.points.len(),
                        path.distance_m,
                        layer
                    );
                    RouteState::Done {
                        path: Some(path),
                        layer: Some(layer),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!("[RouteOverlay] Failed to draw route: {}", e);
                    RouteState::Done {
                        path: Some(path),
                        layer: None,
                        error: Some(e.to_string()),
                    }
                }
            },
            Err(e) => {
                warn!("[RouteOverlay] Routing #{} failed: {}", ticket.seq, e);
                RouteState::Done {
                    path: None,
                    layer: None,
                    error: Some(e.to_string()),
                }
            }
        };

        self.state = OverlayState::Active {
            key: ticket.key,
            route,
        };
        true
    }

    /// Remove the route, whatever state it is in. Never fails. A request in
    /// flight becomes stale.
    pub fn teardown(&mut self, surface: &mut dyn MapSurface) {
        let previous = std::mem::replace(&mut self.state, OverlayState::Inactive);
        if let OverlayState::Active {
            route: RouteState::Done {
                layer: Some(layer), ..
            },
            ..
        } = previous
        {
            match surface.remove_layer(layer) {
                Ok(()) => debug!("[RouteOverlay] Removed route layer {}", layer),
                Err(e) => warn!("[RouteOverlay] Failed to remove route layer {}: {}", layer, e),
            }
        }
    }

    pub fn view(&self) -> RouteView {
        match &self.state {
            OverlayState::Inactive => RouteView::default(),
            OverlayState::Active { key, route } => match route {
                RouteState::Requested | RouteState::InFlight { .. } => RouteView {
                    active: true,
                    key: Some(*key),
                    pending: true,
                    ..RouteView::default()
                },
                RouteState::Done { path, layer, error } => RouteView {
                    active: true,
                    key: Some(*key),
                    pending: false,
                    points: path.as_ref().map(|p| p.points.clone()).unwrap_or_default(),
                    distance_m: path.as_ref().map(|p| p.distance_m),
                    duration_s: path.as_ref().and_then(|p| p.duration_s),
                    drawn: layer.is_some(),
                    error: error.clone(),
                },
            },
        }
    }
}

impl Default for RouteOverlay {
    fn default() -> Self {
        Self::new()
    }
}
