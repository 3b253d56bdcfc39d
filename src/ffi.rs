//! FFI bindings for mobile and web hosts.
//!
//! Thin UniFFI wrappers around the global [`FinderEngine`](crate::FinderEngine).
//! The host forwards UI and platform events, then pulls the view model as
//! JSON and renders it.
//!
//! Route requests left behind by an event run on a background thread, never
//! while the engine lock is held. The host sees the result on its next view
//! pull.

use std::thread;

use log::{debug, info, warn};

use crate::config::RouteStyle;
use crate::engine::{with_engine, EngineStats};
use crate::geolocation::{Fix, GeolocationError};
use crate::map::{LayerId, MapSurface};
use crate::routing::RoutePath;
use crate::{init_logging, FinderConfig, FinderError, LatLng, Result};

// ============================================================================
// Host Map Callback Interface
// ============================================================================

/// The host's map widget. Implement this in Kotlin/Swift/JS to let the engine
/// move the camera and draw route lines.
#[uniffi::export(callback_interface)]
pub trait MapSurfaceCallback: Send + Sync {
    /// Move the map. Return false if the widget is not ready.
    fn set_view(&self, center: LatLng, zoom: u8) -> bool;

    /// Draw a polyline and return its handle, or None if drawing failed.
    fn add_route_layer(&self, points: Vec<LatLng>, color: String, weight: f32) -> Option<u64>;

    /// Remove a polyline. Return false if the widget refused.
    fn remove_layer(&self, layer: u64) -> bool;
}

struct CallbackSurface {
    callback: Box<dyn MapSurfaceCallback>,
}

impl MapSurface for CallbackSurface {
    fn set_view(&mut self, center: LatLng, zoom: u8) -> Result<()> {
        if self.callback.set_view(center, zoom) {
            Ok(())
        } else {
            Err(FinderError::MapLayer {
                message: "Host rejected set_view".to_string(),
            })
        }
    }

    fn add_route_layer(&mut self, path: &RoutePath, style: &RouteStyle) -> Result<LayerId> {
        self.callback
            .add_route_layer(path.points.clone(), style.color.clone(), style.weight)
            .ok_or_else(|| FinderError::MapLayer {
                message: "Host failed to add route layer".to_string(),
            })
    }

    fn remove_layer(&mut self, layer: LayerId) -> Result<()> {
        if self.callback.remove_layer(layer) {
            Ok(())
        } else {
            Err(FinderError::MapLayer {
                message: format!("Host failed to remove layer {}", layer),
            })
        }
    }
}

// ============================================================================
// Background Routing
// ============================================================================

/// Run the outstanding route request, if any, off the engine lock.
fn dispatch_routing() {
    let Some(request) = with_engine(|e| e.take_route_request()) else {
        return;
    };

    let spawned = thread::Builder::new()
        .name("wifi-finder-route".to_string())
        .spawn(move || {
            let result = request.run();
            if !with_engine(|e| e.complete_route(request.ticket(), result)) {
                debug!("[FinderEngine] Route #{} superseded", request.ticket().seq);
            }
        });

    if let Err(e) = spawned {
        warn!("[FinderEngine] Could not start routing thread: {}", e);
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Initialize the engine (call once at app startup).
#[uniffi::export]
pub fn engine_init() {
    init_logging();
    info!("[FinderEngine] Initialized");
}

/// Initialize with a JSON [`FinderConfig`]. Returns false and keeps the
/// current configuration if the JSON is invalid.
#[uniffi::export]
pub fn engine_init_with_config(config_json: String) -> bool {
    init_logging();
    let applied = FinderConfig::from_json(&config_json).and_then(|config| {
        with_engine(|e| e.set_config(config))
    });
    match applied {
        Ok(()) => {
            info!("[FinderEngine] Initialized with custom config");
            dispatch_routing();
            true
        }
        Err(e) => {
            warn!("[FinderEngine] Rejected config: {}", e);
            false
        }
    }
}

/// Back to a fresh session.
#[uniffi::export]
pub fn engine_reset() {
    with_engine(|e| e.reset());
    info!("[FinderEngine] Reset");
    dispatch_routing();
}

/// Attach the host's map widget.
#[uniffi::export]
pub fn engine_set_map_surface(callback: Box<dyn MapSurfaceCallback>) {
    with_engine(|e| e.set_surface(Box::new(CallbackSurface { callback })));
    info!("[FinderEngine] Map surface attached");
    dispatch_routing();
}

/// Route through an OSRM server described by a JSON
/// [`OsrmConfig`](crate::OsrmConfig).
#[cfg(feature = "http")]
#[uniffi::export]
pub fn engine_use_osrm_router(config_json: String) -> bool {
    let router = serde_json::from_str::<crate::OsrmConfig>(&config_json)
        .map_err(FinderError::from)
        .and_then(crate::OsrmRouter::new);
    match router {
        Ok(router) => {
            with_engine(|e| e.set_router(Box::new(router)));
            dispatch_routing();
            true
        }
        Err(e) => {
            warn!("[FinderEngine] Could not create OSRM router: {}", e);
            false
        }
    }
}

// ============================================================================
// Geolocation
// ============================================================================

/// Forward a position reading.
#[uniffi::export]
pub fn engine_push_fix(lat: f64, lng: f64, accuracy_m: Option<f64>) {
    let mut fix = Fix::new(LatLng::new(lat, lng));
    fix.accuracy_m = accuracy_m;
    with_engine(|e| e.apply_fix(fix));
    dispatch_routing();
}

/// Forward a position error (W3C codes: 1 denied, 2 unavailable, 3 timeout).
#[uniffi::export]
pub fn engine_push_fix_error(code: u16) {
    with_engine(|e| e.apply_geolocation(Err(GeolocationError::from_code(code))));
}

// ============================================================================
// Filter
// ============================================================================

#[uniffi::export]
pub fn engine_set_search(search: String) {
    with_engine(|e| e.set_search(&search));
}

#[uniffi::export]
pub fn engine_set_free_only(free_only: bool) {
    with_engine(|e| e.set_free_only(free_only));
}

#[uniffi::export]
pub fn engine_set_min_rating(min_rating: f64) {
    with_engine(|e| e.set_min_rating(min_rating));
}

/// None clears the speed threshold.
#[uniffi::export]
pub fn engine_set_min_speed(min_speed_mbps: Option<f64>) {
    with_engine(|e| e.set_min_speed(min_speed_mbps));
}

// ============================================================================
// Selection & Creation
// ============================================================================

/// Select a spot for routing. Returns false for unknown ids.
#[uniffi::export]
pub fn engine_select_spot(id: i64) -> bool {
    match with_engine(|e| e.select_spot(id)) {
        Ok(()) => {
            dispatch_routing();
            true
        }
        Err(e) => {
            warn!("[FinderEngine] {}", e);
            false
        }
    }
}

/// Double-click on the map. The host shows the prompt from the view model.
#[uniffi::export]
pub fn engine_map_double_click(lat: f64, lng: f64) -> bool {
    with_engine(|e| e.map_double_click(LatLng::new(lat, lng))).is_ok()
}

#[uniffi::export]
pub fn engine_resolve_prompt(accepted: bool) {
    with_engine(|e| e.resolve_prompt(accepted));
}

#[uniffi::export]
pub fn engine_open_modal() {
    with_engine(|e| e.open_modal());
}

#[uniffi::export]
pub fn engine_update_draft(name: String, speed: String, is_free: bool) {
    with_engine(|e| e.update_draft(&name, &speed, is_free));
}

/// Submit the modal. Returns the message to alert on failure, None on
/// success.
#[uniffi::export]
pub fn engine_submit_spot() -> Option<String> {
    match with_engine(|e| e.submit_spot()) {
        Ok(_) => None,
        Err(FinderError::InvalidSpot { message, .. }) => Some(message),
        Err(e) => Some(e.to_string()),
    }
}

#[uniffi::export]
pub fn engine_cancel_modal() {
    with_engine(|e| e.cancel_modal());
}

// ============================================================================
// View Export
// ============================================================================

/// Current view model as JSON.
#[uniffi::export]
pub fn engine_get_view_json() -> String {
    with_engine(|e| e.view_json())
}

/// All spots as JSON.
#[uniffi::export]
pub fn engine_get_spots_json() -> String {
    with_engine(|e| e.spots_json())
}

/// Tile URLs for a viewport in pixels.
#[uniffi::export]
pub fn engine_get_tile_urls(width_px: u32, height_px: u32) -> Vec<String> {
    with_engine(|e| e.tile_urls(width_px, height_px))
}

#[uniffi::export]
pub fn engine_get_stats() -> EngineStats {
    with_engine(|e| e.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::FinderEngine;

    /// Host widget that either accepts every call or refuses every call.
    struct HostMap {
        accept: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl HostMap {
        fn surface(accept: bool) -> (CallbackSurface, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let host = HostMap {
                accept,
                calls: Arc::clone(&calls),
            };
            (CallbackSurface { callback: Box::new(host) }, calls)
        }
    }

    impl MapSurfaceCallback for HostMap {
        fn set_view(&self, _center: LatLng, zoom: u8) -> bool {
            self.calls.lock().unwrap().push(format!("view {}", zoom));
            self.accept
        }

        fn add_route_layer(&self, points: Vec<LatLng>, color: String, _weight: f32) -> Option<u64> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("add {} {}", points.len(), color));
            self.accept.then_some(7)
        }

        fn remove_layer(&self, layer: u64) -> bool {
            self.calls.lock().unwrap().push(format!("remove {}", layer));
            self.accept
        }
    }

    fn path() -> RoutePath {
        RoutePath::from_points(vec![LatLng::new(0.0, 0.0), LatLng::new(0.0, 0.01)])
    }

    #[test]
    fn test_host_refusal_maps_to_layer_error() {
        let (mut surface, calls) = HostMap::surface(false);
        let style = RouteStyle::default();

        let err = surface.set_view(LatLng::new(1.0, 2.0), 13).unwrap_err();
        assert!(matches!(err, FinderError::MapLayer { .. }));
        let err = surface.add_route_layer(&path(), &style).unwrap_err();
        assert!(matches!(err, FinderError::MapLayer { .. }));
        let err = surface.remove_layer(7).unwrap_err();
        assert!(matches!(err, FinderError::MapLayer { ref message } if message.contains('7')));

        // Every call still reached the host
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_host_acceptance_passes_through() {
        let (mut surface, calls) = HostMap::surface(true);
        let style = RouteStyle::default();

        surface.set_view(LatLng::new(1.0, 2.0), 13).unwrap();
        assert_eq!(surface.add_route_layer(&path(), &style).unwrap(), 7);
        surface.remove_layer(7).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls[0], "view 13");
        assert_eq!(calls[1], format!("add 2 {}", style.color));
        assert_eq!(calls[2], "remove 7");
    }

    #[test]
    fn test_refusing_host_keeps_engine_usable() {
        let (surface, _calls) = HostMap::surface(false);
        let mut engine = FinderEngine::new();
        engine.set_surface(Box::new(surface));

        engine.apply_fix(Fix::new(LatLng::new(51.5, -0.12)));
        engine.select_spot(1).unwrap();
        assert!(engine.run_routing());

        let view = engine.view();
        assert!(view.route.active);
        assert!(!view.route.drawn);
        assert!(view.route.error.is_some());
        assert_eq!(view.spot_markers.len(), 3);
    }
}
