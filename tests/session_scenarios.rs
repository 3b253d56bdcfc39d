//! Whole-session scenarios against the public API.
//!
//! Each test drives a `FinderEngine` the way a host UI would (geolocation
//! callbacks, clicks, modal input) and checks both the exported view model and
//! the calls that reached the map surface and the routing provider.
//!
//! Route requests are left behind by events and run with `run_routing`, or on
//! a worker thread the way the FFI layer runs them.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use wifi_finder::{
    filter_spots, FilterState, FinderEngine, FinderError, Fix, GeolocationAdapter,
    GeolocationError, LatLng, LayerId, MapSurface, PositionFeed, Result, RouteStyle, RoutePath,
    RoutingProvider, SpotDraft, SpotStore,
};

// ============================================================================
// Recording doubles
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum SurfaceCall {
    SetView(LatLng, u8),
    AddRoute(LayerId, usize),
    Remove(LayerId),
}

#[derive(Default)]
struct SurfaceLog {
    calls: Vec<SurfaceCall>,
    next_layer: LayerId,
    fail_removals: bool,
}

/// Surface that records every call into shared state.
#[derive(Clone, Default)]
struct RecordingSurface(Arc<Mutex<SurfaceLog>>);

impl RecordingSurface {
    fn calls(&self) -> Vec<SurfaceCall> {
        self.0.lock().unwrap().calls.clone()
    }

    fn set_fail_removals(&self, fail: bool) {
        self.0.lock().unwrap().fail_removals = fail;
    }

    fn set_view_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SurfaceCall::SetView(..)))
            .count()
    }

    fn live_layers(&self) -> Vec<LayerId> {
        let mut live = Vec::new();
        for call in self.calls() {
            match call {
                SurfaceCall::AddRoute(id, _) => live.push(id),
                SurfaceCall::Remove(id) => live.retain(|l| *l != id),
                SurfaceCall::SetView(..) => {}
            }
        }
        live
    }
}

impl MapSurface for RecordingSurface {
    fn set_view(&mut self, center: LatLng, zoom: u8) -> Result<()> {
        self.0.lock().unwrap().calls.push(SurfaceCall::SetView(center, zoom));
        Ok(())
    }

    fn add_route_layer(&mut self, path: &RoutePath, _style: &RouteStyle) -> Result<LayerId> {
        let mut log = self.0.lock().unwrap();
        log.next_layer += 1;
        let id = log.next_layer;
        log.calls.push(SurfaceCall::AddRoute(id, path.points.len()));
        Ok(id)
    }

    fn remove_layer(&mut self, layer: LayerId) -> Result<()> {
        let mut log = self.0.lock().unwrap();
        if log.fail_removals {
            return Err(FinderError::MapLayer {
                message: "map container already gone".to_string(),
            });
        }
        log.calls.push(SurfaceCall::Remove(layer));
        Ok(())
    }
}

/// Router that records requests and can be told to fail.
#[derive(Clone, Default)]
struct RecordingRouter {
    requests: Arc<Mutex<Vec<(LatLng, LatLng)>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingRouter {
    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl RoutingProvider for RecordingRouter {
    fn route(&self, from: LatLng, to: LatLng) -> Result<RoutePath> {
        self.requests.lock().unwrap().push((from, to));
        if *self.fail.lock().unwrap() {
            return Err(FinderError::Routing {
                message: "NoRoute".to_string(),
            });
        }
        let mid = LatLng::new((from.lat + to.lat) / 2.0, (from.lng + to.lng) / 2.0);
        Ok(RoutePath::from_points(vec![from, mid, to]))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Router that blocks each request until the test lets it through.
struct GatedRouter {
    started: Mutex<mpsc::Sender<()>>,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl RoutingProvider for GatedRouter {
    fn route(&self, from: LatLng, to: LatLng) -> Result<RoutePath> {
        let _ = self.started.lock().unwrap().send(());
        self.gate
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| FinderError::Routing {
                message: "gate closed".to_string(),
            })?;
        Ok(RoutePath::from_points(vec![from, to]))
    }

    fn name(&self) -> &str {
        "gated"
    }
}

fn engine_with_doubles() -> (FinderEngine, RecordingSurface, RecordingRouter) {
    let surface = RecordingSurface::default();
    let router = RecordingRouter::default();
    let mut engine = FinderEngine::new();
    engine.set_surface(Box::new(surface.clone()));
    engine.set_router(Box::new(router.clone()));
    (engine, surface, router)
}

fn fix(lat: f64, lng: f64) -> Fix {
    Fix::new(LatLng::new(lat, lng))
}

fn close(a: LatLng, lat: f64, lng: f64) -> bool {
    (a.lat - lat).abs() < 1e-9 && (a.lng - lng).abs() < 1e-9
}

// ============================================================================
// Geolocation
// ============================================================================

#[test]
fn fix_recenters_and_relocates_seed_spots() {
    let (mut engine, surface, _router) = engine_with_doubles();
    assert_eq!(
        surface.calls(),
        vec![SurfaceCall::SetView(LatLng::new(34.052235, -118.243683), 13)]
    );

    engine.apply_fix(fix(10.0, 20.0));

    assert_eq!(
        surface.calls().last(),
        Some(&SurfaceCall::SetView(LatLng::new(10.0, 20.0), 13))
    );
    let spots = engine.spots();
    assert!(close(spots[0].position(), 10.004, 20.01));
    assert!(close(spots[1].position(), 9.998, 19.99));
    assert!(close(spots[2].position(), 10.001, 20.005));

    // Same fix again: no extra set_view
    engine.apply_fix(fix(10.0, 20.0));
    assert_eq!(surface.set_view_count(), 2);
}

#[test]
fn geolocation_error_leaves_view_alone() {
    let (mut engine, surface, _router) = engine_with_doubles();
    engine.apply_geolocation(Err(GeolocationError::PermissionDenied));
    engine.apply_geolocation(Err(GeolocationError::Timeout));

    let view = engine.view();
    assert!(view.user_marker.is_none());
    assert_eq!(view.center, LatLng::new(34.052235, -118.243683));
    assert_eq!(surface.set_view_count(), 1);
    assert!(view.spot_markers.iter().all(|m| !m.popup.show_route));
}

#[test]
fn adapter_feeds_engine_through_channel() {
    let _ = env_logger::builder().is_test(true).try_init();

    let feed = PositionFeed::new();
    let (tx, rx) = mpsc::channel();
    let mut adapter = GeolocationAdapter::new(feed.source());
    adapter.mount(tx);
    assert!(adapter.is_watching());

    let mut engine = FinderEngine::new();

    // Answers the one-shot request and the watch
    feed.publish(Ok(fix(10.0, 20.0)));
    feed.publish(Ok(fix(10.5, 20.5)));
    let handled = engine.drain_geolocation(&rx);
    assert!(handled >= 2);
    assert_eq!(engine.user_location(), Some(LatLng::new(10.5, 20.5)));

    adapter.unmount();
    assert_eq!(feed.watch_count(), 0);
    feed.publish(Ok(fix(0.0, 0.0)));
    engine.drain_geolocation(&rx);
    assert_eq!(engine.user_location(), Some(LatLng::new(10.5, 20.5)));
}

// ============================================================================
// Route overlay
// ============================================================================

#[test]
fn selection_before_fix_routes_once_position_arrives() {
    let (mut engine, surface, router) = engine_with_doubles();

    engine.select_spot(1).unwrap();
    assert!(!engine.view().route.active);
    assert!(!engine.run_routing());
    assert_eq!(router.request_count(), 0);

    engine.apply_fix(fix(10.0, 20.0));
    assert!(engine.view().route.pending);
    assert_eq!(router.request_count(), 0);

    assert!(engine.run_routing());
    let route = engine.view().route;
    assert!(route.active);
    assert!(route.drawn);
    assert_eq!(route.points.len(), 3);
    assert_eq!(router.request_count(), 1);
    assert_eq!(surface.live_layers().len(), 1);
}

#[test]
fn route_rebuilt_on_every_key_change() {
    let (mut engine, surface, router) = engine_with_doubles();
    engine.apply_fix(fix(10.0, 20.0));
    assert!(!engine.run_routing());
    engine.select_spot(1).unwrap();
    assert!(engine.run_routing());
    engine.select_spot(2).unwrap();
    assert!(engine.run_routing());
    engine.select_spot(2).unwrap();
    assert!(!engine.run_routing());
    engine.apply_fix(fix(10.01, 20.0));
    assert!(engine.run_routing());

    assert_eq!(router.request_count(), 3);
    // Teardown always precedes construction, so one layer at a time
    assert_eq!(surface.live_layers().len(), 1);
    let adds = surface
        .calls()
        .iter()
        .filter(|c| matches!(c, SurfaceCall::AddRoute(..)))
        .count();
    let removes = surface
        .calls()
        .iter()
        .filter(|c| matches!(c, SurfaceCall::Remove(..)))
        .count();
    assert_eq!(adds, 3);
    assert_eq!(removes, 2);
}

#[test]
fn failed_layer_removal_does_not_break_overlay() {
    let (mut engine, surface, router) = engine_with_doubles();
    engine.apply_fix(fix(10.0, 20.0));
    engine.select_spot(1).unwrap();
    engine.run_routing();

    surface.set_fail_removals(true);
    engine.select_spot(2).unwrap();
    engine.run_routing();
    let route = engine.view().route;
    assert!(route.active);
    assert!(route.drawn);
    assert!(close(route.key.unwrap().destination, 9.998, 19.99));

    surface.set_fail_removals(false);
    engine.select_spot(3).unwrap();
    engine.run_routing();
    assert!(engine.view().route.drawn);
    assert_eq!(router.request_count(), 3);
}

#[test]
fn routing_failure_keeps_view_working() {
    let (mut engine, surface, router) = engine_with_doubles();
    *router.fail.lock().unwrap() = true;

    engine.apply_fix(fix(10.0, 20.0));
    engine.select_spot(1).unwrap();
    assert!(engine.run_routing());

    let view = engine.view();
    assert!(view.route.active);
    assert!(!view.route.drawn);
    assert!(view.route.error.is_some());
    assert!(surface.live_layers().is_empty());
    assert_eq!(view.spot_markers.len(), 3);

    *router.fail.lock().unwrap() = false;
    engine.select_spot(2).unwrap();
    engine.run_routing();
    assert!(engine.view().route.drawn);
}

#[test]
fn view_stays_available_while_route_runs_on_worker() {
    let (started_tx, started_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let surface = RecordingSurface::default();
    let mut engine = FinderEngine::new();
    engine.set_surface(Box::new(surface.clone()));
    engine.set_router(Box::new(GatedRouter {
        started: Mutex::new(started_tx),
        gate: Mutex::new(gate_rx),
    }));
    engine.apply_fix(fix(10.0, 20.0));
    engine.select_spot(1).unwrap();

    let engine = Arc::new(Mutex::new(engine));
    let request = engine.lock().unwrap().take_route_request().unwrap();
    let worker = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let result = request.run();
            engine.lock().unwrap().complete_route(request.ticket(), result)
        })
    };

    // The router is blocked mid-request and the engine is free
    started_rx.recv().unwrap();
    let view = engine.lock().unwrap().view();
    assert!(view.route.pending);
    assert!(!view.route.drawn);
    assert_eq!(view.spot_markers.len(), 3);

    // Selection moves on before the result lands
    engine.lock().unwrap().select_spot(2).unwrap();
    gate_tx.send(()).unwrap();
    assert!(!worker.join().unwrap());
    assert!(surface.live_layers().is_empty());
    assert!(engine.lock().unwrap().view().route.pending);

    // The replacement request draws
    gate_tx.send(()).unwrap();
    let mut engine = engine.lock().unwrap();
    assert!(engine.run_routing());
    let route = engine.view().route;
    assert!(route.drawn);
    assert!(!route.pending);
    assert!(close(route.key.unwrap().destination, 9.998, 19.99));
    assert_eq!(surface.live_layers().len(), 1);
}

// ============================================================================
// Spot creation
// ============================================================================

#[test]
fn double_click_then_submit_adds_spot_at_click() {
    let (mut engine, _surface, _router) = engine_with_doubles();
    engine.map_double_click(LatLng::new(34.06, -118.25)).unwrap();
    assert!(engine.view().prompt.is_some());
    engine.resolve_prompt(true);

    engine.update_draft("Cafe", "30", true);
    let spot = engine.submit_spot().unwrap();

    assert_eq!(spot.speed, "30 Mbps");
    assert!(spot.is_free);
    assert_eq!(spot.rating, 5.0);
    assert_eq!(spot.reviews, 0);
    assert!(close(spot.position(), 34.06, -118.25));
    assert!(engine.spots().iter().filter(|s| s.id == spot.id).count() == 1);
    assert!(!engine.view().modal.open);
    assert!(engine.view().spot_markers.iter().any(|m| m.id == spot.id));
}

#[test]
fn invalid_submit_changes_nothing() {
    let (mut engine, _surface, _router) = engine_with_doubles();
    engine.open_modal();
    engine.update_draft("", "30", true);
    let before = engine.spots().to_vec();

    let err = engine.submit_spot().unwrap_err();
    assert_eq!(
        err,
        FinderError::InvalidSpot {
            field: "name".to_string(),
            message: "Please fill in all required fields".to_string(),
        }
    );
    assert_eq!(engine.spots(), &before[..]);
    assert!(engine.view().modal.open);
}

#[test]
fn user_spots_survive_later_fixes() {
    let (mut engine, _surface, _router) = engine_with_doubles();
    engine.open_modal();
    engine.update_draft("Mine", "12", false);
    let spot = engine.submit_spot().unwrap();

    engine.apply_fix(fix(10.0, 20.0));
    assert_eq!(engine.spots().len(), 4);
    assert_eq!(engine.spot(spot.id), Some(&spot));
}

#[test]
fn created_ids_are_unique() {
    let (mut engine, _surface, _router) = engine_with_doubles();
    let mut ids = Vec::new();
    for i in 0..5 {
        engine.open_modal();
        engine.update_draft(&format!("Spot {}", i), "10", true);
        ids.push(engine.submit_spot().unwrap().id);
    }
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5);
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn filter_properties_hold_for_mixed_store() {
    let mut store = SpotStore::new();
    for (i, name) in ["Corner Cafe", "cafe nero", "Airport Lounge"].iter().enumerate() {
        let draft = SpotDraft {
            name: name.to_string(),
            speed: format!("{}", 10 * (i + 1)),
            is_free: i % 2 == 0,
            ..SpotDraft::default()
        };
        store.create(draft, "Mbps");
    }

    let searches = ["", "CAFE", "lo", "zzz"];
    for search in searches {
        for free_only in [false, true] {
            let filter = FilterState {
                search: search.to_string(),
                free_only,
                ..FilterState::default()
            };
            let once = filter_spots(store.list(), &filter);
            let twice = filter_spots(store.list(), &filter);
            assert_eq!(once, twice);
            assert!(once.len() <= store.len());
            for spot in &once {
                assert!(spot.name.to_lowercase().contains(&search.to_lowercase()));
                if free_only {
                    assert!(spot.is_free);
                }
            }
        }
    }
}

#[test]
fn filtered_out_selection_keeps_route() {
    let (mut engine, _surface, router) = engine_with_doubles();
    engine.apply_fix(fix(10.0, 20.0));
    engine.select_spot(3).unwrap();
    engine.run_routing();
    engine.set_search("coffee");
    assert!(!engine.run_routing());

    let view = engine.view();
    assert_eq!(view.spot_markers.len(), 1);
    assert!(view.route.active);
    assert_eq!(router.request_count(), 1);
}
