//! # Finder Engine
//!
//! Stateful application core that keeps all finder state in Rust. The host UI
//! forwards events (geolocation fixes, filter edits, clicks, modal input) and
//! renders the [`AppView`] it gets back.
//!
//! ## Architecture
//!
//! The engine owns:
//! - The spot store (seed spots plus user-created spots)
//! - The filter state
//! - The user location and the selected spot
//! - The map camera, the route overlay and the creation modal
//! - The host map surface and the routing provider
//!
//! Every event handler finishes by syncing the camera and the route overlay
//! against the new state, so the imperative side effects on the surface are
//! derived from state rather than from event order.
//!
//! ## Routing
//!
//! Event handlers never call the routing provider. A changed route only
//! leaves a request behind; the host takes it with
//! [`FinderEngine::take_route_request`], runs it wherever it likes (outside
//! any lock on the engine) and hands the result back to
//! [`FinderEngine::complete_route`]. Results for a route that changed in the
//! meantime are dropped. Single-threaded hosts can call
//! [`FinderEngine::run_routing`] to do all three steps inline.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::FinderConfig;
use crate::filter::{filter_spots, rating_threshold, speed_threshold, FilterState};
use crate::geolocation::{Fix, GeoUpdate};
use crate::map::{spot_markers, HeadlessSurface, MapSurface, MapView, SpotMarker, UserMarker};
use crate::modal::{CreationModal, ModalView};
use crate::overlay::{RouteKey, RouteOverlay, RouteTicket, RouteView};
use crate::routing::{DirectRouter, RoutePath, RoutingProvider};
use crate::spot::{SpotId, WifiSpot};
use crate::store::SpotStore;
use crate::tiles::tiles_for_viewport;
use crate::{Bounds, LatLng, OptionExt, Result};

// ============================================================================
// View Types
// ============================================================================

/// Confirmation the host should show after a map double-click.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptView {
    pub message: String,
    pub position: LatLng,
}

/// Everything the host needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppView {
    pub center: LatLng,
    pub zoom: u8,
    pub tile_url_template: String,
    pub tile_subdomains: Vec<String>,
    pub attribution: String,
    pub filter: FilterState,
    pub user_marker: Option<UserMarker>,
    pub spot_markers: Vec<SpotMarker>,
    pub selected_spot: Option<SpotId>,
    pub route: RouteView,
    pub modal: ModalView,
    pub prompt: Option<PromptView>,
}

/// A route to compute, detached from the engine.
///
/// Holds its own handle to the routing provider, so [`RouteRequest::run`]
/// needs no access to the engine.
pub struct RouteRequest {
    ticket: RouteTicket,
    router: Arc<dyn RoutingProvider>,
}

impl RouteRequest {
    pub fn ticket(&self) -> RouteTicket {
        self.ticket
    }

    pub fn key(&self) -> RouteKey {
        self.ticket.key
    }

    /// Ask the routing provider. May block for as long as the provider does.
    pub fn run(&self) -> Result<RoutePath> {
        let key = self.ticket.key;
        self.router.route(key.origin, key.destination)
    }
}

// ============================================================================
// Finder Engine
// ============================================================================

pub struct FinderEngine {
    config: FinderConfig,

    // Core state
    store: SpotStore,
    filter: FilterState,
    user_location: Option<LatLng>,
    selected: Option<SpotId>,
    pending_prompt: Option<LatLng>,
    fix_count: u64,

    // View state
    map_view: MapView,
    overlay: RouteOverlay,
    modal: CreationModal,

    // Host integrations
    surface: Box<dyn MapSurface>,
    router: Arc<dyn RoutingProvider>,
}

impl FinderEngine {
    /// Create an engine with default configuration, a headless surface and
    /// straight-line routing.
    pub fn new() -> Self {
        Self::with_config(FinderConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(config: FinderConfig) -> Self {
        Self {
            store: SpotStore::new(),
            filter: FilterState::default(),
            user_location: None,
            selected: None,
            pending_prompt: None,
            fix_count: 0,
            map_view: MapView::new(config.default_center, config.default_zoom),
            overlay: RouteOverlay::new(),
            modal: CreationModal::new(),
            surface: Box::new(HeadlessSurface::new()),
            router: Arc::new(DirectRouter),
            config,
        }
    }

    /// Replace the host map surface. The new surface receives the current
    /// view and route on the next sync.
    pub fn set_surface(&mut self, surface: Box<dyn MapSurface>) {
        // The old surface owns the old layer
        self.overlay.teardown(self.surface.as_mut());
        self.surface = surface;
        self.map_view.invalidate();
        self.sync();
    }

    /// Replace the routing provider. The current route is requested again;
    /// results still in flight from the old provider are dropped.
    pub fn set_router(&mut self, router: Box<dyn RoutingProvider>) {
        info!("[FinderEngine] Routing via {}", router.name());
        self.router = Arc::from(router);
        self.overlay.teardown(self.surface.as_mut());
        self.sync();
    }

    // ========================================================================
    // Geolocation
    // ========================================================================

    /// Handle one geolocation callback. Failures are logged and ignored.
    pub fn apply_geolocation(&mut self, update: GeoUpdate) {
        match update {
            Ok(fix) => self.apply_fix(fix),
            Err(e) => warn!("[FinderEngine] Error getting location: {}", e),
        }
    }

    /// Drain every update queued by a [`crate::GeolocationAdapter`].
    /// Returns the number of updates handled.
    pub fn drain_geolocation(&mut self, updates: &Receiver<GeoUpdate>) -> usize {
        let mut handled = 0;
        for update in updates.try_iter() {
            self.apply_geolocation(update);
            handled += 1;
        }
        handled
    }

    /// A new position: recenter, move the seed spots next to it, and re-route.
    pub fn apply_fix(&mut self, fix: Fix) {
        let position = match fix.position.validated() {
            Ok(p) => p,
            Err(e) => {
                warn!("[FinderEngine] Ignoring fix: {}", e);
                return;
            }
        };

        self.fix_count += 1;
        debug!(
            "[FinderEngine] Fix #{} at ({}, {})",
            self.fix_count, position.lat, position.lng
        );

        self.user_location = Some(position);
        self.map_view.set_center(position);
        self.store.relocate_seeds(position);
        self.sync();
    }

    pub fn user_location(&self) -> Option<LatLng> {
        self.user_location
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter.sanitized();
    }

    pub fn set_search(&mut self, search: &str) {
        self.filter.search = search.to_string();
    }

    pub fn set_free_only(&mut self, free_only: bool) {
        self.filter.free_only = free_only;
    }

    pub fn set_min_rating(&mut self, min_rating: f64) {
        self.filter.min_rating = rating_threshold(min_rating);
    }

    pub fn set_min_speed(&mut self, min_speed_mbps: Option<f64>) {
        self.filter.min_speed_mbps = speed_threshold(min_speed_mbps);
    }

    /// Spots passing the current filter, in store order.
    pub fn filtered_spots(&self) -> Vec<&WifiSpot> {
        filter_spots(self.store.list(), &self.filter)
    }

    /// Filtered spots inside a viewport.
    pub fn visible_spots(&mut self, bounds: &Bounds) -> Vec<WifiSpot> {
        let ids = self.store.ids_in_bounds(bounds);
        ids.into_iter()
            .filter_map(|id| self.store.get(id))
            .filter(|spot| self.filter.matches(spot))
            .cloned()
            .collect()
    }

    // ========================================================================
    // Spots & Selection
    // ========================================================================

    pub fn spots(&self) -> &[WifiSpot] {
        self.store.list()
    }

    pub fn spot(&self, id: SpotId) -> Option<&WifiSpot> {
        self.store.get(id)
    }

    /// Spot closest to the user, if the position is known.
    pub fn nearest_spot(&mut self) -> Option<&WifiSpot> {
        let user = self.user_location?;
        self.store.nearest(user)
    }

    /// Marker click or "Show Route". The selection sticks until another spot
    /// is selected.
    pub fn select_spot(&mut self, id: SpotId) -> Result<()> {
        self.store.get(id).ok_or_spot_not_found(id)?;
        debug!("[FinderEngine] Selected spot {}", id);
        self.selected = Some(id);
        self.sync();
        Ok(())
    }

    pub fn selected_spot(&self) -> Option<&WifiSpot> {
        self.selected.and_then(|id| self.store.get(id))
    }

    // ========================================================================
    // Spot Creation
    // ========================================================================

    /// Double-click on the map: ask the user before opening the modal.
    pub fn map_double_click(&mut self, position: LatLng) -> Result<()> {
        self.pending_prompt = Some(position.validated()?);
        Ok(())
    }

    pub fn pending_prompt(&self) -> Option<PromptView> {
        self.pending_prompt.map(|position| PromptView {
            message: self.config.add_spot_prompt.clone(),
            position,
        })
    }

    /// Answer the double-click prompt. Accepting opens the modal at the
    /// clicked position.
    pub fn resolve_prompt(&mut self, accepted: bool) {
        if let Some(position) = self.pending_prompt.take() {
            if accepted {
                self.modal.open_at(position);
            }
        }
    }

    /// "Add New Spot" button.
    pub fn open_modal(&mut self) {
        self.modal.open();
    }

    pub fn modal(&self) -> &CreationModal {
        &self.modal
    }

    /// Edit the draft in the open modal.
    pub fn update_draft(&mut self, name: &str, speed: &str, is_free: bool) {
        self.modal.set_name(name);
        self.modal.set_speed(speed);
        self.modal.set_free(is_free);
    }

    /// Submit the modal. On a validation error nothing changes and the modal
    /// stays open.
    pub fn submit_spot(&mut self) -> Result<WifiSpot> {
        let spot = self.modal.submit(&mut self.store, &self.config.speed_unit)?;
        info!("[FinderEngine] Added spot {} '{}'", spot.id, spot.name);
        Ok(spot)
    }

    pub fn cancel_modal(&mut self) {
        self.modal.cancel();
    }

    // ========================================================================
    // Sync
    // ========================================================================

    /// Push camera and route changes to the surface.
    fn sync(&mut self) {
        self.map_view.sync(self.surface.as_mut());

        let destination = self.selected_spot().map(|s| s.position());
        self.overlay
            .sync(self.surface.as_mut(), self.user_location, destination);
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// The outstanding route request, if any. Each request is handed out once.
    pub fn take_route_request(&mut self) -> Option<RouteRequest> {
        let ticket = self.overlay.take_request()?;
        debug!("[FinderEngine] Route #{} via {}", ticket.seq, self.router.name());
        Some(RouteRequest {
            ticket,
            router: Arc::clone(&self.router),
        })
    }

    /// Draw the result of a request. Returns false when the route changed
    /// since the request was taken; the result is then dropped.
    pub fn complete_route(&mut self, ticket: RouteTicket, result: Result<RoutePath>) -> bool {
        self.overlay.complete(
            self.surface.as_mut(),
            &self.config.route_style,
            ticket,
            result,
        )
    }

    /// Take, run and complete the outstanding request on this thread.
    /// Returns true when a route was applied.
    pub fn run_routing(&mut self) -> bool {
        match self.take_route_request() {
            Some(request) => {
                let result = request.run();
                self.complete_route(request.ticket(), result)
            }
            None => false,
        }
    }

    // ========================================================================
    // View Export
    // ========================================================================

    pub fn view(&self) -> AppView {
        let filtered = self.filtered_spots();
        AppView {
            center: self.map_view.center(),
            zoom: self.map_view.zoom(),
            tile_url_template: self.config.tile_layer.url_template.clone(),
            tile_subdomains: self.config.tile_layer.subdomains.clone(),
            attribution: self.config.tile_layer.attribution.clone(),
            filter: self.filter.clone(),
            user_marker: self.user_location.map(UserMarker::at),
            spot_markers: spot_markers(&filtered, self.user_location, self.selected),
            selected_spot: self.selected,
            route: self.overlay.view(),
            modal: self.modal.view(),
            prompt: self.pending_prompt(),
        }
    }

    /// View as JSON (for efficient FFI).
    pub fn view_json(&self) -> String {
        serde_json::to_string(&self.view()).unwrap_or_else(|_| "{}".to_string())
    }

    /// All spots as JSON.
    pub fn spots_json(&self) -> String {
        serde_json::to_string(self.store.list()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Tile URLs covering a viewport of the given pixel size around the
    /// current center.
    pub fn tile_urls(&self, width_px: u32, height_px: u32) -> Vec<String> {
        tiles_for_viewport(
            &self.map_view.center(),
            self.map_view.zoom(),
            width_px,
            height_px,
        )
        .into_iter()
        .map(|tile| self.config.tile_layer.tile_url(tile))
        .collect()
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Apply a new configuration. The camera returns to the configured zoom;
    /// the center only changes while no fix is known.
    pub fn set_config(&mut self, config: FinderConfig) -> Result<()> {
        config.validate()?;
        self.map_view.set_zoom(config.default_zoom);
        if self.user_location.is_none() {
            self.map_view.set_center(config.default_center);
        }
        let style_changed = config.route_style != self.config.route_style;
        self.config = config;
        if style_changed {
            self.overlay.teardown(self.surface.as_mut());
        }
        self.sync();
        Ok(())
    }

    /// Back to a fresh session: seed spots, no fix, no selection, closed modal.
    pub fn reset(&mut self) {
        self.overlay.teardown(self.surface.as_mut());
        self.store = SpotStore::new();
        self.filter = FilterState::default();
        self.user_location = None;
        self.selected = None;
        self.pending_prompt = None;
        self.fix_count = 0;
        self.modal = CreationModal::new();
        self.map_view.set_center(self.config.default_center);
        self.map_view.set_zoom(self.config.default_zoom);
        self.sync();
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            spot_count: self.store.len() as u32,
            visible_count: self.filtered_spots().len() as u32,
            fix_count: self.fix_count,
            route_builds: self.overlay.builds(),
            has_user_location: self.user_location.is_some(),
            route_active: self.overlay.is_active(),
        }
    }
}

impl Default for FinderEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine statistics for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct EngineStats {
    pub spot_count: u32,
    pub visible_count: u32,
    pub fix_count: u64,
    pub route_builds: u64,
    pub has_user_location: bool,
    pub route_active: bool,
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global engine instance.
///
/// This singleton allows FFI calls to access a shared engine without
/// passing state back and forth across the FFI boundary.
pub static ENGINE: Lazy<Mutex<FinderEngine>> = Lazy::new(|| Mutex::new(FinderEngine::new()));

/// Get a lock on the global engine.
pub fn with_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut FinderEngine) -> R,
{
    let mut engine = ENGINE
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f(&mut engine)
}

// ============================================================================
// Tests
// ============================================================================
