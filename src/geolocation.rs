//! # Geolocation Adapter
//!
//! Bridges a platform position service into the finder's event loop.
//!
//! On [`GeolocationAdapter::mount`] the adapter asks for the current position
//! once and then opens a continuous watch. Every reading (or failure) is sent
//! as a [`GeoUpdate`] down an mpsc channel; the host loop drains the channel
//! into [`crate::FinderEngine::apply_geolocation`]. Unmounting (or dropping)
//! the adapter cancels the watch. There is no retry, timeout or fallback.

use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::LatLng;

/// A single geolocation reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub position: LatLng,
    /// Accuracy radius in meters, when the platform reports one
    pub accuracy_m: Option<f64>,
    /// Unix timestamp in milliseconds
    pub timestamp_ms: i64,
}

impl Fix {
    /// Fix taken now, without accuracy information.
    pub fn new(position: LatLng) -> Self {
        Self {
            position,
            accuracy_m: None,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Why a position could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeolocationError {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
    /// The platform has no geolocation service
    Unsupported,
}

impl GeolocationError {
    /// Map a W3C `GeolocationPositionError.code` (1, 2, 3).
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => GeolocationError::PermissionDenied,
            2 => GeolocationError::PositionUnavailable,
            3 => GeolocationError::Timeout,
            _ => GeolocationError::Unsupported,
        }
    }
}

impl fmt::Display for GeolocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "User denied geolocation permission"),
            Self::PositionUnavailable => write!(f, "Position unavailable"),
            Self::Timeout => write!(f, "Geolocation request timed out"),
            Self::Unsupported => write!(f, "Geolocation is not supported"),
        }
    }
}

impl std::error::Error for GeolocationError {}

/// Outcome of one position callback.
pub type GeoUpdate = std::result::Result<Fix, GeolocationError>;

/// Watch handle returned by [`PositionSource::watch_position`].
pub type WatchId = u64;

/// Callback invoked with each update.
pub type PositionCallback = Box<dyn FnMut(GeoUpdate) + Send>;

/// A platform position service (`getCurrentPosition` / `watchPosition` /
/// `clearWatch` semantics).
pub trait PositionSource: Send {
    /// One-shot request. The callback fires once, possibly later.
    fn request_position(&mut self, callback: PositionCallback);

    /// Open a continuous watch. The callback fires on every reading until
    /// [`PositionSource::clear_watch`] is called with the returned id.
    fn watch_position(
        &mut self,
        callback: PositionCallback,
    ) -> std::result::Result<WatchId, GeolocationError>;

    /// Cancel a watch. Unknown ids are ignored.
    fn clear_watch(&mut self, id: WatchId);
}

// ============================================================================
// Adapter
// ============================================================================

/// Owns a position source and the lifetime of its watch.
pub struct GeolocationAdapter<S: PositionSource> {
    source: S,
    watch_id: Option<WatchId>,
    mounted: bool,
}

impl<S: PositionSource> GeolocationAdapter<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            watch_id: None,
            mounted: false,
        }
    }

    /// Request the current position, then start watching. Updates are sent to
    /// `sink`. Mounting twice is a no-op.
    pub fn mount(&mut self, sink: Sender<GeoUpdate>) {
        if self.mounted {
            debug!("[Geolocation] Already mounted");
            return;
        }
        self.mounted = true;

        self.source.request_position(forward_to(sink.clone()));

        match self.source.watch_position(forward_to(sink)) {
            Ok(id) => {
                info!("[Geolocation] Watching position (watch {})", id);
                self.watch_id = Some(id);
            }
            Err(e) => warn!("[Geolocation] Could not watch position: {}", e),
        }
    }

    /// Cancel the watch, if any. Safe to call repeatedly.
    pub fn unmount(&mut self) {
        if let Some(id) = self.watch_id.take() {
            self.source.clear_watch(id);
            info!("[Geolocation] Cleared watch {}", id);
        }
        self.mounted = false;
    }

    pub fn is_watching(&self) -> bool {
        self.watch_id.is_some()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: PositionSource> Drop for GeolocationAdapter<S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn forward_to(sink: Sender<GeoUpdate>) -> PositionCallback {
    Box::new(move |update| {
        // Receiver gone means the host loop has shut down
        if sink.send(update).is_err() {
            debug!("[Geolocation] Dropping update, receiver closed");
        }
    })
}

// ============================================================================
// Bridged Source
// ============================================================================

#[derive(Default)]
struct FeedState {
    supported: bool,
    next_watch_id: WatchId,
    pending: Vec<PositionCallback>,
    watches: Vec<(WatchId, PositionCallback)>,
    /// Watches taken out by a running `publish`
    delivering: Vec<WatchId>,
    /// Watches cleared while their callback was taken out
    cleared: Vec<WatchId>,
}

/// Publishing side of a [`BridgedPositionSource`].
///
/// The platform bridge (browser shell, mobile host) calls [`PositionFeed::publish`]
/// for every reading it receives. Pending one-shot requests are answered and
/// every open watch is notified.
#[derive(Clone)]
pub struct PositionFeed {
    state: Arc<Mutex<FeedState>>,
}

impl PositionFeed {
    /// Feed for a platform with a geolocation service.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState {
                supported: true,
                next_watch_id: 1,
                ..FeedState::default()
            })),
        }
    }

    /// Feed for a platform without one: requests fail with `Unsupported`.
    pub fn unsupported() -> Self {
        let feed = Self::new();
        feed.lock().supported = false;
        feed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver a reading to pending requests and open watches.
    ///
    /// Callbacks run without the feed locked, so they may call back into the
    /// feed or its sources.
    pub fn publish(&self, update: GeoUpdate) {
        let (pending, mut watches) = {
            let mut state = self.lock();
            let pending = std::mem::take(&mut state.pending);
            let watches = std::mem::take(&mut state.watches);
            state.delivering.extend(watches.iter().map(|(id, _)| *id));
            (pending, watches)
        };

        for mut callback in pending {
            callback(update);
        }
        for (_, callback) in watches.iter_mut() {
            callback(update);
        }

        let mut state = self.lock();
        state
            .delivering
            .retain(|id| !watches.iter().any(|(taken, _)| taken == id));
        let cleared = std::mem::take(&mut state.cleared);
        watches.retain(|(id, _)| !cleared.contains(id));
        // Watches opened by a callback come after the existing ones
        watches.append(&mut state.watches);
        state.watches = watches;
    }

    /// Number of open watches.
    pub fn watch_count(&self) -> usize {
        let state = self.lock();
        state.watches.len() + state.delivering.len()
    }

    /// A source reading from this feed.
    pub fn source(&self) -> BridgedPositionSource {
        BridgedPositionSource { feed: self.clone() }
    }
}

impl Default for PositionFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Position source fed by a [`PositionFeed`].
pub struct BridgedPositionSource {
    feed: PositionFeed,
}

impl PositionSource for BridgedPositionSource {
    fn request_position(&mut self, mut callback: PositionCallback) {
        let mut state = self.feed.lock();
        if state.supported {
            state.pending.push(callback);
        } else {
            drop(state);
            callback(Err(GeolocationError::Unsupported));
        }
    }

    fn watch_position(
        &mut self,
        callback: PositionCallback,
    ) -> std::result::Result<WatchId, GeolocationError> {
        let mut state = self.feed.lock();
        if !state.supported {
            return Err(GeolocationError::Unsupported);
        }
        let id = state.next_watch_id;
        state.next_watch_id += 1;
        state.watches.push((id, callback));
        Ok(id)
    }

    fn clear_watch(&mut self, id: WatchId) {
        let mut state = self.feed.lock();
        state.watches.retain(|(watch_id, _)| *watch_id != id);
        if let Some(index) = state.delivering.iter().position(|w| *w == id) {
            state.delivering.remove(index);
            state.cleared.push(id);
        }
    }
}
