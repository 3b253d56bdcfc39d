//! Spot filtering.
//!
//! A spot is visible when every active criterion accepts it: the name contains
//! the search text (case-insensitive), it is free when `free_only` is set, its
//! rating reaches `min_rating`, and its speed reaches `min_speed_mbps`.
//! A speed label without a leading number never passes a speed threshold.

use serde::{Deserialize, Serialize};

use crate::spot::WifiSpot;

/// Rating thresholds offered by the UI ("Any", 3+, 4+, 4.5+).
pub const RATING_THRESHOLDS: [f64; 4] = [0.0, 3.0, 4.0, 4.5];

/// Speed thresholds offered by the UI in Mbps (besides "Any").
pub const SPEED_THRESHOLDS: [f64; 3] = [10.0, 25.0, 50.0];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub search: String,
    pub free_only: bool,
    /// 0 accepts everything
    pub min_rating: f64,
    /// None accepts everything
    pub min_speed_mbps: Option<f64>,
}

impl FilterState {
    /// Whether the spot passes every criterion.
    pub fn matches(&self, spot: &WifiSpot) -> bool {
        self.matches_search(spot)
            && (!self.free_only || spot.is_free)
            && spot.rating >= self.min_rating
            && self.matches_speed(spot)
    }

    fn matches_search(&self, spot: &WifiSpot) -> bool {
        if self.search.is_empty() {
            return true;
        }
        spot.name
            .to_lowercase()
            .contains(&self.search.to_lowercase())
    }

    fn matches_speed(&self, spot: &WifiSpot) -> bool {
        match self.min_speed_mbps {
            None => true,
            Some(threshold) => spot.speed_mbps().is_some_and(|speed| speed >= threshold),
        }
    }

    /// Same filter with unusable thresholds replaced by "Any".
    ///
    /// A NaN or infinite threshold would hide every spot.
    pub fn sanitized(mut self) -> Self {
        self.min_rating = rating_threshold(self.min_rating);
        self.min_speed_mbps = speed_threshold(self.min_speed_mbps);
        self
    }

    /// True when no criterion is active.
    pub fn is_unfiltered(&self) -> bool {
        self.search.is_empty()
            && !self.free_only
            && self.min_rating <= 0.0
            && self.min_speed_mbps.is_none()
    }
}

/// Rating threshold to store: negative or non-finite input means "Any".
pub fn rating_threshold(min_rating: f64) -> f64 {
    if min_rating.is_finite() {
        min_rating.max(0.0)
    } else {
        0.0
    }
}

/// Speed threshold to store: non-finite input means "Any".
pub fn speed_threshold(min_speed_mbps: Option<f64>) -> Option<f64> {
    min_speed_mbps.filter(|speed| speed.is_finite())
}

/// Spots passing the filter, in store order.
pub fn filter_spots<'a>(spots: &'a [WifiSpot], filter: &FilterState) -> Vec<&'a WifiSpot> {
    spots.iter().filter(|spot| filter.matches(spot)).collect()
}
