//! WiFi spot records.

use serde::{Deserialize, Serialize};

use crate::LatLng;

/// Spot identifier. Seed spots use 1..=3, user spots a millisecond timestamp.
pub type SpotId = i64;

/// A WiFi hotspot with location and quality metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiSpot {
    pub id: SpotId,
    pub name: String,
    /// Display label including the unit, e.g. "50 Mbps"
    pub speed: String,
    pub is_free: bool,
    /// Average rating, 0 to 5
    pub rating: f64,
    pub reviews: u32,
    pub lat: f64,
    pub lng: f64,
}

impl WifiSpot {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Numeric speed parsed from the label, if it starts with a number.
    pub fn speed_mbps(&self) -> Option<f64> {
        parse_speed_mbps(&self.speed)
    }

    /// "Free" or "Paid".
    pub fn access_label(&self) -> &'static str {
        if self.is_free {
            "Free"
        } else {
            "Paid"
        }
    }
}

/// Parse the leading number of a speed label ("50 Mbps" -> 50.0).
pub fn parse_speed_mbps(label: &str) -> Option<f64> {
    let token = label.split_whitespace().next()?;
    let value: f64 = token.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Attach the unit label to a raw speed entry ("30" -> "30 Mbps").
pub fn format_speed(raw: &str, unit: &str) -> String {
    format!("{} {}", raw.trim(), unit)
}

/// In-progress attributes of a spot being created.
///
/// `speed` holds the raw entry without unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotDraft {
    pub name: String,
    pub speed: String,
    pub is_free: bool,
    pub rating: f64,
    pub reviews: u32,
    pub lat: f64,
    pub lng: f64,
}

impl Default for SpotDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            speed: String::new(),
            is_free: true,
            rating: 5.0,
            reviews: 0,
            lat: 0.0,
            lng: 0.0,
        }
    }
}

impl SpotDraft {
    /// Turn the draft into a stored record.
    pub fn into_spot(self, id: SpotId, speed_unit: &str) -> WifiSpot {
        WifiSpot {
            id,
            speed: format_speed(&self.speed, speed_unit),
            name: self.name.trim().to_string(),
            is_free: self.is_free,
            rating: self.rating,
            reviews: self.reviews,
            lat: self.lat,
            lng: self.lng,
        }
    }
}
