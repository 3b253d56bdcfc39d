//! Finder configuration.
//!
//! Everything here has a working default; hosts may override any subset of
//! fields from JSON (missing fields fall back to the defaults).

use serde::{Deserialize, Serialize};

use crate::tiles::MAX_ZOOM;
use crate::{FinderError, LatLng, Result};

/// Raster tile source for the base map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerConfig {
    /// URL with `{s}`, `{z}`, `{x}`, `{y}` placeholders.
    pub url_template: String,
    /// Values substituted for `{s}`, rotated by tile position.
    pub subdomains: Vec<String>,
    /// Attribution HTML the provider requires to be displayed.
    pub attribution: String,
    pub max_zoom: u8,
}

impl Default for TileLayerConfig {
    fn default() -> Self {
        Self {
            url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors"
                .to_string(),
            max_zoom: 19,
        }
    }
}

/// Line style for the route overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteStyle {
    /// CSS color string
    pub color: String,
    /// Line width in pixels
    pub weight: f32,
}

impl Default for RouteStyle {
    fn default() -> Self {
        Self {
            color: "#6366F1".to_string(),
            weight: 4.0,
        }
    }
}

/// Top-level configuration for a [`crate::FinderEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Map center before the first geolocation fix.
    /// Default: downtown Los Angeles
    pub default_center: LatLng,

    /// Initial zoom level. Default: 13
    pub default_zoom: u8,

    pub tile_layer: TileLayerConfig,

    pub route_style: RouteStyle,

    /// Unit appended to the speed entered in the creation modal.
    /// Default: "Mbps"
    pub speed_unit: String,

    /// Confirmation text shown after a double-click on the map.
    pub add_spot_prompt: String,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            default_center: LatLng::new(34.052235, -118.243683),
            default_zoom: 13,
            tile_layer: TileLayerConfig::default(),
            route_style: RouteStyle::default(),
            speed_unit: "Mbps".to_string(),
            add_spot_prompt: "Would you like to add a WiFi spot here?".to_string(),
        }
    }
}

impl FinderConfig {
    /// Parse a (possibly partial) JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FinderConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<()> {
        if !self.default_center.is_valid() {
            return Err(FinderError::Config {
                message: format!(
                    "default_center ({}, {}) is out of range",
                    self.default_center.lat, self.default_center.lng
                ),
            });
        }
        if self.tile_layer.max_zoom > MAX_ZOOM {
            return Err(FinderError::Config {
                message: format!(
                    "tile max_zoom {} exceeds {}",
                    self.tile_layer.max_zoom, MAX_ZOOM
                ),
            });
        }
        if self.default_zoom > self.tile_layer.max_zoom {
            return Err(FinderError::Config {
                message: format!(
                    "default_zoom {} exceeds tile max_zoom {}",
                    self.default_zoom, self.tile_layer.max_zoom
                ),
            });
        }
        if self.speed_unit.trim().is_empty() {
            return Err(FinderError::Config {
                message: "speed_unit must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
