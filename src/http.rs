//! OSRM routing over HTTP.
//!
//! This module provides road routing for the route overlay with:
//! - A shared reqwest client with a request timeout
//! - Automatic retry with exponential backoff on transport errors and 429
//! - A blocking [`RoutingProvider`] wrapper driven by a private tokio runtime

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

use crate::routing::{RoutePath, RoutingProvider};
use crate::{FinderError, LatLng, Result};

/// Public demo server.
pub const DEFAULT_BASE_URL: &str = "https://router.project-osrm.org";

/// OSRM endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsrmConfig {
    pub base_url: String,
    /// Routing profile ("driving", "walking", "cycling" on most servers)
    pub profile: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Base retry delay; doubles per attempt, 429s wait twice as long
    pub backoff_ms: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: "driving".to_string(),
            timeout_secs: 10,
            max_retries: 3,
            backoff_ms: 500,
        }
    }
}

impl OsrmConfig {
    /// Route request URL. OSRM takes coordinates as `lng,lat`.
    pub fn route_url(&self, from: LatLng, to: LatLng) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url.trim_end_matches('/'),
            self.profile,
            from.lng,
            from.lat,
            to.lng,
            to.lat
        )
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// [lng, lat] pairs
    coordinates: Vec<[f64; 2]>,
}

/// Turn an OSRM route response body into a path. Only the first route is
/// used; alternatives are never requested.
pub fn parse_route_response(body: &str) -> Result<RoutePath> {
    let response: OsrmResponse = serde_json::from_str(body).map_err(|e| FinderError::Routing {
        message: format!("Parse error: {}", e),
    })?;

    if response.code != "Ok" {
        return Err(FinderError::Routing {
            message: match response.message {
                Some(message) => format!("{}: {}", response.code, message),
                None => response.code,
            },
        });
    }

    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| FinderError::Routing {
            message: "Response contained no routes".to_string(),
        })?;

    let points: Vec<LatLng> = route
        .geometry
        .coordinates
        .iter()
        .map(|[lng, lat]| LatLng::new(*lat, *lng))
        .collect();

    if points.len() < 2 {
        return Err(FinderError::Routing {
            message: format!("Route geometry has {} points", points.len()),
        });
    }

    Ok(RoutePath {
        points,
        distance_m: route.distance,
        duration_s: route.duration,
    })
}

// ============================================================================
// Async Client
// ============================================================================

/// Async OSRM client.
pub struct OsrmClient {
    client: Client,
    config: OsrmConfig,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FinderError::Http {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OsrmConfig {
        &self.config
    }

    /// Exponential backoff: base, 2x, 4x... capped at 16x.
    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.backoff_ms * (1u64 << attempt.min(4)))
    }

    /// Fetch a route between two coordinates.
    pub async fn fetch_route(&self, from: LatLng, to: LatLng) -> Result<RoutePath> {
        let from = from.validated()?;
        let to = to.validated()?;
        let url = self.config.route_url(from, to);

        let mut retries = 0;

        loop {
            debug!("[OsrmRouter] GET {}", url);

            match self.client.get(&url).send().await {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > self.config.max_retries {
                            return Err(FinderError::Http {
                                message: "Max retries exceeded (429)".to_string(),
                                status_code: Some(status.as_u16()),
                            });
                        }

                        let backoff = self.backoff(retries) * 2;
                        warn!(
                            "[OsrmRouter] 429, retry {} after {:?}",
                            retries, backoff
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let body = resp.text().await.map_err(|e| FinderError::Http {
                        message: format!("Failed to read response: {}", e),
                        status_code: Some(status.as_u16()),
                    })?;

                    // OSRM reports NoRoute and friends as 400 with a JSON body
                    if !status.is_success() && !body.trim_start().starts_with('{') {
                        return Err(FinderError::Http {
                            message: format!("HTTP {}", status),
                            status_code: Some(status.as_u16()),
                        });
                    }

                    return parse_route_response(&body);
                }
                Err(e) => {
                    retries += 1;
                    if retries > self.config.max_retries {
                        return Err(FinderError::Http {
                            message: format!("Request error: {}", e),
                            status_code: None,
                        });
                    }

                    let backoff = self.backoff(retries);
                    warn!(
                        "[OsrmRouter] Error: {}, retry {} after {:?}",
                        e, retries, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

// ============================================================================
// Blocking Provider
// ============================================================================

/// [`RoutingProvider`] backed by OSRM.
///
/// Runs each request to completion on a private runtime, so it must not be
/// called from inside another tokio runtime. Several threads may route at once.
pub struct OsrmRouter {
    client: OsrmClient,
    runtime: Runtime,
}

impl OsrmRouter {
    pub fn new(config: OsrmConfig) -> Result<Self> {
        let runtime = Runtime::new().map_err(|e| FinderError::Internal {
            message: format!("Failed to create tokio runtime: {}", e),
        })?;

        info!(
            "[OsrmRouter] Using {} ({})",
            config.base_url, config.profile
        );

        Ok(Self {
            client: OsrmClient::new(config)?,
            runtime,
        })
    }

    pub fn config(&self) -> &OsrmConfig {
        self.client.config()
    }
}

impl RoutingProvider for OsrmRouter {
    fn route(&self, from: LatLng, to: LatLng) -> Result<RoutePath> {
        self.runtime.block_on(self.client.fetch_route(from, to))
    }

    fn name(&self) -> &str {
        "osrm"
    }
}
