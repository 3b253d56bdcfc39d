//! Unified error handling for the wifi-finder library.
//!
//! Every integration point (geolocation, routing, the host map surface, spot
//! creation) returns a typed [`Result`]. The boundary that decides a failure
//! is non-fatal logs it and carries on; nothing is intercepted globally.

use std::fmt;

use crate::geolocation::GeolocationError;

/// Unified error type for wifi-finder operations.
#[derive(Debug, Clone, PartialEq)]
pub enum FinderError {
    /// A required field of a new spot is missing or malformed
    InvalidSpot { field: String, message: String },
    /// No spot with this id exists in the store
    SpotNotFound { id: i64 },
    /// Latitude/longitude out of range or not finite
    InvalidCoordinates { message: String },
    /// Position could not be obtained
    Geolocation(GeolocationError),
    /// The routing provider could not produce a path
    Routing { message: String },
    /// HTTP/API error
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// The host map surface rejected a layer operation
    MapLayer { message: String },
    /// Configuration error
    Config { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl fmt::Display for FinderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinderError::InvalidSpot { field, message } => {
                write!(f, "Invalid spot field '{}': {}", field, message)
            }
            FinderError::SpotNotFound { id } => write!(f, "Spot {} not found", id),
            FinderError::InvalidCoordinates { message } => {
                write!(f, "Invalid coordinates: {}", message)
            }
            FinderError::Geolocation(err) => write!(f, "Geolocation error: {}", err),
            FinderError::Routing { message } => write!(f, "Routing failed: {}", message),
            FinderError::Http {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "HTTP error ({}): {}", code, message)
                } else {
                    write!(f, "HTTP error: {}", message)
                }
            }
            FinderError::MapLayer { message } => write!(f, "Map layer error: {}", message),
            FinderError::Config { message } => write!(f, "Configuration error: {}", message),
            FinderError::Internal { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for FinderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FinderError::Geolocation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GeolocationError> for FinderError {
    fn from(err: GeolocationError) -> Self {
        FinderError::Geolocation(err)
    }
}

impl From<serde_json::Error> for FinderError {
    fn from(err: serde_json::Error) -> Self {
        FinderError::Config {
            message: err.to_string(),
        }
    }
}

/// Result type alias for wifi-finder operations.
pub type Result<T> = std::result::Result<T, FinderError>;

/// Extension trait for converting Option to FinderError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a spot-not-found error.
    fn ok_or_spot_not_found(self, id: i64) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_spot_not_found(self, id: i64) -> Result<T> {
        self.ok_or(FinderError::SpotNotFound { id })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| FinderError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FinderError::InvalidSpot {
            field: "name".to_string(),
            message: "required".to_string(),
        };
        assert!(err.to_string().contains("name"));
        assert!(err.to_string().contains("required"));

        let err = FinderError::Http {
            message: "Too Many Requests".to_string(),
            status_code: Some(429),
        };
        assert_eq!(err.to_string(), "HTTP error (429): Too Many Requests");
    }

    #[test]
    fn test_geolocation_conversion() {
        let err: FinderError = GeolocationError::PermissionDenied.into();
        assert!(matches!(
            err,
            FinderError::Geolocation(GeolocationError::PermissionDenied)
        ));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        assert_eq!(
            none.ok_or_spot_not_found(7),
            Err(FinderError::SpotNotFound { id: 7 })
        );
        assert!(matches!(
            None::<i32>.ok_or_internal("boom"),
            Err(FinderError::Internal { .. })
        ));
    }
}
