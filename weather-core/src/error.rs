//! Error taxonomy for the data service and the geolocation capability.

use thiserror::Error;

/// Failures of a single weather-service request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Location not found")]
    NotFound,

    #[error("API key rejected by the weather service")]
    Unauthorized,

    #[error("Rate limited by the weather service")]
    RateLimited,

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Human-readable message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound => {
                "Location not found. Please check the city name and try again.".to_string()
            }
            Self::Unauthorized => {
                "API key is invalid or expired. Please check your API key.".to_string()
            }
            Self::RateLimited => "Too many requests. Please try again later.".to_string(),
            Self::Timeout => {
                "Request timed out. Please check your internet connection and try again."
                    .to_string()
            }
            Self::Transport(detail) => {
                format!("Failed to fetch weather data ({detail}). Check your connection.")
            }
            Self::Malformed(_) => "The weather service returned unexpected data.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Malformed(e.without_url().to_string())
        } else {
            // The request URL carries the API key.
            Self::Transport(e.without_url().to_string())
        }
    }
}

/// Failures of a position lookup.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoError {
    #[error("Geolocation is not supported")]
    Unsupported,

    #[error("Geolocation permission denied")]
    PermissionDenied,

    #[error("Position unavailable")]
    PositionUnavailable,

    #[error("Geolocation request timed out")]
    Timeout,
}

impl GeoError {
    pub fn user_message(&self) -> String {
        let reason = match self {
            Self::Unsupported => "Geolocation is not supported on this system.",
            Self::PermissionDenied => "You denied the request for geolocation.",
            Self::PositionUnavailable => "Location information is unavailable.",
            Self::Timeout => "The request to get your location timed out.",
        };
        format!("Unable to get your location. {reason}")
    }
}
