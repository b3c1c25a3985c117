//! Core library for the `weather` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The OpenWeather data-service client behind the `WeatherProvider` trait
//! - One-shot geolocation with its own timeout
//! - Persisted preferences (units, search history)
//! - `WeatherStore`, which decides what to fetch, when to fall back to the
//!   default location, and keeps the rendered state consistent
//!
//! It is used by `weather-cli`, but any front end can drive a `WeatherStore`.

pub mod config;
pub mod error;
pub mod geolocation;
pub mod history;
pub mod model;
pub mod provider;
pub mod storage;
pub mod store;

pub use config::{Config, GeoSource, GeolocationConfig};
pub use error::{ApiError, GeoError};
pub use geolocation::{GeolocationProvider, PositionSource};
pub use history::SearchHistory;
pub use model::{
    AirQuality, AqiLevel, Coordinates, CurrentWeather, Forecast, ForecastPoint, Units, Wind,
};
pub use provider::{OpenWeatherProvider, WeatherProvider};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{LoadPhase, WeatherState, WeatherStore};
