use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::ApiError,
    model::{AirQuality, Coordinates, CurrentWeather, Forecast, Units},
};

pub mod openweather;

pub use openweather::OpenWeatherProvider;

/// Read-only weather data service.
///
/// Implementations translate one request into one response and never retry;
/// fallback policy belongs to the caller.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current_by_name(&self, name: &str, units: Units) -> Result<CurrentWeather, ApiError>;

    async fn current_by_coords(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<CurrentWeather, ApiError>;

    async fn forecast_by_name(&self, name: &str, units: Units) -> Result<Forecast, ApiError>;

    async fn forecast_by_coords(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<Forecast, ApiError>;

    async fn air_quality(&self, coords: Coordinates) -> Result<AirQuality, ApiError>;
}
