use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    config::Config,
    error::ApiError,
    model::{
        AirQuality, AirQualityReading, Condition, Coordinates, CurrentWeather, Forecast,
        ForecastPoint, Pollutants, Units, Wind,
    },
};

use super::WeatherProvider;

/// Client for the OpenWeatherMap 2.5 REST API.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.api_key()?, &config.base_url, config.request_timeout())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, ?query, "OpenWeather request");

        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            warn!(%status, body = %truncate_body(&body), "OpenWeather {endpoint} request failed");
            return Err(classify_status(status));
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))
    }

    async fn fetch_current(
        &self,
        query: Vec<(&str, String)>,
        units: Units,
    ) -> Result<CurrentWeather, ApiError> {
        let parsed: OwCurrentResponse = self.get_json("weather", &query).await?;
        parsed.into_model(units)
    }

    async fn fetch_forecast(
        &self,
        query: Vec<(&str, String)>,
        units: Units,
    ) -> Result<Forecast, ApiError> {
        let parsed: OwForecastResponse = self.get_json("forecast", &query).await?;
        parsed.into_model(units)
    }
}

fn name_query(name: &str, units: Units) -> Vec<(&'static str, String)> {
    vec![("q", name.to_string()), ("units", units.as_str().to_string())]
}

fn coords_query(coords: Coordinates, units: Option<Units>) -> Vec<(&'static str, String)> {
    let mut query = vec![("lat", coords.lat.to_string()), ("lon", coords.lon.to_string())];
    if let Some(units) = units {
        query.push(("units", units.as_str().to_string()));
    }
    query
}

fn classify_status(status: StatusCode) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        other => ApiError::Transport(format!("Status: {}", other.as_u16())),
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current_by_name(&self, name: &str, units: Units) -> Result<CurrentWeather, ApiError> {
        self.fetch_current(name_query(name, units), units).await
    }

    async fn current_by_coords(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<CurrentWeather, ApiError> {
        self.fetch_current(coords_query(coords, Some(units)), units).await
    }

    async fn forecast_by_name(&self, name: &str, units: Units) -> Result<Forecast, ApiError> {
        self.fetch_forecast(name_query(name, units), units).await
    }

    async fn forecast_by_coords(
        &self,
        coords: Coordinates,
        units: Units,
    ) -> Result<Forecast, ApiError> {
        self.fetch_forecast(coords_query(coords, Some(units)), units).await
    }

    async fn air_quality(&self, coords: Coordinates) -> Result<AirQuality, ApiError> {
        let parsed: OwAirResponse =
            self.get_json("air_pollution", &coords_query(coords, None)).await?;
        parsed.into_model()
    }
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

impl From<OwCoord> for Coordinates {
    fn from(c: OwCoord) -> Self {
        Coordinates::new(c.lat, c.lon)
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    #[serde(default)]
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u32,
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    deg: Option<f64>,
}

impl From<OwWind> for Wind {
    fn from(w: OwWind) -> Self {
        Wind {
            speed: w.speed,
            direction_deg: w.deg,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwSys {
    country: Option<String>,
    sunrise: Option<i64>,
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: i64,
    coord: OwCoord,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    sys: Option<OwSys>,
}

impl OwCurrentResponse {
    fn into_model(self, units: Units) -> Result<CurrentWeather, ApiError> {
        let observed_at = unix_to_utc(self.dt)?;
        let (country, sunrise, sunset) = match self.sys {
            Some(sys) => (
                sys.country,
                sys.sunrise.map(unix_to_utc).transpose()?,
                sys.sunset.map(unix_to_utc).transpose()?,
            ),
            None => (None, None, None),
        };

        Ok(CurrentWeather {
            name: self.name,
            country,
            observed_at,
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity_pct: self.main.humidity,
            pressure_hpa: self.main.pressure.round() as u32,
            wind: self.wind.into(),
            condition: first_condition(self.weather),
            sunrise,
            sunset,
            coords: self.coord.into(),
            units,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwCity {
    name: String,
    country: Option<String>,
    coord: Option<OwCoord>,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    pop: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

impl OwForecastResponse {
    fn into_model(self, units: Units) -> Result<Forecast, ApiError> {
        let points = self
            .list
            .into_iter()
            .map(|entry| {
                Ok(ForecastPoint {
                    time: unix_to_utc(entry.dt)?,
                    temperature: entry.main.temp,
                    feels_like: entry.main.feels_like,
                    humidity_pct: entry.main.humidity,
                    wind: entry.wind.into(),
                    condition: first_condition(entry.weather),
                    precipitation_chance: entry.pop,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(Forecast {
            city: self.city.name,
            country: self.city.country,
            coords: self.city.coord.map(Coordinates::from),
            points,
            units,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwAirMain {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct OwAirEntry {
    dt: i64,
    main: OwAirMain,
    components: Pollutants,
}

#[derive(Debug, Deserialize)]
struct OwAirResponse {
    coord: OwCoord,
    list: Vec<OwAirEntry>,
}

impl OwAirResponse {
    fn into_model(self) -> Result<AirQuality, ApiError> {
        let readings = self
            .list
            .into_iter()
            .map(|entry| {
                Ok(AirQualityReading {
                    time: unix_to_utc(entry.dt)?,
                    aqi: entry.main.aqi,
                    pollutants: entry.components,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        Ok(AirQuality {
            coords: self.coord.into(),
            readings,
        })
    }
}

fn first_condition(weather: Vec<OwWeather>) -> Condition {
    weather
        .into_iter()
        .next()
        .map(|w| Condition {
            code: w.id,
            main: w.main,
            description: w.description,
            icon: w.icon,
        })
        .unwrap_or_else(|| Condition {
            code: 0,
            main: "Unknown".to_string(),
            description: "Unknown".to_string(),
            icon: String::new(),
        })
}

fn unix_to_utc(ts: i64) -> Result<DateTime<Utc>, ApiError> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| ApiError::Malformed(format!("timestamp {ts} out of range")))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(classify_status(StatusCode::NOT_FOUND), ApiError::NotFound);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), ApiError::Unauthorized);
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS), ApiError::RateLimited);
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            ApiError::Transport(msg) if msg.contains("502")
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn empty_weather_array_yields_unknown_condition() {
        let condition = first_condition(Vec::new());
        assert_eq!(condition.main, "Unknown");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = OpenWeatherProvider::new(
            "KEY".into(),
            "http://localhost:9999/data/2.5/",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(provider.base_url, "http://localhost:9999/data/2.5");
    }
}
