use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit system requested from the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Units::Metric => Units::Imperial,
            Units::Imperial => Units::Metric,
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown units '{value}'. Supported units: metric, imperial."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Weather condition as reported by the service (code, group, description, icon).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub code: u32,
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// Metres per second for metric, miles per hour for imperial.
    pub speed: f64,
    pub direction_deg: Option<f64>,
}

impl Wind {
    /// 16-point compass direction the wind blows from.
    pub fn compass(&self) -> Option<&'static str> {
        const POINTS: [&str; 16] = [
            "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
            "NW", "NNW",
        ];
        let deg = self.direction_deg?.rem_euclid(360.0);
        let idx = (deg / 22.5).round() as usize % POINTS.len();
        Some(POINTS[idx])
    }

    /// Beaufort force (0-12) for a speed expressed in `units`.
    pub fn beaufort(&self, units: Units) -> u8 {
        const KMH_THRESHOLDS: [f64; 12] =
            [1.0, 6.0, 12.0, 20.0, 29.0, 39.0, 50.0, 62.0, 75.0, 89.0, 103.0, 118.0];

        let mps = match units {
            Units::Metric => self.speed,
            Units::Imperial => self.speed * 0.44704,
        };
        let kmh = mps * 3.6;

        KMH_THRESHOLDS
            .iter()
            .position(|limit| kmh < *limit)
            .unwrap_or(KMH_THRESHOLDS.len()) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub name: String,
    pub country: Option<String>,
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: u8,
    pub pressure_hpa: u32,
    pub wind: Wind,
    pub condition: Condition,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub coords: Coordinates,
    pub units: Units,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: u8,
    pub wind: Wind,
    pub condition: Condition,
    /// Probability of precipitation, 0.0..=1.0.
    pub precipitation_chance: Option<f64>,
}

/// 5 day / 3 hour forecast for one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub city: String,
    pub country: Option<String>,
    pub coords: Option<Coordinates>,
    pub points: Vec<ForecastPoint>,
    pub units: Units,
}

/// Forecast points of one calendar day, summarised by the point nearest noon.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast<'a> {
    pub date: NaiveDate,
    pub summary: &'a ForecastPoint,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub points: Vec<&'a ForecastPoint>,
}

impl Forecast {
    /// Group points by UTC day, in forecast order.
    pub fn daily(&self) -> Vec<DailyForecast<'_>> {
        let mut days: Vec<(NaiveDate, Vec<&ForecastPoint>)> = Vec::new();

        for point in &self.points {
            let date = point.time.date_naive();
            match days.last_mut() {
                Some((day, points)) if *day == date => points.push(point),
                _ => days.push((date, vec![point])),
            }
        }

        days.into_iter()
            .filter_map(|(date, points)| {
                let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0)?).and_utc();
                let summary = *points
                    .iter()
                    .min_by_key(|p| (p.time - noon).num_seconds().abs())?;
                let min_temperature =
                    points.iter().map(|p| p.temperature).fold(f64::INFINITY, f64::min);
                let max_temperature =
                    points.iter().map(|p| p.temperature).fold(f64::NEG_INFINITY, f64::max);

                Some(DailyForecast {
                    date,
                    summary,
                    min_temperature,
                    max_temperature,
                    points,
                })
            })
            .collect()
    }
}

/// Pollutant concentrations in μg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pollutants {
    pub co: f64,
    pub no: f64,
    pub no2: f64,
    pub o3: f64,
    pub so2: f64,
    pub pm2_5: f64,
    pub pm10: f64,
    pub nh3: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    pub time: DateTime<Utc>,
    /// Air quality index, 1 (good) to 5 (very poor).
    pub aqi: u8,
    pub pollutants: Pollutants,
}

impl AirQualityReading {
    pub fn level(&self) -> AqiLevel {
        AqiLevel::from_index(self.aqi)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQuality {
    pub coords: Coordinates,
    pub readings: Vec<AirQualityReading>,
}

impl AirQuality {
    pub fn latest(&self) -> Option<&AirQualityReading> {
        self.readings.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AqiLevel {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
    Unknown,
}

impl AqiLevel {
    pub fn from_index(aqi: u8) -> Self {
        match aqi {
            1 => Self::Good,
            2 => Self::Fair,
            3 => Self::Moderate,
            4 => Self::Poor,
            5 => Self::VeryPoor,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
            Self::Unknown => "Unknown",
        }
    }
}
