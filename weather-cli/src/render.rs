//! Terminal rendering of a `WeatherState`.

use chrono::{DateTime, Local, Utc};
use weather_core::{AirQuality, CurrentWeather, Forecast, LoadPhase, Units, WeatherState};

pub fn format_temperature(temp: f64, units: Units) -> String {
    format!("{}{}", temp.round() as i64, units.temperature_symbol())
}

fn local_time(ts: DateTime<Utc>, fmt: &str) -> String {
    ts.with_timezone(&Local).format(fmt).to_string()
}

pub fn state(state: &WeatherState) {
    match state.phase() {
        LoadPhase::Idle => println!("No weather loaded yet."),
        LoadPhase::Loading => println!("Loading..."),
        LoadPhase::Loaded | LoadPhase::Failed => {}
    }

    if let Some(error) = &state.error {
        println!("! {error}");
        if state.current.is_none() {
            println!("  Try again, or search for another place.");
        }
    }

    if let Some(current) = &state.current {
        current_weather(current);
    }
    if let Some(air) = &state.air_quality {
        air_quality(air);
    }
}

pub fn current_weather(current: &CurrentWeather) {
    let units = current.units;
    let place = match &current.country {
        Some(country) => format!("{}, {}", current.name, country),
        None => current.name.clone(),
    };

    println!("{place}  ({})", local_time(current.observed_at, "%a %b %-d, %H:%M"));
    println!(
        "  {}  {}, feels like {}",
        format_temperature(current.temperature, units),
        current.condition.description,
        format_temperature(current.feels_like, units),
    );
    println!(
        "  Humidity {}%  Pressure {} hPa",
        current.humidity_pct, current.pressure_hpa
    );

    let direction = current.wind.compass().unwrap_or("-");
    println!(
        "  Wind {:.1} {} {direction} (Beaufort {})",
        current.wind.speed,
        units.speed_symbol(),
        current.wind.beaufort(units),
    );

    if let (Some(sunrise), Some(sunset)) = (current.sunrise, current.sunset) {
        println!(
            "  Sunrise {}  Sunset {}",
            local_time(sunrise, "%H:%M"),
            local_time(sunset, "%H:%M")
        );
    }
}

pub fn air_quality(air: &AirQuality) {
    if let Some(reading) = air.latest() {
        println!(
            "  Air quality: {} (AQI {})  PM2.5 {:.1}  PM10 {:.1}  O3 {:.1} μg/m³",
            reading.level().label(),
            reading.aqi,
            reading.pollutants.pm2_5,
            reading.pollutants.pm10,
            reading.pollutants.o3,
        );
    }
}

pub fn forecast(forecast: &Forecast) {
    println!("5-day forecast for {}", forecast.city);
    for day in forecast.daily() {
        println!(
            "  {:<10} {:>6} / {:<6} {}",
            day.date.format("%a %d").to_string(),
            format_temperature(day.max_temperature, forecast.units),
            format_temperature(day.min_temperature, forecast.units),
            day.summary.condition.description,
        );
    }
}

pub fn history(state: &WeatherState) {
    if state.history.is_empty() {
        println!("No recent searches.");
        return;
    }
    println!("Recent searches:");
    for (i, name) in state.history.entries().iter().enumerate() {
        println!("  {}. {name}", i + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperatures_are_rounded_with_symbol() {
        assert_eq!(format_temperature(18.6, Units::Metric), "19°C");
        assert_eq!(format_temperature(-0.4, Units::Metric), "0°C");
        assert_eq!(format_temperature(65.5, Units::Imperial), "66°F");
    }
}
