//! Weather state store.
//!
//! Owns everything the presentation layer reads (current conditions,
//! forecast, air quality, loading/error flags, active location, units and
//! search history) and the only operations allowed to change it.
//!
//! Every load runs as a numbered session: a primary attempt, then at most
//! one fallback attempt against the default location. Results from a
//! session that has since been superseded by a newer one are dropped.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    config::DEFAULT_LOCATION,
    error::{ApiError, GeoError},
    geolocation::GeolocationProvider,
    history::SearchHistory,
    model::{AirQuality, Coordinates, CurrentWeather, Forecast, Units},
    provider::WeatherProvider,
    storage::{HISTORY_KEY, KeyValueStore, UNITS_KEY},
};

/// Shown when the default-location fallback fails as well.
pub const FALLBACK_FAILURE_MESSAGE: &str = "Failed to load weather data. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Snapshot of everything the presentation layer may read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherState {
    pub current: Option<CurrentWeather>,
    pub forecast: Option<Forecast>,
    pub air_quality: Option<AirQuality>,
    pub loading: bool,
    pub error: Option<String>,
    /// Place currently represented by `current`.
    pub location: Option<String>,
    pub history: SearchHistory,
    pub units: Units,
}

impl WeatherState {
    pub fn phase(&self) -> LoadPhase {
        if self.loading {
            LoadPhase::Loading
        } else if self.current.is_some() {
            LoadPhase::Loaded
        } else if self.error.is_some() {
            LoadPhase::Failed
        } else {
            LoadPhase::Idle
        }
    }

    fn clear_weather(&mut self) {
        self.current = None;
        self.forecast = None;
        self.air_quality = None;
    }
}

#[derive(Debug, Clone)]
enum LoadTarget {
    Name(String),
    Coords(Coordinates),
}

impl LoadTarget {
    /// Name shown as the active location.
    fn resolved_name(&self, current: &CurrentWeather) -> String {
        match self {
            LoadTarget::Coords(coords) if current.name.trim().is_empty() => coords.to_string(),
            _ => self.history_name(current).unwrap_or_default(),
        }
    }

    /// Name recorded in search history. A bare coordinate label is not a
    /// searchable place, so it is never recorded.
    fn history_name(&self, current: &CurrentWeather) -> Option<String> {
        match self {
            LoadTarget::Name(name) => Some(name.clone()),
            LoadTarget::Coords(_) if current.name.trim().is_empty() => None,
            LoadTarget::Coords(_) => Some(current.name.clone()),
        }
    }
}

#[derive(Debug)]
struct Loaded {
    current: CurrentWeather,
    forecast: Forecast,
    air_quality: Option<AirQuality>,
}

#[derive(Debug)]
pub struct WeatherStore {
    provider: Arc<dyn WeatherProvider>,
    storage: Arc<dyn KeyValueStore>,
    default_location: String,
    state: watch::Sender<WeatherState>,
    latest_session: AtomicU64,
    /// Target of the most recently started session.
    requested: Mutex<Option<LoadTarget>>,
    /// Target whose result is currently installed.
    active: Mutex<Option<LoadTarget>>,
    load_started: AtomicBool,
    initialized: AtomicBool,
}

impl WeatherStore {
    /// Build the store, seeding units and search history from `storage`.
    pub fn new(provider: Arc<dyn WeatherProvider>, storage: Arc<dyn KeyValueStore>) -> Self {
        let initial = WeatherState {
            units: load_units(storage.as_ref()),
            history: load_history(storage.as_ref()),
            ..WeatherState::default()
        };
        let (state, _) = watch::channel(initial);

        Self {
            provider,
            storage,
            default_location: DEFAULT_LOCATION.to_string(),
            state,
            latest_session: AtomicU64::new(0),
            requested: Mutex::new(None),
            active: Mutex::new(None),
            load_started: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_default_location(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.default_location = name.trim().to_string();
        }
        self
    }

    pub fn default_location(&self) -> &str {
        &self.default_location
    }

    pub fn snapshot(&self) -> WeatherState {
        self.state.borrow().clone()
    }

    /// Change notifications for the presentation layer.
    pub fn subscribe(&self) -> watch::Receiver<WeatherState> {
        self.state.subscribe()
    }

    /// Load weather for a place name. Blank names are ignored.
    pub async fn load_by_name(&self, place: &str) {
        let place = place.trim();
        if place.is_empty() {
            debug!("No place provided, ignoring load request");
            return;
        }
        self.run_session(LoadTarget::Name(place.to_string())).await;
    }

    /// Load weather for coordinates; the service resolves the place name.
    pub async fn load_by_coordinates(&self, coords: Coordinates) {
        if !valid_coordinates(coords) {
            warn!(%coords, "Ignoring load request for invalid coordinates");
            return;
        }
        self.run_session(LoadTarget::Coords(coords)).await;
    }

    /// Flip metric/imperial, persist it, and re-fetch what is shown.
    ///
    /// A load still in flight was started under the old units, so its
    /// target is fetched again and the stale session superseded.
    pub async fn toggle_units(&self) {
        let mut units = Units::default();
        let mut loading = false;
        self.state.send_modify(|s| {
            s.units = s.units.toggled();
            units = s.units;
            loading = s.loading;
        });

        info!(%units, "Units changed");
        if let Err(e) = self.storage.set(UNITS_KEY, units.as_str()) {
            warn!("Failed to persist units: {e:#}");
        }

        let target = if loading {
            self.requested.lock().clone()
        } else {
            self.active.lock().clone()
        };
        if let Some(target) = target {
            self.run_session(target).await;
        }
    }

    pub fn clear_search_history(&self) {
        self.state.send_modify(|s| s.history.clear());
        if let Err(e) = self.storage.remove(HISTORY_KEY) {
            warn!("Failed to remove persisted search history: {e:#}");
        }
    }

    /// Startup load: geolocated position if available, else the default location.
    ///
    /// Runs at most once, and not at all if another load has already begun
    /// or weather is already present. Geolocation failures are only logged.
    pub async fn initialize(&self, geolocation: GeolocationProvider) {
        let position = geolocation.resolve().await;

        if self.initialized.swap(true, Ordering::SeqCst)
            || self.load_started.load(Ordering::SeqCst)
            || self.state.borrow().current.is_some()
        {
            debug!("Weather already loading or loaded, skipping initial load");
            return;
        }

        match position {
            Ok(coords) if valid_coordinates(coords) => self.load_by_coordinates(coords).await,
            Ok(coords) => {
                warn!(
                    %coords,
                    "Geolocated position out of range, loading {}", self.default_location
                );
                self.load_by_name(&self.default_location).await;
            }
            Err(e) => {
                warn!("Geolocation unavailable ({e}), loading {}", self.default_location);
                self.load_by_name(&self.default_location).await;
            }
        }
    }

    /// Explicit "use my location" action. Geolocation failures are surfaced
    /// alongside a load of the default location.
    pub async fn use_current_position(&self, geolocation: GeolocationProvider) {
        self.load_started.store(true, Ordering::SeqCst);

        let geo_error = match geolocation.resolve().await {
            Ok(coords) if valid_coordinates(coords) => {
                self.run_session(LoadTarget::Coords(coords)).await;
                return;
            }
            Ok(coords) => {
                warn!(%coords, "Geolocated position out of range");
                GeoError::PositionUnavailable
            }
            Err(e) => e,
        };

        let session = self
            .run_session(LoadTarget::Name(self.default_location.clone()))
            .await;
        if !self.is_current(session) {
            return;
        }

        let reason = geo_error.user_message();
        let default_location = &self.default_location;
        self.state.send_modify(|s| {
            let message = match s.error.take() {
                Some(load_error) => format!("{reason} {load_error}"),
                None => format!("{reason} Showing {default_location} instead."),
            };
            s.error = Some(message);
        });
    }

    /// Primary attempt plus at most one fallback to the default location.
    async fn run_session(&self, target: LoadTarget) -> u64 {
        let session = self.begin_session(&target);
        let units = self.state.borrow().units;
        debug!(session, ?target, %units, "Load started");

        let error = match self.attempt(&target, units).await {
            Ok(loaded) => {
                self.install(session, &target, loaded);
                self.finish(session);
                return session;
            }
            Err(e) => e,
        };

        warn!(session, ?target, "Weather load failed: {error}");
        if !self.is_current(session) {
            debug!(session, "Discarding failure of superseded session");
            return session;
        }
        self.state.send_modify(|s| {
            s.error = Some(error.user_message());
            s.clear_weather();
        });

        if !self.allows_fallback(&target) {
            self.finish(session);
            return session;
        }

        info!(session, "Trying to load {} instead", self.default_location);
        let fallback = LoadTarget::Name(self.default_location.clone());
        match self.attempt(&fallback, units).await {
            Ok(loaded) => self.install(session, &fallback, loaded),
            Err(e) => {
                warn!(session, "Fallback to {} failed: {e}", self.default_location);
                if self.is_current(session) {
                    self.state
                        .send_modify(|s| s.error = Some(FALLBACK_FAILURE_MESSAGE.to_string()));
                }
            }
        }

        self.finish(session);
        session
    }

    /// Current weather and forecast must both succeed; air quality is best-effort.
    async fn attempt(&self, target: &LoadTarget, units: Units) -> Result<Loaded, ApiError> {
        let (current, forecast) = match target {
            LoadTarget::Name(name) => {
                tokio::join!(
                    self.provider.current_by_name(name, units),
                    self.provider.forecast_by_name(name, units)
                )
            }
            LoadTarget::Coords(coords) => {
                tokio::join!(
                    self.provider.current_by_coords(*coords, units),
                    self.provider.forecast_by_coords(*coords, units)
                )
            }
        };
        let (current, forecast) = (current?, forecast?);

        let air_quality = match self.provider.air_quality(current.coords).await {
            Ok(air) => Some(air),
            Err(e) => {
                warn!("Air quality unavailable for {}: {e}", current.name);
                None
            }
        };

        Ok(Loaded {
            current,
            forecast,
            air_quality,
        })
    }

    fn allows_fallback(&self, target: &LoadTarget) -> bool {
        match target {
            LoadTarget::Name(name) => !name.eq_ignore_ascii_case(&self.default_location),
            LoadTarget::Coords(_) => true,
        }
    }

    fn begin_session(&self, target: &LoadTarget) -> u64 {
        self.load_started.store(true, Ordering::SeqCst);
        let session = self.latest_session.fetch_add(1, Ordering::SeqCst) + 1;
        *self.requested.lock() = Some(target.clone());
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
        session
    }

    fn is_current(&self, session: u64) -> bool {
        self.latest_session.load(Ordering::SeqCst) == session
    }

    fn install(&self, session: u64, target: &LoadTarget, loaded: Loaded) {
        if !self.is_current(session) {
            debug!(session, "Discarding result of superseded session");
            return;
        }

        let name = target.resolved_name(&loaded.current);
        let history_name = target.history_name(&loaded.current);
        let mut recorded = None;
        self.state.send_modify(|s| {
            s.current = Some(loaded.current);
            s.forecast = Some(loaded.forecast);
            s.air_quality = loaded.air_quality;
            s.error = None;
            let changed = match &history_name {
                Some(entry) => s.history.record(entry),
                None => false,
            };
            if changed {
                recorded = Some(s.history.clone());
            }
            s.location = Some(name.clone());
        });
        *self.active.lock() = Some(target.clone());
        info!(session, location = %name, "Weather loaded");

        if let Some(history) = recorded {
            self.persist_history(&history);
        }
    }

    fn finish(&self, session: u64) {
        if self.is_current(session) {
            self.state.send_modify(|s| s.loading = false);
        }
    }

    fn persist_history(&self, history: &SearchHistory) {
        let result = serde_json::to_string(history)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.storage.set(HISTORY_KEY, &json));
        if let Err(e) = result {
            warn!("Failed to persist search history: {e:#}");
        }
    }
}

fn valid_coordinates(coords: Coordinates) -> bool {
    (-90.0..=90.0).contains(&coords.lat) && (-180.0..=180.0).contains(&coords.lon)
}

fn load_units(storage: &dyn KeyValueStore) -> Units {
    match storage.get(UNITS_KEY) {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring persisted units: {e}");
            Units::default()
        }),
        None => Units::default(),
    }
}

fn load_history(storage: &dyn KeyValueStore) -> SearchHistory {
    match storage.get(HISTORY_KEY) {
        Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring persisted search history: {e}");
            SearchHistory::default()
        }),
        None => SearchHistory::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn phase_is_derived_from_flags() {
        let mut state = WeatherState::default();
        assert_eq!(state.phase(), LoadPhase::Idle);

        state.loading = true;
        assert_eq!(state.phase(), LoadPhase::Loading);

        state.loading = false;
        state.error = Some("boom".into());
        assert_eq!(state.phase(), LoadPhase::Failed);
    }

    #[test]
    fn coordinate_validation() {
        assert!(valid_coordinates(Coordinates::new(51.5, -0.12)));
        assert!(!valid_coordinates(Coordinates::new(91.0, 0.0)));
        assert!(!valid_coordinates(Coordinates::new(0.0, -181.0)));
        assert!(!valid_coordinates(Coordinates::new(f64::NAN, 0.0)));
    }

    #[test]
    fn corrupt_persisted_values_fall_back_to_defaults() {
        let storage = MemoryStore::new();
        storage.set(UNITS_KEY, "kelvin").unwrap();
        storage.set(HISTORY_KEY, "{not json").unwrap();

        assert_eq!(load_units(&storage), Units::Metric);
        assert!(load_history(&storage).is_empty());
    }

    #[test]
    fn default_location_only_applies_when_not_blank() {
        #[derive(Debug)]
        struct NoProvider;

        #[async_trait::async_trait]
        impl WeatherProvider for NoProvider {
            async fn current_by_name(&self, _: &str, _: Units) -> Result<CurrentWeather, ApiError> {
                Err(ApiError::NotFound)
            }
            async fn current_by_coords(
                &self,
                _: Coordinates,
                _: Units,
            ) -> Result<CurrentWeather, ApiError> {
                Err(ApiError::NotFound)
            }
            async fn forecast_by_name(&self, _: &str, _: Units) -> Result<Forecast, ApiError> {
                Err(ApiError::NotFound)
            }
            async fn forecast_by_coords(
                &self,
                _: Coordinates,
                _: Units,
            ) -> Result<Forecast, ApiError> {
                Err(ApiError::NotFound)
            }
            async fn air_quality(&self, _: Coordinates) -> Result<AirQuality, ApiError> {
                Err(ApiError::NotFound)
            }
        }

        let store = WeatherStore::new(Arc::new(NoProvider), Arc::new(MemoryStore::new()));
        assert_eq!(store.default_location(), "London");

        let store = store.with_default_location("  ");
        assert_eq!(store.default_location(), "London");

        let store = store.with_default_location(" Paris ");
        assert_eq!(store.default_location(), "Paris");
    }
}
