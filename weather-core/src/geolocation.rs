//! One-shot position lookup with its own outer timeout.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::{
    config::{GeoSource, GeolocationConfig},
    error::GeoError,
    model::Coordinates,
};

pub const DEFAULT_LOOKUP_URL: &str = "http://ip-api.com/json";

/// The underlying platform capability.
///
/// `timeout` is the platform-level bound; implementations should honour it
/// but callers never rely on that.
#[async_trait]
pub trait PositionSource: Send + Sync + Debug {
    async fn current_position(&self, timeout: Duration) -> Result<Coordinates, GeoError>;
}

/// Resolves the current position exactly once.
#[derive(Debug)]
pub struct GeolocationProvider {
    source: Option<Arc<dyn PositionSource>>,
    timeout: Duration,
    platform_timeout: Duration,
}

impl GeolocationProvider {
    pub fn new(source: Arc<dyn PositionSource>) -> Self {
        let defaults = GeolocationConfig::default();
        Self {
            source: Some(source),
            timeout: defaults.timeout(),
            platform_timeout: defaults.platform_timeout(),
        }
    }

    /// A provider on a system without any location capability.
    pub fn unsupported() -> Self {
        let defaults = GeolocationConfig::default();
        Self {
            source: None,
            timeout: defaults.timeout(),
            platform_timeout: defaults.platform_timeout(),
        }
    }

    pub fn from_config(config: &GeolocationConfig) -> anyhow::Result<Self> {
        let source: Option<Arc<dyn PositionSource>> = match config.source {
            GeoSource::Ip => {
                let url = config.lookup_url.as_deref().unwrap_or(DEFAULT_LOOKUP_URL);
                Some(Arc::new(IpLocator::new(url)?) as Arc<dyn PositionSource>)
            }
            GeoSource::Fixed => config
                .fixed_position()
                .map(|c| Arc::new(FixedPosition(c)) as Arc<dyn PositionSource>),
            GeoSource::Disabled => Some(Arc::new(DeniedPosition) as Arc<dyn PositionSource>),
        };

        Ok(Self {
            source,
            timeout: config.timeout(),
            platform_timeout: config.platform_timeout(),
        })
    }

    pub fn with_timeouts(mut self, timeout: Duration, platform_timeout: Duration) -> Self {
        self.timeout = timeout;
        self.platform_timeout = platform_timeout;
        self
    }

    /// Consumes the provider; the outer timeout fires even if the source hangs.
    pub async fn resolve(self) -> Result<Coordinates, GeoError> {
        let Some(source) = self.source else {
            warn!("Geolocation not supported");
            return Err(GeoError::Unsupported);
        };

        debug!("Requesting geolocation");
        match tokio::time::timeout(self.timeout, source.current_position(self.platform_timeout))
            .await
        {
            Ok(Ok(coords)) => {
                debug!(%coords, "Geolocation success");
                Ok(coords)
            }
            Ok(Err(e)) => {
                warn!("Geolocation error: {e}");
                Err(e)
            }
            Err(_) => {
                warn!("Geolocation request timed out after {:?}", self.timeout);
                Err(GeoError::Timeout)
            }
        }
    }
}

/// Position taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinates);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self, _timeout: Duration) -> Result<Coordinates, GeoError> {
        Ok(self.0)
    }
}

/// Location access turned off by the user.
#[derive(Debug, Clone, Copy)]
pub struct DeniedPosition;

#[async_trait]
impl PositionSource for DeniedPosition {
    async fn current_position(&self, _timeout: Duration) -> Result<Coordinates, GeoError> {
        Err(GeoError::PermissionDenied)
    }
}

/// Approximate position from the public IP address.
#[derive(Debug, Clone)]
pub struct IpLocator {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLocator {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self {
            url: url.to_string(),
            http,
        })
    }
}

#[async_trait]
impl PositionSource for IpLocator {
    async fn current_position(&self, timeout: Duration) -> Result<Coordinates, GeoError> {
        let res = self.http.get(&self.url).timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                GeoError::Timeout
            } else {
                debug!("IP lookup request failed: {e}");
                GeoError::PositionUnavailable
            }
        })?;

        if !res.status().is_success() {
            debug!("IP lookup returned status {}", res.status());
            return Err(GeoError::PositionUnavailable);
        }

        let body: IpLookupResponse = res.json().await.map_err(|e| {
            if e.is_timeout() {
                GeoError::Timeout
            } else {
                debug!("IP lookup parse error: {e}");
                GeoError::PositionUnavailable
            }
        })?;

        match (body.status.as_str(), body.lat, body.lon) {
            ("success", Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)),
            _ => Err(GeoError::PositionUnavailable),
        }
    }
}
