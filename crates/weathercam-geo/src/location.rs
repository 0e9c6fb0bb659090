//! Location providers.
//!
//! `HttpLocationProvider` asks an IP geolocation endpoint (ip-api.com by
//! default) for the coarse position of the device. The answer is a
//! last-known fix in the loose sense: it may be stale or approximate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use weathercam_core::{LocationConfig, LocationProviderKind};

use crate::types::{Location, LocationError};

const USER_AGENT: &str = "weathercam/0.1.0";

/// Source of the device's last known location.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn last_known_location(&self) -> Result<Location, LocationError>;

    /// Fail-open lookup: any error is logged and reported as `None`.
    async fn last_known_location_or_none(&self) -> Option<Location> {
        match self.last_known_location().await {
            Ok(location) => Some(location),
            Err(e) => {
                tracing::warn!("No location from {} provider: {}", self.name(), e);
                None
            }
        }
    }
}

/// Provider that never knows where it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn last_known_location(&self) -> Result<Location, LocationError> {
        Err(LocationError::Unavailable)
    }
}

/// Provider for a camera mounted at a known spot.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Location);

#[async_trait]
impl LocationProvider for FixedLocation {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn last_known_location(&self) -> Result<Location, LocationError> {
        Ok(self.0)
    }
}

/// ip-api.com style body. ipapi.co style `latitude`/`longitude` keys are
/// accepted too.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(alias = "latitude")]
    lat: Option<f64>,
    #[serde(alias = "longitude")]
    lon: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct HttpLocationProvider {
    client: Arc<Client>,
    lookup_url: String,
}

impl HttpLocationProvider {
    pub fn new(lookup_url: &str, timeout: Duration) -> Result<Self, LocationError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            lookup_url: lookup_url.to_string(),
        })
    }
}

#[async_trait]
impl LocationProvider for HttpLocationProvider {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn last_known_location(&self) -> Result<Location, LocationError> {
        let response = self
            .client
            .get(&self.lookup_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout
                } else {
                    LocationError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(LocationError::ServiceUnavailable(format!(
                "lookup returned status {}",
                response.status()
            )));
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| LocationError::InvalidResponse(e.to_string()))?;

        if let Some(status) = body.status.as_deref() {
            if status != "success" {
                return Err(LocationError::ServiceUnavailable(
                    body.message.unwrap_or_else(|| status.to_string()),
                ));
            }
        }

        let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
            return Err(LocationError::InvalidResponse(
                "missing lat/lon".to_string(),
            ));
        };

        let location = Location::new(lat, lon);
        if !location.is_valid() {
            return Err(LocationError::InvalidResponse(format!(
                "coordinates out of range: {}, {}",
                lat, lon
            )));
        }

        tracing::debug!("Location lookup: {}, {}", lat, lon);
        Ok(location)
    }
}

/// Build the provider selected in configuration.
pub fn from_config(config: &LocationConfig) -> Result<Arc<dyn LocationProvider>, LocationError> {
    let provider: Arc<dyn LocationProvider> = match config.provider {
        LocationProviderKind::None => Arc::new(NoLocation),
        LocationProviderKind::Fixed => match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => Arc::new(FixedLocation(Location::new(lat, lon))),
            _ => return Err(LocationError::Unavailable),
        },
        LocationProviderKind::Http => Arc::new(HttpLocationProvider::new(
            &config.lookup_url,
            Duration::from_secs(config.timeout_secs),
        )?),
    };

    tracing::info!("Using {} location provider", provider.name());
    Ok(provider)
}
