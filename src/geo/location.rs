//! IP geolocation.

use serde::Deserialize;
use std::time::Duration;

use super::Location;
use crate::constants::{GEOLOCATION_TIMEOUT, GEOLOCATION_URL};

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: Option<String>,
}

/// Looks up the machine's approximate position from its public IP address.
#[derive(Debug, Clone)]
pub struct IpLocator {
    endpoint: String,
    timeout: Duration,
}

impl Default for IpLocator {
    fn default() -> Self {
        Self::new(GEOLOCATION_URL, GEOLOCATION_TIMEOUT)
    }
}

impl IpLocator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    /// Resolve coordinates, falling back to the built-in location on any failure.
    pub async fn resolve(&self) -> Location {
        match self.lookup().await {
            Ok(location) => location,
            Err(e) => {
                log_warning!("Location lookup failed: {e}");
                log_indented!("Using fallback location {}", Location::fallback());
                Location::fallback()
            }
        }
    }

    async fn lookup(&self) -> anyhow::Result<Location> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("luxlink/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let response: IpApiResponse = client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if response.status != "success" {
            anyhow::bail!(
                "service answered '{}'{}",
                response.status,
                response
                    .message
                    .map(|m| format!(": {m}"))
                    .unwrap_or_default()
            );
        }

        match (response.lat, response.lon) {
            (Some(latitude), Some(longitude)) => Ok(Location {
                latitude,
                longitude,
                located: true,
            }),
            _ => anyhow::bail!("response carried no coordinates"),
        }
    }
}

/// Resolve coordinates with the default service and timeout.
pub async fn resolve_coordinates() -> Location {
    IpLocator::default().resolve().await
}
