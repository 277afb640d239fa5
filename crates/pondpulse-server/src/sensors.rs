//! HTTP client for the sensor gateway.
//!
//! The gateway serves the latest probe readings per owner at
//! `GET {base}/owners/{owner}/current` as `{"temperatureC": .., "ph": ..}`,
//! with either field null when the probe is offline.

use std::time::Duration;

use pondpulse_agg::{BoxError, SensorSnapshot, SensorSource};

#[derive(Debug, Clone)]
pub struct HttpSensorSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSensorSource {
    /// Builds a client with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the underlying client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl SensorSource for HttpSensorSource {
    async fn snapshot(&self, owner: &str) -> Result<SensorSnapshot, BoxError> {
        let url = format!("{}/owners/{owner}/current", self.base_url);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let snapshot: SensorSnapshot = response.json().await?;
        Ok(snapshot)
    }
}
