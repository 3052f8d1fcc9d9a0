//! One Call HTTP transport.

use async_trait::async_trait;
use paddock_core::{NetworkError, ReqwestErrorExt, WeatherConfig};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Sub-payloads the forecast view never reads
const EXCLUDE: &str = "minutely,hourly,alerts";
const UNITS: &str = "metric";
const USER_AGENT: &str = concat!("paddock/", env!("CARGO_PKG_VERSION"));

/// Failures below the cache boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl TransportError {
    /// Classify for logging with the shared network taxonomy
    pub fn into_network_error(self) -> NetworkError {
        match self {
            TransportError::Http(e) => e.into_network_error(),
            TransportError::Status { status, body } => NetworkError::ServerError {
                status,
                message: body,
            },
            TransportError::Parse(e) => NetworkError::InvalidResponse(e.to_string()),
        }
    }
}

/// Fetches the raw One Call payload for a coordinate pair.
#[async_trait]
pub trait WeatherTransport: Send + Sync {
    async fn fetch_one_call(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<serde_json::Value, TransportError>;
}

#[async_trait]
impl<T: WeatherTransport + ?Sized> WeatherTransport for Arc<T> {
    async fn fetch_one_call(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<serde_json::Value, TransportError> {
        (**self).fetch_one_call(latitude, longitude).await
    }
}

/// Where the API key comes from.
#[derive(Debug, Clone)]
pub enum ApiKey {
    /// Read the named environment variable on every request
    Env(String),
    Fixed(String),
}

impl ApiKey {
    fn resolve(&self) -> String {
        match self {
            ApiKey::Env(var) => std::env::var(var).unwrap_or_else(|_| {
                tracing::warn!("{} is not set; sending request without an API key", var);
                String::new()
            }),
            ApiKey::Fixed(key) => key.clone(),
        }
    }
}

/// OpenWeatherMap One Call client.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Arc<Client>,
    base_url: String,
    api_key: ApiKey,
}

impl OpenWeatherClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: ApiKey,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into(),
            api_key,
        })
    }

    /// Build from the `[weather]` config section
    pub fn from_config(config: &WeatherConfig) -> Result<Self, TransportError> {
        Self::new(
            config.api_url.clone(),
            ApiKey::Env(config.api_key_env.clone()),
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl WeatherTransport for OpenWeatherClient {
    async fn fetch_one_call(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<serde_json::Value, TransportError> {
        tracing::debug!("Fetching One Call forecast for ({}, {})", latitude, longitude);

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("exclude", EXCLUDE.to_string()),
                ("appid", self.api_key.resolve()),
                ("units", UNITS.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let bytes = response.bytes().await?;
        let payload = serde_json::from_slice(&bytes)?;
        Ok(payload)
    }
}
