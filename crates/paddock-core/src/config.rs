use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

type Result<T> = std::result::Result<T, ConfigError>;

/// Default One Call endpoint
pub const DEFAULT_WEATHER_API_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// Environment variable holding the provider API key
pub const DEFAULT_API_KEY_ENV: &str = "WEATHER_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Weather provider and cache settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// One Call endpoint URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the environment variable the API key is read from.
    /// The key itself never lives in the config file.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// How long a fetched forecast is served from memory
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Upper bound on cached locations; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cache_entries: Option<usize>,

    /// Whole-request timeout for the HTTP client, in seconds.
    ///
    /// The cache adds no deadline of its own around a provider call; a
    /// request that hangs past this limit fails as a fetch error like any
    /// other transport failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_WEATHER_API_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_cache_entries: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("paddock");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, writing defaults there if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path).map_err(|e| io_error(config_path, e))?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration from the default location and validate it.
    /// The file is created with defaults if it doesn't exist.
    ///
    /// Returns an error if validation finds errors; warnings are logged.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config_path = Self::config_path()?;
        Self::load_validated_from(&config_path)
    }

    /// [`Config::load_validated`] against an explicit path
    pub fn load_validated_from(config_path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(config_path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.weather.api_url, "weather.api_url", &mut result);

        if self.weather.cache_ttl_secs == 0 {
            result.add_warning(
                "weather.cache_ttl_secs",
                "Weather cache disabled (0 seconds); every request hits the provider",
            );
        } else if self.weather.cache_ttl_secs > 86_400 {
            result.add_warning(
                "weather.cache_ttl_secs",
                "Weather cache TTL is more than 24 hours",
            );
        }

        if self.weather.max_cache_entries == Some(0) {
            result.add_error(
                "weather.max_cache_entries",
                "Cache bound must be at least 1 (omit it for unbounded)",
            );
        }

        if self.weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.weather.api_key_env.trim().is_empty() {
            result.add_error("weather.api_key_env", "API key variable name is empty");
        } else if std::env::var(&self.weather.api_key_env).is_err() {
            result.add_warning(
                "weather.api_key_env",
                format!(
                    "{} is not set - the provider will reject requests",
                    self.weather.api_key_env
                ),
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(config_path, contents).map_err(|e| io_error(config_path, e))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("paddock");

        Ok(config_dir.join("config.toml"))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.display().to_string(),
        source,
    }
}
