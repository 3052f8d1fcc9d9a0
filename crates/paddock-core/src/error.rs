//! Centralized error types for Paddock.
//!
//! Each variant carries enough detail for logs, and `user_message()` gives
//! a short non-technical line for the command-line front end.

use thiserror::Error;

/// Top-level application error type.
///
/// Errors from the weather and config layers convert into this type.
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { status: 401, .. } => {
                "The weather API key was rejected. Check your settings."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Errors loading or checking `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No configuration directory on this platform")]
    NoConfigDir,

    #[error("Config file I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NoConfigDir => "Could not locate a configuration directory.",
            ConfigError::Io { .. } => "Could not read or write the config file.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

/// Weather service errors as seen by the application.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The forecast could not be fetched. Detail has already been logged.
    #[error("Failed to fetch weather data")]
    FetchFailed,

    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    #[error("Missing location: {0}")]
    MissingLocation(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::FetchFailed => "Weather data is unavailable right now. Please try again.",
            WeatherError::UnknownTrack(_) => "Track not found. Run `paddock tracks` for the list.",
            WeatherError::MissingLocation(_) => "Pass either --track or both --lat and --lon.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() || self.is_body() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
