//! Centralized error types for the Aether dashboard.
//!
//! This module provides a typed error hierarchy that:
//! - Separates user input mistakes from network failures
//! - Renders every failure as one human-readable line for the shared error slot
//! - Preserves the city and endpoint involved for logging

use thiserror::Error;

/// Top-level application error type.
///
/// Every dashboard operation returns this. `to_string()` is the message shown
/// in the error slot; `user_message()` is a short generic hint.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly hint suitable for display next to the error.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Validation(e) => e.user_message(),
            AppError::Fetch(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }

    /// True if the error was raised before any network call was made.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

/// Rejected city-list mutations. Never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("City name cannot be empty")]
    EmptyCityName,

    #[error("City already exists: {0}")]
    DuplicateCity(String),

    #[error("At least one city must remain")]
    LastCity,
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::EmptyCityName => "Type a city name first.",
            ValidationError::DuplicateCity(_) => "That city is already on the dashboard.",
            ValidationError::LastCity => "Add another city before removing this one.",
        }
    }
}

/// Failures of a single city fetch (weather or air quality).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout for {city}")]
    Timeout { city: String },

    #[error("Failed to fetch data for {city}: {message}")]
    Server {
        city: String,
        status: u16,
        message: String,
    },

    #[error("Network error: Cannot connect to server at {endpoint}")]
    NetworkUnreachable { endpoint: String },

    #[error("Failed to fetch data for {city}: {message}")]
    Unknown { city: String, message: String },
}

impl FetchError {
    /// Classify a transport-level reqwest failure.
    ///
    /// Non-success statuses never get here: `WeatherClient` reads them from
    /// the response itself so it can use the body's `error` field. The status
    /// branch only covers errors that carry one anyway.
    pub fn from_reqwest(city: &str, endpoint: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                city: city.to_string(),
            }
        } else if err.is_connect() {
            FetchError::NetworkUnreachable {
                endpoint: endpoint.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Server {
                city: city.to_string(),
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unknown status")
                    .to_string(),
            }
        } else {
            FetchError::Unknown {
                city: city.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// City the failing request was made for, if known.
    pub fn city(&self) -> Option<&str> {
        match self {
            FetchError::Timeout { city }
            | FetchError::Server { city, .. }
            | FetchError::Unknown { city, .. } => Some(city),
            FetchError::NetworkUnreachable { .. } => None,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "The request timed out. Please try again.",
            FetchError::Server { status, .. } if *status >= 500 => {
                "The weather server is experiencing issues. Please try again later."
            }
            FetchError::Server { .. } => "The city could not be found. Check the spelling.",
            FetchError::NetworkUnreachable { .. } => {
                "Unable to reach the weather server. Is it running?"
            }
            FetchError::Unknown { .. } => "Received an unexpected response. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}
