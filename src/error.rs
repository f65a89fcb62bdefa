// src/error.rs

//! Unified error handling for the aggregator.
//!
//! `AppError` covers run-level failures. Per-request and per-event failures
//! have their own types so they can be logged and counted without ever
//! escalating past the worker that saw them.

use std::fmt;

use thiserror::Error;

/// Result type alias for aggregator operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Listing page unreachable or unusable. Fatal for the run.
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Cache store unreadable or unwritable. Callers degrade instead of aborting.
    #[error("Cache I/O error at {path}: {message}")]
    CacheIo { path: String, message: String },

    /// Output artifact could not be written or renamed. Fatal for the run.
    #[error("Publish error for {path}: {message}")]
    Publish { path: String, message: String },

    /// Run cancelled by timeout or explicit abort before completion.
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl fmt::Display) -> Self {
        Self::Discovery(message.to_string())
    }

    /// Create a cache I/O error.
    pub fn cache_io(path: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::CacheIo {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a publish error.
    pub fn publish(path: impl fmt::Display, message: impl fmt::Display) -> Self {
        Self::Publish {
            path: path.to_string(),
            message: message.to_string(),
        }
    }

    /// Create an abort error.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }
}

/// Failure of a single GET request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Server answered with a non-2xx status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Connection, timeout, or body read failure
    #[error("network error: {0}")]
    Network(String),

    /// The run was cancelled before the request was issued
    #[error("request not issued: run cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Status(status.as_u16()),
            None => Self::Network(e.to_string()),
        }
    }
}

/// Why one event produced no calendar object this run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionFailure {
    /// Every calendar URL variant failed to fetch or parse
    #[error("all {} calendar variants failed: {}", .attempts.len(), format_attempts(.attempts))]
    Exhausted { attempts: Vec<(String, String)> },

    /// The run was cancelled while this event was in progress
    #[error("cancelled before completion")]
    Cancelled,
}

fn format_attempts(attempts: &[(String, String)]) -> String {
    attempts
        .iter()
        .map(|(url, reason)| format!("{url} ({reason})"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_lists_every_attempt() {
        let failure = AcquisitionFailure::Exhausted {
            attempts: vec![
                ("https://a.test/e?format=ical".into(), "HTTP status 404".into()),
                ("https://a.test/e.ics".into(), "not a calendar".into()),
            ],
        };
        let message = failure.to_string();
        assert!(message.starts_with("all 2 calendar variants failed"));
        assert!(message.contains("https://a.test/e.ics (not a calendar)"));
    }

    #[test]
    fn publish_error_mentions_path() {
        let err = AppError::publish("/srv/cal.ics", "disk full");
        assert_eq!(err.to_string(), "Publish error for /srv/cal.ics: disk full");
    }
}
