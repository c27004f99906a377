// src/error.rs

//! Unified error handling for the download engine.

use std::fmt;

use thiserror::Error;

use crate::browser::BrowserError;
use crate::fetch::FetchError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built or a request failed outside the ladder
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

    /// Every ladder step failed for a request that the job depends on
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Headless browser failure surfaced outside the ladder
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// The listing produced no chapter links at all
    #[error("No chapter links found for {url}")]
    NoChapterLinks { url: String },

    /// The novel page could not be fetched or parsed
    #[error("Metadata unavailable for {url}: {reason}")]
    MetadataUnavailable { url: String, reason: String },

    /// Input that the engine cannot act on
    #[error("Unsupported input '{input}': {reason}")]
    Unsupported { input: String, reason: String },
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

    /// Create a metadata error with context.
    pub fn metadata(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::MetadataUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an unsupported-input error.
    pub fn unsupported(input: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Unsupported {
            input: input.into(),
            reason: reason.to_string(),
        }
    }
}
