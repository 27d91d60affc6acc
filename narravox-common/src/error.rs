//! Error types shared across narravox crates
//!
//! Defines the common error type using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for narravox-common
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Voice registry constraint violations (narrator/default guard rails)
    #[error("Voice registry error: {0}")]
    Voice(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse/serialize errors
    #[error("TOML error: {0}")]
    Toml(String),

    /// JSON parse/serialize errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Toml(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Toml(e.to_string())
    }
}

/// Convenience Result type using the narravox-common Error
pub type Result<T> = std::result::Result<T, Error>;
