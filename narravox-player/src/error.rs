//! Error types for narravox-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Per-segment failures are contained at the segment boundary;
//! only `MissingApiKey` escalates to a whole-queue abort.

use thiserror::Error;

/// Main error type for narravox-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Voice/variant resolution failed with no usable fallback
    #[error("Voice resolution error: {0}")]
    Resolve(String),

    /// The cloud backend is selected but no API key is configured
    #[error("No API key set for the cloud synthesis backend")]
    MissingApiKey,

    /// The synthesis service returned a non-success status
    #[error("Synthesis request failed: {status} - {body}")]
    Synthesis { status: u16, body: String },

    /// Network-level failure talking to the synthesis service
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Audio decode or playback errors
    #[error("Audio playback error: {0}")]
    Audio(String),

    /// Playback scheduler errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shared-type errors from narravox-common
    #[error(transparent)]
    Common(#[from] narravox_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this failure should abort the whole queue instead of
    /// skipping one segment
    pub fn is_fatal_for_queue(&self) -> bool {
        matches!(self, Error::MissingApiKey)
    }
}

/// Convenience Result type using the narravox-player Error
pub type Result<T> = std::result::Result<T, Error>;
