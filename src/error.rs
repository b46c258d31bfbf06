//! Error types and exit codes for trivia-live-sync

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for live-sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Malformed frame: {message}")]
    MalformedFrame { message: String },

    #[error("Invalid payload for '{kind}': {message}")]
    InvalidPayload { kind: String, message: String },

    #[error("Handler for '{kind}' failed: {message}")]
    Handler { kind: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Connection failed after {attempts} reconnect attempt(s)")]
    ConnectionExhausted { attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Build an `InvalidPayload` from a serde error
    pub fn payload(kind: &str, err: impl std::fmt::Display) -> Self {
        Self::InvalidPayload {
            kind: kind.to_string(),
            message: err.to_string(),
        }
    }

    /// Convert error to the monitor's exit code:
    /// - 1: IO error
    /// - 2: Configuration / URL error
    /// - 3: Connection exhausted
    /// - 4: Protocol error (frame, payload, handler)
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) => ExitCode::from(1),
            Self::ConfigError { .. } | Self::InvalidUrl { .. } => ExitCode::from(2),
            Self::ConnectionExhausted { .. } => ExitCode::from(3),
            Self::MalformedFrame { .. } | Self::InvalidPayload { .. } | Self::Handler { .. } => {
                ExitCode::from(4)
            }
        }
    }
}

/// Result type alias for live-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
