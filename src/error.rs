//! Error types for pg-panel.
//!
//! Defines the main error enum used throughout the application. Every variant
//! carries a stable code so the host panel can map failures to localized
//! messages without inspecting driver-specific text.

use std::time::Duration;
use thiserror::Error;

/// Main error type for pg-panel operations.
#[derive(Error, Debug)]
pub enum PanelError {
    /// The connection string was rejected or the pool could not be allocated.
    #[error("Connection setup error: {0}")]
    ConnectionOpen(String),

    /// The liveness probe did not complete before the deadline.
    #[error("Timed out after {}s waiting for {target}", .after.as_secs())]
    Timeout { target: String, after: Duration },

    /// The liveness probe failed before the deadline (auth rejected, refused, TLS).
    #[error("Connection error: {0}")]
    Connection(String),

    /// An administrative operation failed on an established client.
    #[error("Operation error: {0}")]
    Operation(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PanelError {
    /// Creates a connection setup error with the given message.
    pub fn connection_open(msg: impl Into<String>) -> Self {
        Self::ConnectionOpen(msg.into())
    }

    /// Creates a timeout error for the given target and bound.
    pub fn timeout(target: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            target: target.into(),
            after,
        }
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an operation error with the given message.
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConnectionOpen(_) => "Connection Setup Error",
            Self::Timeout { .. } => "Timeout",
            Self::Connection(_) => "Connection Error",
            Self::Operation(_) => "Operation Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the stable error code used by the host panel for localization.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConnectionOpen(_) => "ErrConnectionOpen",
            Self::Timeout { .. } => "ErrExecTimeOut",
            Self::Connection(_) => "ErrConnection",
            Self::Operation(_) => "ErrOperation",
            Self::Config(_) => "ErrConfig",
            Self::Internal(_) => "ErrInternal",
        }
    }

    /// Returns true if this error came from an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias using PanelError.
pub type Result<T> = std::result::Result<T, PanelError>;
