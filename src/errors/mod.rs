//! # Error Handling
//!
//! Crate-level error type. Each subsystem owns a narrower `thiserror` enum
//! (`StoreError`, `AuthError`, `RotationError`, `DistributionError`); this
//! type is what the binaries and the extension runtime bubble up.

use crate::distribution::DistributionError;
use crate::secrets::{AuthError, RotationError, StoreError};

/// Custom result type for secure-lambda-url operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the extension and rotation processes
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors (missing or malformed environment values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration values rejected by validation rules
    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Network transport errors (loopback server, Extensions API)
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}
