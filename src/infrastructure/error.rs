//! Infrastructure-level errors

use std::path::PathBuf;

use thiserror::Error;

use crate::application::ApplicationError;

/// Failures raised by a bounds store adapter.
///
/// The engine never inspects or rewraps these; they reach the caller as-is
/// inside `ApplicationError::Store`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid store file {path}: {message}")]
    Format { path: PathBuf, message: String },

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for store adapter calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure errors wrap application errors and add wiring-level concerns.
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl InfraError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<StoreError> for InfraError {
    fn from(e: StoreError) -> Self {
        Self::Application(ApplicationError::Store(e))
    }
}

/// Result type for infrastructure layer operations.
pub type InfraResult<T> = Result<T, InfraError>;
