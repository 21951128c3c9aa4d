//! Error types for mds.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`MdsError`] - Top-level error type for all mds operations
//! - [`ConfigurationError`] - Startup-time errors while building routing state
//! - [`RoutingError`] - Call-time errors while resolving a connection source
//! - [`KeyError`] - Rejected routing key text
//! - [`AcquireError`] - Routing or source failure while acquiring a connection

use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all mds operations.
#[derive(Error, Debug)]
pub enum MdsError {
    /// Routing state could not be built.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A connection source could not be resolved for the current call.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors raised while validating a routing key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Routing keys must contain at least one character.
    #[error("routing key must not be empty")]
    Empty,
}

/// Errors raised once, at startup, while building routing state.
///
/// Every variant is fatal: the composition root is expected to abort startup.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// A key supplied to the routing table was rejected.
    #[error("invalid routing key: {0}")]
    InvalidKey(#[from] KeyError),

    /// Two construction sources claimed the same key.
    #[error("duplicate routing key: {0}")]
    DuplicateKey(String),

    /// The configured default key names no mapped source.
    #[error("named default not found: {0}")]
    DefaultNotFound(String),

    /// More than one externally supplied primary source was found.
    #[error("expected at most one primary connection source, found {0}")]
    MultiplePrimary(usize),

    /// A pre-existing primary source was supplied without a name to map it under.
    #[error("primary connection source has no default name")]
    UnnamedPrimary,

    /// The source factory failed to build a named connection source.
    #[error("failed to build connection source `{name}`")]
    Source {
        /// Name of the source being built.
        name: String,
        /// Underlying factory failure.
        #[source]
        source: BoxError,
    },

    /// Configuration text could not be parsed.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Errors raised at call time while resolving a connection source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No key matched and no default source was configured.
    #[error("no default connection source configured (current key: {current:?})")]
    NoDefaultConfigured {
        /// The key active when resolution failed, if any.
        current: Option<String>,
    },
}

/// Errors raised while acquiring a connection through a routed source.
#[derive(Error, Debug)]
pub enum AcquireError<E> {
    /// No connection source could be selected.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// The selected connection source failed.
    #[error("connection source failed")]
    Source(#[source] E),
}

// Convenience conversions
impl From<BoxError> for MdsError {
    fn from(err: BoxError) -> Self {
        MdsError::Custom(err)
    }
}

impl<E> From<AcquireError<E>> for MdsError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: AcquireError<E>) -> Self {
        match err {
            AcquireError::Routing(err) => MdsError::Routing(err),
            AcquireError::Source(err) => MdsError::Custom(Box::new(err)),
        }
    }
}
