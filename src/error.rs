//! Top-level error type.

use thiserror::Error;

use crate::transport::TransportError;

/// Top-level conduit errors.
#[derive(Debug, Error)]
pub enum ConduitError {
    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
