//! Engine error types.

use luma_domain::DomainError;
use thiserror::Error;

/// Errors raised while validating engine configuration.
///
/// Decisions themselves never fail: missing data yields "no action".
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration value is out of range or inconsistent
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Shorthand for an invalid configuration error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
