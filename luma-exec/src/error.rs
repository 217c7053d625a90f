//! Execution layer error types.

use thiserror::Error;

/// Errors that can occur at the provider and gateway ports.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Candles or account state could not be obtained
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Order was rejected by exchange
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Size or price fails exchange rounding rules
    #[error("Precision error: {0}")]
    Precision(String),

    /// Exchange communication error
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// Call exceeded its time budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] luma_domain::DomainError),
}

impl ExecError {
    /// True when retrying on the next tick may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExecError::DataUnavailable(_)
                | ExecError::Exchange(_)
                | ExecError::Timeout(_)
                | ExecError::OrderRejected(_)
        )
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
