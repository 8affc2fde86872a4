use thiserror::Error;

/// Shared lightweight error type for core primitive operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Hub address is empty or not an http(s) base URL.
    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),
    /// Creation time could not be turned into epoch milliseconds.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(&'static str),
}
