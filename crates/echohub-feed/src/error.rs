use std::time::Duration;

use echohub_core::CoreError;
use echohub_transport::ClientError;
use thiserror::Error;

/// Why a configured hub was left out of the working set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error(transparent)]
    InvalidAddress(#[from] CoreError),
    #[error("no identity within {}ms", .after.as_millis())]
    TimedOut { after: Duration },
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Misuse of the aggregator itself. Per-hub failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("aggregator is already initialized")]
    AlreadyInitialized,
}
