//! Federated echo feed aggregation.
//!
//! This crate probes a configured set of hubs, keeps one page cursor and
//! buffer per reachable hub, and merges the buffers into a single feed
//! ordered newest-first, with read-ahead, deduplication and per-hub failure
//! isolation.

pub mod aggregator;
pub mod buffer;
pub mod config;
pub mod dedup;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod probe;
pub mod status;

pub use aggregator::FeedAggregator;
pub use config::AggregatorConfig;
pub use error::{FeedError, ProbeFailure};
pub use status::{AggregatorStatus, DrainBatch, HubPhase, HubStatus, InitReport};
