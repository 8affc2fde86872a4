//! Transport abstractions for echohub.
//!
//! The aggregator only depends on the [`client::HubClient`] trait defined in
//! this crate; concrete network clients live in sibling crates.

pub mod client;
pub mod scripted;

pub use client::{open_envelope, ClientError, ClientMetrics, HubClient};
pub use scripted::{sample_echo, ClientCall, HubScript, ScriptedHubClient};
