//! Core echohub primitives shared across crates.
//!
//! Includes normalized hub addresses, echo identities, creation-time
//! normalization, and base errors.

pub mod error;
pub mod timestamp;
pub mod types;

pub use error::CoreError;
pub use timestamp::{millis_from_unix, parse_created_at, CreatedAt, SECONDS_MAGNITUDE_LIMIT};
pub use types::{EchoId, EchoKey, HubUrl};
