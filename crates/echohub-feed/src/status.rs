use echohub_core::HubUrl;
use echohub_schema::Echo;
use serde::Serialize;

use crate::probe::{ExcludedHub, ProbedHub};

/// Lifecycle phase of one hub's page cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HubPhase {
    /// More pages may exist and no fetch is outstanding.
    Idle,
    Fetching,
    /// The hub returned a short page or a fetch failed.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStatus {
    pub hub: HubUrl,
    pub server_name: String,
    pub phase: HubPhase,
    pub buffered: usize,
    /// Timestamps of the buffered echoes, head first.
    pub buffered_ts: Vec<i64>,
    pub next_page: u32,
    pub pages_fetched: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcludedStatus {
    pub address: String,
    pub reason: String,
}

impl From<&ExcludedHub> for ExcludedStatus {
    fn from(hub: &ExcludedHub) -> Self {
        Self {
            address: hub.address.clone(),
            reason: hub.reason.to_string(),
        }
    }
}

/// Point-in-time view of the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatorStatus {
    pub ready: bool,
    pub hubs: Vec<HubStatus>,
    pub excluded: Vec<ExcludedStatus>,
    pub feed_len: usize,
    pub has_more: bool,
    pub merging: bool,
}

/// Outcome of `initialize`.
#[derive(Debug, Clone, PartialEq)]
pub struct InitReport {
    pub usable: Vec<ProbedHub>,
    pub excluded: Vec<ExcludedHub>,
    /// Configured entries that repeated an earlier address.
    pub duplicates: usize,
}

impl InitReport {
    pub fn usable_count(&self) -> usize {
        self.usable.len()
    }

    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    /// True when hubs were configured but none answered.
    pub fn no_hubs_usable(&self) -> bool {
        self.usable.is_empty() && !self.excluded.is_empty()
    }
}

/// One batch emitted by `drain`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainBatch {
    /// Newly emitted echoes, newest first.
    pub emitted: Vec<Echo>,
    pub has_more: bool,
    /// The feed is non-empty and no hub can contribute further.
    pub end_of_feed: bool,
    /// Another drain was running; nothing was emitted.
    pub busy: bool,
}

impl DrainBatch {
    pub fn len(&self) -> usize {
        self.emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }
}
