use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use echohub_core::HubUrl;
use echohub_schema::{ConnectInfo, Echo, HubDisplay};

use crate::status::{HubPhase, HubStatus};

/// Per-hub merge state: pending echoes plus the page cursor.
///
/// `pending` is newest-first. Pages are requested strictly in increasing
/// order and each page is sorted before it is appended, so the buffer stays
/// sorted on its own. `in_flight` allows at most one outstanding fetch per
/// hub; it is a flag, not a queue, and a second request while it is set is
/// dropped rather than deferred.
#[derive(Debug)]
pub struct HubBuffer {
    pending: VecDeque<Echo>,
    next_page: u32,
    exhausted: bool,
    in_flight: bool,
    pages_fetched: u32,
    last_error: Option<String>,
}

impl Default for HubBuffer {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            next_page: 1,
            exhausted: false,
            in_flight: false,
            pages_fetched: 0,
            last_error: None,
        }
    }
}

impl HubBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head_ts(&self) -> Option<i64> {
        self.pending.front().map(|echo| echo.created_ts)
    }

    pub fn pop_head(&mut self) -> Option<Echo> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// True while the hub can still contribute echoes.
    pub fn has_more(&self) -> bool {
        !self.pending.is_empty() || !self.exhausted
    }

    /// True when a new fetch would be issued right now.
    pub fn can_fetch(&self) -> bool {
        !self.exhausted && !self.in_flight
    }

    /// True when the buffer is below `low_water_mark` and a fetch may start.
    pub fn needs_refill(&self, low_water_mark: usize) -> bool {
        self.pending.len() < low_water_mark && self.can_fetch()
    }

    /// Claims the fetch slot and returns the page to request, or `None` when
    /// the hub is exhausted or already fetching.
    pub fn begin_fetch(&mut self) -> Option<u32> {
        if !self.can_fetch() {
            return None;
        }
        self.in_flight = true;
        Some(self.next_page)
    }

    /// Appends one fetched page. `batch` must already be sorted newest-first;
    /// `raw_len` is the number of items the hub returned before filtering.
    pub fn complete_page(&mut self, batch: Vec<Echo>, raw_len: usize, page_size: usize) {
        self.pending.extend(batch);
        self.next_page = self.next_page.saturating_add(1);
        self.pages_fetched = self.pages_fetched.saturating_add(1);
        if raw_len < page_size {
            self.exhausted = true;
        }
    }

    /// Marks the hub exhausted for the rest of the session.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.exhausted = true;
        self.last_error = Some(error.into());
    }

    /// Releases the fetch slot taken by `begin_fetch`.
    pub fn end_fetch(&mut self) {
        self.in_flight = false;
    }

    pub fn phase(&self) -> HubPhase {
        if self.in_flight {
            HubPhase::Fetching
        } else if self.exhausted {
            HubPhase::Exhausted
        } else {
            HubPhase::Idle
        }
    }
}

/// One reachable hub: its identity plus its shared buffer.
#[derive(Debug)]
pub struct HubHandle {
    hub: HubUrl,
    display: HubDisplay,
    identity: ConnectInfo,
    buffer: Mutex<HubBuffer>,
}

impl HubHandle {
    pub fn new(hub: HubUrl, display: HubDisplay, identity: ConnectInfo) -> Self {
        Self {
            hub,
            display,
            identity,
            buffer: Mutex::new(HubBuffer::new()),
        }
    }

    pub fn hub(&self) -> &HubUrl {
        &self.hub
    }

    pub fn display(&self) -> &HubDisplay {
        &self.display
    }

    pub fn identity(&self) -> &ConnectInfo {
        &self.identity
    }

    /// Locks the buffer. Callers must not hold the guard across an await.
    pub fn buffer(&self) -> MutexGuard<'_, HubBuffer> {
        lock(&self.buffer)
    }

    pub fn status(&self) -> HubStatus {
        let buffer = self.buffer();
        HubStatus {
            hub: self.hub.clone(),
            server_name: self.display.name.clone(),
            phase: buffer.phase(),
            buffered: buffer.len(),
            buffered_ts: buffer.pending.iter().map(|echo| echo.created_ts).collect(),
            next_page: buffer.next_page,
            pages_fetched: buffer.pages_fetched,
            last_error: buffer.last_error.clone(),
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
