use std::cmp::Reverse;
use std::sync::Arc;

use echohub_schema::{Echo, PageRequest, RawEcho};
use echohub_transport::HubClient;
use tracing::{debug, warn};

use crate::buffer::HubHandle;

/// Result of one page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The hub was exhausted or already fetching; nothing was requested.
    Skipped,
    Fetched {
        /// Items the hub returned.
        received: usize,
        /// Items that survived normalization and were buffered.
        buffered: usize,
        exhausted: bool,
    },
    /// The request failed and the hub is now exhausted.
    Failed,
}

/// A claimed fetch slot for one hub.
///
/// Claiming is synchronous: the hub reads as fetching from the moment
/// `claim` returns, even if the request itself runs later on another task.
/// The slot is released on drop, so every exit path frees it, including
/// panics and dropped futures.
#[derive(Debug)]
pub struct FetchPermit {
    handle: Arc<HubHandle>,
    page: u32,
}

impl FetchPermit {
    /// Claims `handle`'s fetch slot. `None` when the hub is exhausted or a
    /// fetch is already outstanding.
    pub fn claim(handle: Arc<HubHandle>) -> Option<Self> {
        let page = handle.buffer().begin_fetch()?;
        Some(Self { handle, page })
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}

impl Drop for FetchPermit {
    fn drop(&mut self) {
        self.handle.buffer().end_fetch();
    }
}

/// Claims the hub's fetch slot and fetches its next page.
///
/// No-op when the hub is exhausted or a fetch is already in flight.
pub async fn fetch_next_page<C>(
    client: &C,
    handle: &Arc<HubHandle>,
    page_size: u32,
) -> FetchOutcome
where
    C: HubClient + ?Sized,
{
    match FetchPermit::claim(Arc::clone(handle)) {
        Some(permit) => fetch_claimed(client, permit, page_size).await,
        None => FetchOutcome::Skipped,
    }
}

/// Requests the claimed page and appends it to the hub's buffer. A failed
/// request exhausts the hub for the rest of the session.
pub async fn fetch_claimed<C>(client: &C, permit: FetchPermit, page_size: u32) -> FetchOutcome
where
    C: HubClient + ?Sized,
{
    let handle = &permit.handle;
    let page = permit.page;
    let request = PageRequest { page, page_size };

    match client.fetch_page(handle.hub(), request).await {
        Ok(body) => {
            let received = body.items.len();
            let batch = normalize_page(handle, body.items);
            let buffered = batch.len();
            let exhausted = {
                let mut buffer = handle.buffer();
                buffer.complete_page(batch, received, page_size as usize);
                buffer.is_exhausted()
            };
            debug!(
                hub = %handle.hub(),
                page,
                received,
                buffered,
                exhausted,
                "buffered echo page"
            );
            FetchOutcome::Fetched {
                received,
                buffered,
                exhausted,
            }
        }
        Err(err) => {
            warn!(hub = %handle.hub(), page, error = %err, "page fetch failed, hub exhausted");
            handle.buffer().fail(err.to_string());
            FetchOutcome::Failed
        }
    }
}

/// Attaches hub metadata and sorts newest-first. Items without a usable
/// creation time are dropped.
fn normalize_page(handle: &HubHandle, items: Vec<RawEcho>) -> Vec<Echo> {
    let mut batch: Vec<Echo> = items
        .into_iter()
        .filter_map(|raw| {
            let id = raw.id.clone();
            match Echo::from_raw(raw, handle.hub(), handle.display()) {
                Ok(echo) => Some(echo),
                Err(err) => {
                    warn!(hub = %handle.hub(), %id, error = %err, "dropping echo");
                    None
                }
            }
        })
        .collect();
    batch.sort_by_key(|echo| Reverse(echo.created_ts));
    batch
}
