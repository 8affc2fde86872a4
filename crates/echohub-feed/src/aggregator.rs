use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use echohub_schema::{Echo, HubDisplay, HubEntry};
use echohub_transport::HubClient;
use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::buffer::{lock, HubHandle};
use crate::config::AggregatorConfig;
use crate::dedup::DedupIndex;
use crate::error::FeedError;
use crate::feed::GlobalFeed;
use crate::fetch::{fetch_claimed, fetch_next_page, FetchPermit};
use crate::probe::{probe_hubs, ExcludedHub, ProbedHub};
use crate::status::{AggregatorStatus, DrainBatch, ExcludedStatus, InitReport};

/// Merges the feeds of every reachable hub into one newest-first sequence.
///
/// Each hub has its own buffer and page cursor. `drain` repeatedly takes the
/// newest buffered head across all hubs, drops echoes already emitted, and
/// starts a background prefetch for any hub whose buffer runs low. At most
/// one fetch per hub is outstanding at a time. The slot is claimed before a
/// prefetch task is spawned, so pages stay in order and a hub waiting on its
/// next page reads as fetching.
pub struct FeedAggregator<C: HubClient + 'static> {
    client: Arc<C>,
    config: AggregatorConfig,
    initialized: AtomicBool,
    ready: AtomicBool,
    hubs: RwLock<Vec<Arc<HubHandle>>>,
    excluded: Mutex<Vec<ExcludedHub>>,
    merging: AtomicBool,
    dedup: Mutex<DedupIndex>,
    feed: RwLock<GlobalFeed>,
    prefetches: Mutex<Vec<JoinHandle<()>>>,
}

/// Holds the merge slot for one drain call.
struct MergeGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> MergeGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for MergeGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl<C: HubClient + 'static> FeedAggregator<C> {
    pub fn new(client: C, config: AggregatorConfig) -> Self {
        Self::from_shared(Arc::new(client), config)
    }

    pub fn from_shared(client: Arc<C>, config: AggregatorConfig) -> Self {
        Self {
            client,
            config: config.sanitized(),
            initialized: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            hubs: RwLock::new(Vec::new()),
            excluded: Mutex::new(Vec::new()),
            merging: AtomicBool::new(false),
            dedup: Mutex::new(DedupIndex::new()),
            feed: RwLock::new(GlobalFeed::new()),
            prefetches: Mutex::new(Vec::new()),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Probes the configured hubs and warms every reachable hub with its
    /// first page. Runs once per aggregator.
    pub async fn initialize(&self, entries: &[HubEntry]) -> Result<InitReport, FeedError> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(FeedError::AlreadyInitialized);
        }

        let report = probe_hubs(self.client.as_ref(), entries, self.config.probe_timeout).await;
        let handles: Vec<Arc<HubHandle>> = report
            .reachable
            .iter()
            .map(|probed| {
                let display = HubDisplay::resolve(
                    Some(&probed.info),
                    &self.config.default_hub_name,
                    &self.config.default_hub_logo,
                );
                Arc::new(HubHandle::new(
                    probed.hub.clone(),
                    display,
                    probed.info.clone(),
                ))
            })
            .collect();

        let page_size = self.config.wire_page_size();
        join_all(
            handles
                .iter()
                .map(|handle| fetch_next_page(self.client.as_ref(), handle, page_size)),
        )
        .await;

        *write(&self.hubs) = handles;
        *lock(&self.excluded) = report.excluded.clone();
        self.ready.store(true, Ordering::Release);

        let init = InitReport {
            usable: report.reachable,
            excluded: report.excluded,
            duplicates: report.duplicates,
        };
        if init.no_hubs_usable() {
            warn!(excluded = init.excluded_count(), "no hubs usable");
        } else {
            info!(
                usable = init.usable_count(),
                excluded = init.excluded_count(),
                "feed aggregator ready"
            );
        }
        Ok(init)
    }

    /// Emits up to `batch_size` echoes not seen before, newest first.
    ///
    /// Stops early after `batch_size * attempt_factor` selection attempts or
    /// once no hub can supply more. A call made while another drain is running
    /// returns immediately with `busy` set.
    pub async fn drain(&self, batch_size: usize) -> DrainBatch {
        if !self.ready.load(Ordering::Acquire) {
            debug!("drain before initialization");
            return DrainBatch::default();
        }
        let Some(_guard) = MergeGuard::acquire(&self.merging) else {
            debug!("drain already running");
            return DrainBatch {
                busy: true,
                has_more: self.has_more(),
                ..DrainBatch::default()
            };
        };

        let hubs = read(&self.hubs).clone();
        let max_attempts = self.config.max_attempts(batch_size);
        let page_size = self.config.wire_page_size();
        let mut emitted = Vec::with_capacity(batch_size);
        let mut attempts = 0;

        while emitted.len() < batch_size && attempts < max_attempts {
            attempts += 1;
            let Some(winner) = newest_head(&hubs) else {
                let idle: Vec<&Arc<HubHandle>> =
                    hubs.iter().filter(|hub| hub.buffer().can_fetch()).collect();
                if idle.is_empty() {
                    break;
                }
                debug!(hubs = idle.len(), "all buffers empty, refilling");
                join_all(
                    idle.into_iter()
                        .map(|hub| fetch_next_page(self.client.as_ref(), hub, page_size)),
                )
                .await;
                continue;
            };

            let (echo, refill) = {
                let mut buffer = winner.buffer();
                let echo = buffer.pop_head();
                (echo, buffer.needs_refill(self.config.low_water_mark))
            };
            if let Some(echo) = echo {
                if lock(&self.dedup).record(echo.key.clone()) {
                    emitted.push(echo);
                } else {
                    debug!(key = %echo.key, "dropping duplicate echo");
                }
            }
            if refill {
                self.spawn_prefetch(winner);
            }
        }

        write(&self.feed).extend(&emitted);
        let has_more = hubs.iter().any(|hub| hub.buffer().has_more());
        let end_of_feed = !has_more && !read(&self.feed).is_empty();
        if end_of_feed && !emitted.is_empty() {
            info!("no more echoes from any hub");
        }
        debug!(emitted = emitted.len(), attempts, has_more, "drain finished");
        DrainBatch {
            emitted,
            has_more,
            end_of_feed,
            busy: false,
        }
    }

    pub async fn drain_default(&self) -> DrainBatch {
        self.drain(self.config.batch_size).await
    }

    /// True while any hub still has buffered echoes or unread pages.
    pub fn has_more(&self) -> bool {
        self.ready.load(Ordering::Acquire)
            && read(&self.hubs).iter().any(|hub| hub.buffer().has_more())
    }

    pub fn status(&self) -> AggregatorStatus {
        AggregatorStatus {
            ready: self.ready.load(Ordering::Acquire),
            hubs: read(&self.hubs).iter().map(|hub| hub.status()).collect(),
            excluded: lock(&self.excluded).iter().map(ExcludedStatus::from).collect(),
            feed_len: self.feed_len(),
            has_more: self.has_more(),
            merging: self.merging.load(Ordering::Acquire),
        }
    }

    /// Identity of every usable hub, as reported by its probe.
    pub fn hub_identities(&self) -> Vec<ProbedHub> {
        read(&self.hubs)
            .iter()
            .map(|hub| ProbedHub {
                hub: hub.hub().clone(),
                info: hub.identity().clone(),
            })
            .collect()
    }

    pub fn feed_snapshot(&self) -> Vec<Echo> {
        read(&self.feed).items().to_vec()
    }

    pub fn feed_len(&self) -> usize {
        read(&self.feed).len()
    }

    /// Waits for every outstanding background prefetch.
    pub async fn settle(&self) {
        let pending = std::mem::take(&mut *lock(&self.prefetches));
        for result in join_all(pending).await {
            if let Err(err) = result {
                warn!(error = %err, "prefetch task failed");
            }
        }
    }

    /// Starts a background fetch of `handle`'s next page.
    ///
    /// The hub's fetch slot is claimed here, before the task is spawned, so at
    /// most one fetch per hub is ever outstanding and the hub reports
    /// `Fetching` from the moment the prefetch is triggered. Does nothing when
    /// the hub is exhausted or already fetching.
    fn spawn_prefetch(&self, handle: &Arc<HubHandle>) {
        let Some(permit) = FetchPermit::claim(Arc::clone(handle)) else {
            return;
        };
        let client = Arc::clone(&self.client);
        let page_size = self.config.wire_page_size();
        debug!(hub = %handle.hub(), page = permit.page(), "starting prefetch");
        let task = tokio::spawn(async move {
            fetch_claimed(client.as_ref(), permit, page_size).await;
        });
        let mut prefetches = lock(&self.prefetches);
        prefetches.retain(|task| !task.is_finished());
        prefetches.push(task);
    }
}

/// Hub whose buffered head is newest. Ties go to the earliest hub.
fn newest_head(hubs: &[Arc<HubHandle>]) -> Option<&Arc<HubHandle>> {
    let mut best: Option<(&Arc<HubHandle>, i64)> = None;
    for hub in hubs {
        let Some(ts) = hub.buffer().head_ts() else {
            continue;
        };
        if best.map_or(true, |(_, best_ts)| ts > best_ts) {
            best = Some((hub, ts));
        }
    }
    best.map(|(hub, _)| hub)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use echohub_core::HubUrl;
    use echohub_schema::{ConnectInfo, HubDisplay};

    use super::{newest_head, MergeGuard};
    use crate::buffer::HubHandle;

    #[test]
    fn merge_guard_is_exclusive_and_released_on_drop() {
        let flag = AtomicBool::new(false);
        let guard = MergeGuard::acquire(&flag).expect("first acquire");
        assert!(MergeGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::Acquire));
        assert!(MergeGuard::acquire(&flag).is_some());
    }

    #[test]
    fn newest_head_skips_empty_buffers() {
        let hubs: Vec<Arc<HubHandle>> = ["https://a.example", "https://b.example"]
            .iter()
            .map(|raw| {
                Arc::new(HubHandle::new(
                    HubUrl::parse(raw).expect("hub"),
                    HubDisplay::resolve(None, "Ech0", "/Ech0.svg"),
                    ConnectInfo::default(),
                ))
            })
            .collect();
        assert!(newest_head(&hubs).is_none());
    }
}
