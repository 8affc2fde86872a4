use std::collections::HashSet;
use std::time::Duration;

use echohub_core::HubUrl;
use echohub_schema::{ConnectInfo, HubEntry};
use echohub_transport::HubClient;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::error::ProbeFailure;

/// A hub that answered its identity probe in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedHub {
    pub hub: HubUrl,
    pub info: ConnectInfo,
}

/// A configured hub left out of the working set.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedHub {
    /// The address as configured, before normalization.
    pub address: String,
    pub reason: ProbeFailure,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeReport {
    /// Reachable hubs in configured order.
    pub reachable: Vec<ProbedHub>,
    pub excluded: Vec<ExcludedHub>,
    pub duplicates: usize,
}

enum Slot {
    Probe(HubUrl),
    Invalid(ExcludedHub),
}

/// Normalizes `entries` and probes every distinct hub concurrently, each
/// under its own `timeout`.
///
/// Repeated addresses collapse onto their first occurrence. A hub is usable
/// only if it returns a success envelope before the deadline.
pub async fn probe_hubs<C>(client: &C, entries: &[HubEntry], timeout: Duration) -> ProbeReport
where
    C: HubClient + ?Sized,
{
    let mut seen = HashSet::new();
    let mut duplicates = 0;
    let mut slots = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.normalize() {
            Ok(hub) if seen.insert(hub.clone()) => slots.push(Slot::Probe(hub)),
            Ok(hub) => {
                debug!(%hub, "ignoring repeated hub address");
                duplicates += 1;
            }
            Err(err) => slots.push(Slot::Invalid(ExcludedHub {
                address: entry.raw_address().to_string(),
                reason: err.into(),
            })),
        }
    }

    let results = join_all(slots.into_iter().map(|slot| async move {
        match slot {
            Slot::Probe(hub) => match probe_one(client, &hub, timeout).await {
                Ok(info) => Ok(ProbedHub { hub, info }),
                Err(reason) => Err(ExcludedHub {
                    address: hub.to_string(),
                    reason,
                }),
            },
            Slot::Invalid(excluded) => Err(excluded),
        }
    }))
    .await;

    let mut report = ProbeReport {
        duplicates,
        ..ProbeReport::default()
    };
    for result in results {
        match result {
            Ok(probed) => {
                info!(hub = %probed.hub, name = %probed.info.server_name, "hub reachable");
                report.reachable.push(probed);
            }
            Err(excluded) => {
                warn!(address = %excluded.address, reason = %excluded.reason, "excluding hub");
                report.excluded.push(excluded);
            }
        }
    }
    info!(
        reachable = report.reachable.len(),
        excluded = report.excluded.len(),
        duplicates = report.duplicates,
        "hub probe finished"
    );
    report
}

async fn probe_one<C>(client: &C, hub: &HubUrl, timeout: Duration) -> Result<ConnectInfo, ProbeFailure>
where
    C: HubClient + ?Sized,
{
    match tokio::time::timeout(timeout, client.connect(hub)).await {
        Ok(Ok(info)) => Ok(info),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(ProbeFailure::TimedOut { after: timeout }),
    }
}
