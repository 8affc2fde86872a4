use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use echohub_core::{CreatedAt, EchoId, HubUrl};
use echohub_schema::{ConnectInfo, EchoPage, PageRequest, RawEcho};

use crate::client::{ClientError, ClientMetrics, HubClient};

/// Scripted behaviour of one simulated hub.
#[derive(Debug, Clone)]
pub struct HubScript {
    hub: HubUrl,
    identity: Result<ConnectInfo, ClientError>,
    probe_delay: Duration,
    pages: HashMap<u32, Result<Vec<RawEcho>, ClientError>>,
    page_delay: Duration,
}

impl HubScript {
    /// A reachable hub reporting `server_name`. Unscripted pages come back empty.
    pub fn online(hub: HubUrl, server_name: impl Into<String>) -> Self {
        let identity = ConnectInfo {
            server_name: server_name.into(),
            server_url: hub.to_string(),
            ..ConnectInfo::default()
        };
        Self {
            hub,
            identity: Ok(identity),
            probe_delay: Duration::ZERO,
            pages: HashMap::new(),
            page_delay: Duration::ZERO,
        }
    }

    /// A hub whose identity probe fails with `error`.
    pub fn offline(hub: HubUrl, error: ClientError) -> Self {
        Self {
            identity: Err(error),
            ..Self::online(hub, "")
        }
    }

    pub fn with_identity(mut self, identity: ConnectInfo) -> Self {
        self.identity = Ok(identity);
        self
    }

    pub fn probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn page(mut self, page: u32, items: Vec<RawEcho>) -> Self {
        self.pages.insert(page, Ok(items));
        self
    }

    pub fn failing_page(mut self, page: u32, error: ClientError) -> Self {
        self.pages.insert(page, Err(error));
        self
    }
}

/// One request observed by a [`ScriptedHubClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Connect(HubUrl),
    FetchPage { hub: HubUrl, request: PageRequest },
}

/// In-memory [`HubClient`] for tests and simulations.
///
/// Pages are served verbatim (ignoring the requested page size), so a script
/// can model hubs that misbehave: repeated pages, unsorted pages, failures.
#[derive(Debug, Default)]
pub struct ScriptedHubClient {
    hubs: Mutex<HashMap<HubUrl, HubScript>>,
    calls: Mutex<Vec<ClientCall>>,
    metrics: Mutex<ClientMetrics>,
}

impl ScriptedHubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hubs(scripts: impl IntoIterator<Item = HubScript>) -> Self {
        let client = Self::new();
        for script in scripts {
            client.add_hub(script);
        }
        client
    }

    pub fn add_hub(&self, script: HubScript) {
        lock(&self.hubs).insert(script.hub.clone(), script);
    }

    /// Every request issued so far, in issue order.
    pub fn calls(&self) -> Vec<ClientCall> {
        lock(&self.calls).clone()
    }

    /// Page numbers requested from `hub`, in issue order.
    pub fn page_requests(&self, hub: &HubUrl) -> Vec<u32> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                ClientCall::FetchPage { hub: h, request } if h == hub => Some(request.page),
                _ => None,
            })
            .collect()
    }

    pub fn connect_count(&self, hub: &HubUrl) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| matches!(call, ClientCall::Connect(h) if h == hub))
            .count()
    }

    fn record(&self, call: ClientCall) {
        lock(&self.calls).push(call);
    }

    fn script(&self, hub: &HubUrl) -> Option<HubScript> {
        lock(&self.hubs).get(hub).cloned()
    }
}

#[async_trait]
impl HubClient for ScriptedHubClient {
    async fn connect(&self, hub: &HubUrl) -> Result<ConnectInfo, ClientError> {
        self.record(ClientCall::Connect(hub.clone()));
        let result = match self.script(hub) {
            Some(script) => {
                if !script.probe_delay.is_zero() {
                    tokio::time::sleep(script.probe_delay).await;
                }
                script.identity
            }
            None => Err(unknown_hub(hub)),
        };
        let mut metrics = lock(&self.metrics);
        match result {
            Ok(_) => metrics.connect_ok += 1,
            Err(_) => metrics.connect_err += 1,
        }
        result
    }

    async fn fetch_page(
        &self,
        hub: &HubUrl,
        request: PageRequest,
    ) -> Result<EchoPage, ClientError> {
        self.record(ClientCall::FetchPage {
            hub: hub.clone(),
            request,
        });
        let result = match self.script(hub) {
            Some(script) => {
                if !script.page_delay.is_zero() {
                    tokio::time::sleep(script.page_delay).await;
                }
                match script.pages.get(&request.page) {
                    Some(Ok(items)) => Ok(EchoPage {
                        items: items.clone(),
                        total: None,
                    }),
                    Some(Err(error)) => Err(error.clone()),
                    None => Ok(EchoPage::default()),
                }
            }
            None => Err(unknown_hub(hub)),
        };
        let mut metrics = lock(&self.metrics);
        match result {
            Ok(_) => metrics.page_ok += 1,
            Err(_) => metrics.page_err += 1,
        }
        result
    }

    fn metrics(&self) -> ClientMetrics {
        *lock(&self.metrics)
    }
}

/// Minimal raw echo with a numeric id and a millisecond creation time.
pub fn sample_echo(id: u64, created_at_ms: i64) -> RawEcho {
    RawEcho {
        id: EchoId::from(id),
        created_at: Some(CreatedAt::Integer(created_at_ms)),
        content: format!("echo #{id}"),
        username: String::new(),
        images: Vec::new(),
        tags: Vec::new(),
        fav_count: 0,
        extra: serde_json::Map::new(),
    }
}

fn unknown_hub(hub: &HubUrl) -> ClientError {
    ClientError::Request(format!("connection refused: {hub}"))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{sample_echo, ClientCall, HubScript, ScriptedHubClient};
    use crate::client::{ClientError, HubClient};
    use echohub_core::HubUrl;
    use echohub_schema::PageRequest;

    fn url(raw: &str) -> HubUrl {
        HubUrl::parse(raw).expect("valid hub url")
    }

    #[tokio::test]
    async fn serves_scripted_pages_and_records_calls() {
        let hub = url("https://a.example");
        let client = ScriptedHubClient::with_hubs([HubScript::online(hub.clone(), "A")
            .page(1, vec![sample_echo(1, 2_000_000_000_000)])
            .failing_page(2, ClientError::Status(502))]);

        let info = client.connect(&hub).await.expect("online hub");
        assert_eq!(info.server_name, "A");

        let first = client
            .fetch_page(&hub, PageRequest { page: 1, page_size: 10 })
            .await
            .expect("page 1");
        assert_eq!(first.items.len(), 1);

        let second = client
            .fetch_page(&hub, PageRequest { page: 2, page_size: 10 })
            .await;
        assert_eq!(second, Err(ClientError::Status(502)));

        let third = client
            .fetch_page(&hub, PageRequest { page: 3, page_size: 10 })
            .await
            .expect("unscripted page is empty");
        assert!(third.items.is_empty());

        assert_eq!(client.page_requests(&hub), vec![1, 2, 3]);
        assert_eq!(client.calls()[0], ClientCall::Connect(hub.clone()));
        let metrics = client.metrics();
        assert_eq!(metrics.connect_ok, 1);
        assert_eq!(metrics.page_ok, 2);
        assert_eq!(metrics.page_err, 1);
    }

    #[tokio::test]
    async fn unknown_and_offline_hubs_fail_to_connect() {
        let offline = url("https://down.example");
        let client = ScriptedHubClient::with_hubs([HubScript::offline(
            offline.clone(),
            ClientError::Status(503),
        )]);
        assert_eq!(
            client.connect(&offline).await,
            Err(ClientError::Status(503))
        );
        assert!(matches!(
            client.connect(&url("https://nowhere.example")).await,
            Err(ClientError::Request(_))
        ));
        assert_eq!(client.metrics().connect_err, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_delay_is_observed() {
        let hub = url("https://slow.example");
        let client = ScriptedHubClient::with_hubs([
            HubScript::online(hub.clone(), "slow").probe_delay(Duration::from_secs(6))
        ]);
        let started = tokio::time::Instant::now();
        client.connect(&hub).await.expect("eventually answers");
        assert!(started.elapsed() >= Duration::from_secs(6));
    }
}
