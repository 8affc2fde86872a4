//! HTTP hub client for echohub.
//!
//! This crate provides a `HubClient` implementation backed by a shared
//! reqwest connection pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use echohub_core::HubUrl;
use echohub_schema::{ApiEnvelope, ConnectInfo, EchoPage, PageRequest, CONNECT_PATH, ECHO_PAGE_PATH};
use echohub_transport::{open_envelope, ClientError, ClientMetrics, HubClient};
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpHubClientConfig {
    /// Overall deadline for one request, body included.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpHubClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            user_agent: concat!("echohub/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct HttpClientMetricsInner {
    connect_ok: AtomicU64,
    connect_err: AtomicU64,
    page_ok: AtomicU64,
    page_err: AtomicU64,
}

#[derive(Debug)]
pub struct HttpHubClient {
    http: reqwest::Client,
    metrics: HttpClientMetricsInner,
}

impl HttpHubClient {
    pub fn new(config: HttpHubClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(request_error)?;
        Ok(Self {
            http,
            metrics: HttpClientMetricsInner::default(),
        })
    }

    /// Wraps an existing reqwest client, sharing its pool and settings.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            metrics: HttpClientMetricsInner::default(),
        }
    }
}

#[async_trait]
impl HubClient for HttpHubClient {
    async fn connect(&self, hub: &HubUrl) -> Result<ConnectInfo, ClientError> {
        let url = hub.endpoint(CONNECT_PATH);
        debug!(%url, "probing hub identity");
        let result = match self.http.get(&url).send().await {
            Ok(response) => read_envelope::<ConnectInfo>(response).await,
            Err(err) => Err(request_error(err)),
        };
        count(&result, &self.metrics.connect_ok, &self.metrics.connect_err);
        result
    }

    async fn fetch_page(
        &self,
        hub: &HubUrl,
        request: PageRequest,
    ) -> Result<EchoPage, ClientError> {
        let url = hub.endpoint(ECHO_PAGE_PATH);
        debug!(%url, page = request.page, page_size = request.page_size, "requesting echo page");
        let result = match self.http.post(&url).json(&request).send().await {
            Ok(response) => read_envelope::<EchoPage>(response).await,
            Err(err) => Err(request_error(err)),
        };
        count(&result, &self.metrics.page_ok, &self.metrics.page_err);
        result
    }

    fn metrics(&self) -> ClientMetrics {
        ClientMetrics {
            connect_ok: self.metrics.connect_ok.load(Ordering::Relaxed),
            connect_err: self.metrics.connect_err.load(Ordering::Relaxed),
            page_ok: self.metrics.page_ok.load(Ordering::Relaxed),
            page_err: self.metrics.page_err.load(Ordering::Relaxed),
        }
    }
}

async fn read_envelope<T: DeserializeOwned + Default>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status(status.as_u16()));
    }
    let body = response.bytes().await.map_err(request_error)?;
    let envelope: ApiEnvelope<T> =
        serde_json::from_slice(&body).map_err(|err| ClientError::Decode(err.to_string()))?;
    open_envelope(envelope)
}

fn request_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Request(format!("timed out: {err}"))
    } else {
        ClientError::Request(err.to_string())
    }
}

fn count<T>(result: &Result<T, ClientError>, ok: &AtomicU64, err: &AtomicU64) {
    match result {
        Ok(_) => ok.fetch_add(1, Ordering::Relaxed),
        Err(_) => err.fetch_add(1, Ordering::Relaxed),
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use echohub_core::HubUrl;
    use echohub_schema::PageRequest;
    use echohub_transport::{ClientError, HubClient};
    use serde_json::{json, Value};

    use super::{HttpHubClient, HttpHubClientConfig};

    async fn spawn_hub(router: Router) -> HubUrl {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        HubUrl::parse(&format!("http://{addr}/")).expect("hub url")
    }

    fn client() -> HttpHubClient {
        HttpHubClient::new(HttpHubClientConfig {
            request_timeout: Duration::from_secs(2),
            ..HttpHubClientConfig::default()
        })
        .expect("client")
    }

    async fn connect_ok() -> Json<Value> {
        Json(json!({
            "code": 1,
            "msg": "ok",
            "data": {"server_name": "Mock Hub", "logo": "https://mock/logo.png"}
        }))
    }

    async fn page_echo(Json(request): Json<PageRequest>) -> Json<Value> {
        let items: Vec<Value> = (0..request.page_size.min(2))
            .map(|i| {
                json!({
                    "id": request.page * 100 + i,
                    "content": "hi",
                    "created_at": "2023-11-14T22:13:20Z"
                })
            })
            .collect();
        Json(json!({"code": 1, "data": {"items": items, "total": 2}}))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_and_page_round_trip_against_mock_hub() {
        let hub = spawn_hub(
            Router::new()
                .route("/api/connect", get(connect_ok))
                .route("/api/echo/page", post(page_echo)),
        )
        .await;
        let client = client();

        let info = client.connect(&hub).await.expect("connect");
        assert_eq!(info.server_name, "Mock Hub");

        let page = client
            .fetch_page(&hub, PageRequest { page: 3, page_size: 10 })
            .await
            .expect("page");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id.as_str(), "300");
        assert_eq!(page.items[1].id.as_str(), "301");

        let metrics = client.metrics();
        assert_eq!(metrics.connect_ok, 1);
        assert_eq!(metrics.page_ok, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn non_success_code_is_rejected() {
        let hub = spawn_hub(Router::new().route(
            "/api/connect",
            get(|| async { Json(json!({"code": 0, "msg": "maintenance"})) }),
        ))
        .await;
        let err = client().connect(&hub).await.expect_err("code 0");
        assert_eq!(
            err,
            ClientError::Rejected {
                code: 0,
                message: "maintenance".to_string()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn http_error_status_and_garbage_body_are_distinguished() {
        let hub = spawn_hub(
            Router::new()
                .route(
                    "/api/connect",
                    get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
                )
                .route("/api/echo/page", post(|| async { "<html>not json</html>" })),
        )
        .await;
        let client = client();
        assert_eq!(
            client.connect(&hub).await,
            Err(ClientError::Status(502))
        );
        let err = client
            .fetch_page(&hub, PageRequest { page: 1, page_size: 10 })
            .await
            .expect_err("garbage body");
        assert!(matches!(err, ClientError::Decode(_)));
        assert_eq!(client.metrics().page_err, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn injected_client_settings_apply_to_hub_requests() {
        let hub = spawn_hub(
            Router::new()
                .route("/api/connect", get(connect_ok))
                .route(
                    "/api/echo/page",
                    post(|| async {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        Json(json!({"code": 1, "data": {"items": []}}))
                    }),
                ),
        )
        .await;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .expect("reqwest client");
        let client = HttpHubClient::with_client(http);

        let info = client.connect(&hub).await.expect("connect");
        assert_eq!(info.server_name, "Mock Hub");

        let err = client
            .fetch_page(&hub, PageRequest { page: 1, page_size: 10 })
            .await
            .expect_err("slower than the injected timeout");
        match err {
            ClientError::Request(message) => assert!(message.starts_with("timed out"), "{message}"),
            other => panic!("expected request timeout, got {other:?}"),
        }
        let metrics = client.metrics();
        assert_eq!(metrics.connect_ok, 1);
        assert_eq!(metrics.page_err, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unreachable_hub_is_a_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        let hub = HubUrl::parse(&format!("http://{addr}")).expect("hub url");
        let err = client().connect(&hub).await.expect_err("nothing listening");
        assert!(matches!(err, ClientError::Request(_)));
    }
}
