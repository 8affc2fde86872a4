use async_trait::async_trait;
use echohub_core::HubUrl;
use echohub_schema::{ApiEnvelope, ConnectInfo, EchoPage, PageRequest};
use thiserror::Error;

/// Failure talking to one hub. Clients map their native errors into this.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The request never produced a response (connect/reset/timeout).
    #[error("request failed: {0}")]
    Request(String),
    /// The hub answered with a non-2xx HTTP status.
    #[error("unexpected http status {0}")]
    Status(u16),
    /// The body was not a well-formed envelope.
    #[error("malformed response: {0}")]
    Decode(String),
    /// The envelope carried a non-success application code.
    #[error("hub rejected request with code {code}: {message}")]
    Rejected { code: i64, message: String },
}

/// Coarse per-client request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientMetrics {
    pub connect_ok: u64,
    pub connect_err: u64,
    pub page_ok: u64,
    pub page_err: u64,
}

/// Read-only client for the two endpoints every hub exposes.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Fetches the hub's self-reported identity.
    async fn connect(&self, hub: &HubUrl) -> Result<ConnectInfo, ClientError>;

    /// Requests one page of echoes, newest first.
    async fn fetch_page(&self, hub: &HubUrl, request: PageRequest)
        -> Result<EchoPage, ClientError>;

    /// Best-effort request counters.
    fn metrics(&self) -> ClientMetrics {
        ClientMetrics::default()
    }
}

/// Unwraps a decoded envelope, treating a non-success code or missing data as failure.
pub fn open_envelope<T>(envelope: ApiEnvelope<T>) -> Result<T, ClientError> {
    if !envelope.is_success() {
        return Err(ClientError::Rejected {
            code: envelope.code,
            message: envelope.msg,
        });
    }
    envelope
        .data
        .ok_or_else(|| ClientError::Decode("success envelope without data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::{open_envelope, ClientError};
    use echohub_schema::{ApiEnvelope, EchoPage};

    #[test]
    fn open_envelope_returns_data_on_success() {
        let page = EchoPage::default();
        assert_eq!(open_envelope(ApiEnvelope::ok(page.clone())), Ok(page));
    }

    #[test]
    fn open_envelope_rejects_non_success_codes() {
        let err = open_envelope(ApiEnvelope::<EchoPage>::failure(0, "closed"))
            .expect_err("code 0 must fail");
        assert_eq!(
            err,
            ClientError::Rejected {
                code: 0,
                message: "closed".to_string()
            }
        );
        assert_eq!(
            err.to_string(),
            "hub rejected request with code 0: closed"
        );
    }

    #[test]
    fn open_envelope_rejects_success_without_data() {
        let envelope = ApiEnvelope::<EchoPage> {
            code: 1,
            msg: String::new(),
            data: None,
        };
        assert!(matches!(
            open_envelope(envelope),
            Err(ClientError::Decode(_))
        ));
    }
}
