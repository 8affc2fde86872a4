//! Wire schema spoken by echohub peers.
//!
//! Hubs answer `GET /api/connect` with a [`ConnectInfo`] and
//! `POST /api/echo/page` with an [`EchoPage`], both wrapped in an
//! [`ApiEnvelope`]. [`Echo`] is the normalized form the aggregator emits.

use echohub_core::{CoreError, CreatedAt, EchoId, EchoKey, HubUrl};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Application-level success code carried in every hub envelope.
pub const CODE_SUCCESS: i64 = 1;

pub const CONNECT_PATH: &str = "/api/connect";
pub const ECHO_PAGE_PATH: &str = "/api/echo/page";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    #[serde(default, alias = "message")]
    pub msg: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            msg: String::new(),
            data: Some(data),
        }
    }

    pub fn failure(code: i64, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }
}

/// Identity a hub reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectInfo {
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub total_echos: u64,
    #[serde(default)]
    pub today_echos: u64,
    #[serde(default)]
    pub sys_username: String,
}

/// Display metadata attached to every echo from one hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubDisplay {
    pub name: String,
    pub logo: String,
}

impl HubDisplay {
    /// Picks the hub's own name and logo, falling back to placeholders when blank.
    pub fn resolve(info: Option<&ConnectInfo>, default_name: &str, default_logo: &str) -> Self {
        let pick = |value: Option<&str>, fallback: &str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        Self {
            name: pick(info.map(|i| i.server_name.as_str()), default_name),
            logo: pick(info.map(|i| i.logo.as_str()), default_logo),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    #[serde(rename = "pageSize")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EchoPage {
    #[serde(default)]
    pub items: Vec<RawEcho>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EchoImage {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub image_source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One echo exactly as a hub serves it. Unknown fields ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEcho {
    pub id: EchoId,
    /// `None` when the hub sent no usable creation time. Such an echo still
    /// decodes with its page and is dropped at normalization.
    #[serde(default, deserialize_with = "lenient_created_at")]
    pub created_at: Option<CreatedAt>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub images: Vec<EchoImage>,
    #[serde(default)]
    pub tags: Vec<Value>,
    #[serde(default)]
    pub fav_count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A normalized echo: sortable timestamp plus the hub it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub key: EchoKey,
    /// Creation time in epoch milliseconds.
    pub created_ts: i64,
    pub server_name: String,
    pub server_url: HubUrl,
    pub logo: String,
    pub payload: RawEcho,
}

impl Echo {
    pub fn from_raw(raw: RawEcho, hub: &HubUrl, display: &HubDisplay) -> Result<Self, CoreError> {
        let created_ts = raw
            .created_at
            .as_ref()
            .ok_or(CoreError::InvalidTimestamp("missing creation time"))?
            .to_millis()?;
        Ok(Self {
            key: EchoKey::new(hub.clone(), raw.id.clone()),
            created_ts,
            server_name: display.name.clone(),
            server_url: hub.clone(),
            logo: display.logo.clone(),
            payload: raw,
        })
    }
}

/// Accepts any JSON value for `created_at`, mapping null and unrecognized
/// shapes to `None` instead of failing the whole page.
fn lenient_created_at<'de, D>(deserializer: D) -> Result<Option<CreatedAt>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(CreatedAt::deserialize(value).ok())
}

/// A configured hub: either a bare address or a record carrying `connect_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HubEntry {
    Address(String),
    Record { connect_url: String },
}

impl HubEntry {
    pub fn raw_address(&self) -> &str {
        match self {
            HubEntry::Address(addr) => addr,
            HubEntry::Record { connect_url } => connect_url,
        }
    }

    pub fn normalize(&self) -> Result<HubUrl, CoreError> {
        HubUrl::parse(self.raw_address())
    }
}

impl From<&str> for HubEntry {
    fn from(value: &str) -> Self {
        HubEntry::Address(value.to_string())
    }
}

impl From<String> for HubEntry {
    fn from(value: String) -> Self {
        HubEntry::Address(value)
    }
}
