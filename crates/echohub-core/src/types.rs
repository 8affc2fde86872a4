use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CoreError;

/// Normalized base address of a hub: trimmed, no trailing `/`, http(s) only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HubUrl(String);

impl HubUrl {
    /// Normalizes a configured address into a hub base URL.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(CoreError::InvalidAddress("empty address"));
        }
        let host = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or(CoreError::InvalidAddress("missing http(s) scheme"))?;
        if host.trim().is_empty() {
            return Err(CoreError::InvalidAddress("missing host"));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Joins an API path onto the base address.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for HubUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HubUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hub-local echo identifier.
///
/// Hubs send numeric ids; string ids are accepted too and both forms are kept
/// as text so `7` and `"7"` name the same echo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EchoId(String);

impl EchoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for EchoId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EchoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for EchoId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EchoId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = EchoId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer or a non-empty string id")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(EchoId(value.to_string()))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(EchoId(value.to_string()))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                let value = value.trim();
                if value.is_empty() {
                    return Err(E::invalid_value(de::Unexpected::Str(value), &self));
                }
                Ok(EchoId(value.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Feed-wide identity of one echo: the hub it came from plus its hub-local id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EchoKey {
    pub hub: HubUrl,
    pub id: EchoId,
}

impl EchoKey {
    pub fn new(hub: HubUrl, id: EchoId) -> Self {
        Self { hub, id }
    }
}

impl fmt::Display for EchoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.hub, self.id)
    }
}

impl<'de> Deserialize<'de> for HubUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        HubUrl::parse(&raw).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::{EchoId, EchoKey, HubUrl};
    use crate::error::CoreError;

    #[test]
    fn parse_strips_whitespace_and_trailing_slashes() {
        let url = HubUrl::parse("  https://hub.example.com//  ").expect("valid url");
        assert_eq!(url.as_str(), "https://hub.example.com");
        assert_eq!(
            HubUrl::parse("http://10.0.0.2:6277/").expect("valid url").as_str(),
            "http://10.0.0.2:6277"
        );
    }

    #[test]
    fn parse_rejects_empty_and_schemeless_addresses() {
        assert_eq!(
            HubUrl::parse("   "),
            Err(CoreError::InvalidAddress("empty address"))
        );
        assert_eq!(
            HubUrl::parse("hub.example.com"),
            Err(CoreError::InvalidAddress("missing http(s) scheme"))
        );
        assert_eq!(
            HubUrl::parse("https:// /"),
            Err(CoreError::InvalidAddress("missing host"))
        );
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let url = HubUrl::parse("https://hub.example.com/").expect("valid url");
        assert_eq!(
            url.endpoint("/api/connect"),
            "https://hub.example.com/api/connect"
        );
        assert_eq!(
            url.endpoint("api/echo/page"),
            "https://hub.example.com/api/echo/page"
        );
    }

    #[test]
    fn echo_id_accepts_numbers_and_strings_as_the_same_id() {
        let numeric: EchoId = serde_json::from_str("42").expect("numeric id");
        let text: EchoId = serde_json::from_str("\"42\"").expect("string id");
        assert_eq!(numeric, text);
        assert_eq!(numeric, EchoId::from(42));
        assert!(serde_json::from_str::<EchoId>("\"  \"").is_err());
        assert!(serde_json::from_str::<EchoId>("null").is_err());
    }

    #[test]
    fn echo_key_display_joins_hub_and_id() {
        let key = EchoKey::new(
            HubUrl::parse("https://a.example").expect("valid url"),
            EchoId::from(7),
        );
        assert_eq!(key.to_string(), "https://a.example-7");
    }

    #[test]
    fn hub_url_deserialize_normalizes() {
        let url: HubUrl = serde_json::from_str("\"https://a.example/\"").expect("valid");
        assert_eq!(url.as_str(), "https://a.example");
        assert!(serde_json::from_str::<HubUrl>("\"ftp://a.example\"").is_err());
    }
}
