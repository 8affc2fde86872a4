use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use echohub_feed::AggregatorConfig;
use echohub_schema::HubEntry;
use echohub_transport_http::HttpHubClientConfig;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CliConfig {
    #[serde(deserialize_with = "deserialize_hubs")]
    pub hubs: Vec<HubEntry>,
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    pub page_size: usize,
    pub batch_size: usize,
    pub low_water_mark: usize,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
    pub default_hub_name: String,
    pub default_hub_logo: String,
}

/// Accepts `"a,b;c"` from the environment or a sequence of addresses and
/// `{ connect_url = "..." }` tables from a file.
fn deserialize_hubs<'de, D>(deserializer: D) -> Result<Vec<HubEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    struct HubListVisitor;

    impl<'de> Visitor<'de> for HubListVisitor {
        type Value = Vec<HubEntry>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a sequence of hub entries")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(split_list(value).into_iter().map(HubEntry::from).collect())
        }

        fn visit_seq<S>(self, mut seq: S) -> Result<Self::Value, S::Error>
        where
            S: de::SeqAccess<'de>,
        {
            let mut hubs = Vec::new();
            while let Some(entry) = seq.next_element::<HubEntry>()? {
                hubs.push(entry);
            }
            Ok(hubs)
        }
    }

    deserializer.deserialize_any(HubListVisitor)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl CliConfig {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let defaults = AggregatorConfig::default();
        let mut builder = Config::builder()
            .set_default("hubs", Vec::<String>::new())?
            .set_default("probe_timeout", "5s")?
            .set_default("page_size", defaults.page_size as u64)?
            .set_default("batch_size", defaults.batch_size as u64)?
            .set_default("low_water_mark", defaults.low_water_mark as u64)?
            .set_default("request_timeout", "10s")?
            .set_default("user_agent", HttpHubClientConfig::default().user_agent)?
            .set_default("default_hub_name", defaults.default_hub_name)?
            .set_default("default_hub_logo", defaults.default_hub_logo)?;

        if let Some(path) = config_path {
            if path.extension().and_then(|ext| ext.to_str()) == Some("env") {
                // Loaded into the process environment so the ECHOHUB_ source below sees it.
                match dotenvy::from_path(&path) {
                    Ok(_) => tracing::info!("loaded environment from {}", path.display()),
                    Err(err) => {
                        tracing::warn!("failed to load .env from {}: {}", path.display(), err)
                    }
                }
            } else {
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(Environment::with_prefix("ECHOHUB").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            probe_timeout: self.probe_timeout,
            page_size: self.page_size,
            batch_size: self.batch_size,
            low_water_mark: self.low_water_mark,
            default_hub_name: self.default_hub_name.clone(),
            default_hub_logo: self.default_hub_logo.clone(),
            ..AggregatorConfig::default()
        }
    }

    pub fn http_client_config(&self) -> HttpHubClientConfig {
        HttpHubClientConfig {
            request_timeout: self.request_timeout,
            user_agent: self.user_agent.clone(),
        }
    }
}
