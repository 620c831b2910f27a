use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::{CmoreError, Result};
use crate::store::{CONFIG_FILE, SettingsStore};
use crate::transport::Transport;

/// Application version this client targets. A stored configuration that
/// reports a different version is stale and gets refetched.
pub const CONFIG_VERSION: &str = "3.1.4";

pub(crate) const BASE_URL: &str = "https://cmore-mobile-bff.b17g.services";
const CONFIG_DEVICE: &str = "android_tab";

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ConfigDocument {
    pub data: Config,
}

/// Versioned snapshot of the backend endpoint map and feature settings.
///
/// Replaced wholesale on refetch, never merged.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub links: ConfigLinks,
    pub settings: ConfigSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigLinks {
    #[serde(rename = "accountAPI")]
    pub account_api: String,
    #[serde(rename = "pageAPI")]
    pub page_api: String,
    #[serde(rename = "contentDetailsAPI")]
    pub content_details_api: String,
    #[serde(rename = "personalizationAPI")]
    pub personalization_api: String,
    #[serde(rename = "vimondRestAPI")]
    pub vimond_rest_api: String,
    #[serde(rename = "imageProxy")]
    pub image_proxy: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSettings {
    /// Version the backend reports; arrives as a JSON string or number.
    #[serde(rename = "currentAppVersion", deserialize_with = "version_string")]
    pub current_app_version: String,
}

fn version_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid version value: {other}"
        ))),
    }
}

/// Strip separator characters from a version string and read it as an
/// integer, so `"3.1.4"` and `"314"` compare equal.
pub(crate) fn normalize_version(version: &str) -> Option<u64> {
    let digits: String = version.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Backend side of the configuration lifecycle, behind a trait so the
/// refetch cycle can be exercised without a network.
#[async_trait]
pub(crate) trait ConfigFetcher: Send + Sync {
    /// Fetch the raw configuration document from the backend.
    async fn fetch(&self) -> Result<String>;
}

struct BackendConfigFetcher {
    transport: Transport,
    country: String,
}

#[async_trait]
impl ConfigFetcher for BackendConfigFetcher {
    async fn fetch(&self) -> Result<String> {
        let url = format!("{BASE_URL}/configuration");
        let request = self.transport.get(&url).query(&[
            ("device", CONFIG_DEVICE),
            ("locale", self.country.as_str()),
        ]);
        self.transport.execute(request).await
    }
}

/// Owns the versioned remote configuration: load-or-fetch, version
/// comparison, refetch on mismatch.
pub struct ConfigManager {
    store: SettingsStore,
    fetcher: Box<dyn ConfigFetcher>,
}

impl ConfigManager {
    pub fn new(store: SettingsStore, transport: Transport, country: impl Into<String>) -> Self {
        Self {
            store,
            fetcher: Box::new(BackendConfigFetcher {
                transport,
                country: country.into(),
            }),
        }
    }

    #[cfg(test)]
    fn with_fetcher(store: SettingsStore, fetcher: Box<dyn ConfigFetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Load the configuration, fetching it when absent and refetching
    /// exactly once more when its version does not match
    /// [`CONFIG_VERSION`].
    pub async fn get_config(&self) -> Result<Config> {
        let config = match self.store.load(CONFIG_FILE).await? {
            Some(bytes) => serde_json::from_slice::<ConfigDocument>(&bytes)?.data,
            None => self.download_config().await?,
        };

        if normalize_version(&config.settings.current_app_version)
            == normalize_version(CONFIG_VERSION)
        {
            Ok(config)
        } else {
            debug!(
                stored = %config.settings.current_app_version,
                target = CONFIG_VERSION,
                "configuration version mismatch, refetching"
            );
            self.download_config().await
        }
    }

    /// Force a fetch, replacing the stored document wholesale.
    pub async fn refresh(&self) -> Result<Config> {
        self.download_config().await
    }

    /// Fetch the configuration, persist the raw response, then parse what
    /// was written so the on-disk and in-memory state cannot diverge.
    async fn download_config(&self) -> Result<Config> {
        let raw = self.fetcher.fetch().await?;
        self.store.save(CONFIG_FILE, raw.as_bytes()).await?;
        let bytes = self
            .store
            .load(CONFIG_FILE)
            .await?
            .ok_or_else(|| CmoreError::payload("configuration document vanished after save"))?;
        Ok(serde_json::from_slice::<ConfigDocument>(&bytes)?.data)
    }
}
