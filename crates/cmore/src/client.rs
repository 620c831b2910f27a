use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::catalog::CatalogClient;
use crate::config::{Config, ConfigManager};
use crate::error::Result;
use crate::session::SessionManager;
use crate::store::SettingsStore;
use crate::stream::{StreamDescriptor, StreamResolver};
use crate::transport::{Transport, default_client};

/// Authenticated C More backend client.
///
/// Owns the transport, the persisted settings store and an immutable
/// configuration snapshot; the session, catalog and stream components share
/// these. The snapshot is only ever replaced wholesale, never mutated.
pub struct CmoreClient {
    store: SettingsStore,
    transport: Transport,
    config: Arc<Config>,
    country: String,
    session: SessionManager,
    catalog: CatalogClient,
    stream: StreamResolver,
}

impl CmoreClient {
    /// Connect a client for the given settings directory and locale (for
    /// example `sv_SE`). Loads the cookie jar permissively and resolves the
    /// configuration snapshot, fetching it when absent or stale.
    pub async fn new(settings_folder: impl Into<PathBuf>, country: &str) -> Result<Self> {
        Self::with_client(settings_folder, country, default_client()).await
    }

    /// Like [`CmoreClient::new`] with a caller-provided HTTP client.
    pub async fn with_client(
        settings_folder: impl Into<PathBuf>,
        country: &str,
        client: reqwest::Client,
    ) -> Result<Self> {
        let store = SettingsStore::new(settings_folder);
        let transport = Transport::new(client, store.clone()).await;
        let config = Arc::new(
            ConfigManager::new(store.clone(), transport.clone(), country)
                .get_config()
                .await?,
        );
        Ok(Self::assemble(store, transport, config, country))
    }

    fn assemble(
        store: SettingsStore,
        transport: Transport,
        config: Arc<Config>,
        country: &str,
    ) -> Self {
        let session = SessionManager::new(
            transport.clone(),
            store.clone(),
            config.clone(),
            country,
        );
        let catalog = CatalogClient::new(
            transport.clone(),
            config.clone(),
            session.clone(),
            country,
        );
        let stream = StreamResolver::new(transport.clone(), config.clone(), session.clone());
        Self {
            store,
            transport,
            config,
            country: country.to_string(),
            session,
            catalog,
            stream,
        }
    }

    /// Refetch the configuration and replace the snapshot wholesale.
    pub async fn refresh_config(&mut self) -> Result<()> {
        let manager =
            ConfigManager::new(self.store.clone(), self.transport.clone(), &self.country);
        let config = Arc::new(manager.refresh().await?);
        *self = Self::assemble(
            self.store.clone(),
            self.transport.clone(),
            config,
            &self.country,
        );
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    /// See [`SessionManager::login`].
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        operator: Option<&str>,
    ) -> Result<()> {
        self.session.login(username, password, operator).await
    }

    /// See [`SessionManager::reset_credentials`].
    pub async fn logout(&self) -> Result<()> {
        self.session.reset_credentials().await
    }

    pub async fn get_operators(&self) -> Result<Value> {
        self.session.get_operators().await
    }

    pub async fn get_page(&self, page_id: &str, namespace: &str) -> Result<Value> {
        self.catalog.get_page(page_id, namespace).await
    }

    pub async fn parse_page(
        &self,
        page_id: &str,
        namespace: &str,
        main_categories: bool,
    ) -> Result<Vec<Value>> {
        self.catalog
            .parse_page(page_id, namespace, main_categories)
            .await
    }

    pub async fn get_contentdetails(
        &self,
        page_type: &str,
        page_id: &str,
        season: Option<u32>,
    ) -> Result<Value> {
        self.catalog
            .get_contentdetails(page_type, page_id, season)
            .await
    }

    pub async fn get_unfinished_assets(&self, limit: u32) -> Result<Value> {
        self.catalog.get_unfinished_assets(limit).await
    }

    /// See [`StreamResolver::get_stream`].
    pub async fn get_stream(&self, video_id: &str) -> Result<StreamDescriptor> {
        self.stream.get_stream(video_id).await
    }

    /// Route an image URL through the backend's image proxy. A pure string
    /// transform; no request is made.
    pub fn get_image_url(&self, image_url: &str) -> String {
        format!("{}?source={}", self.config.links.image_proxy, image_url)
    }
}
