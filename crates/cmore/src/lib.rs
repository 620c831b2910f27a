//! A Kodi-agnostic client library for the C More streaming service.
//!
//! The client authenticates against the C More backend, keeps its session
//! and versioned configuration on disk, fetches catalog pages and resolves
//! playable stream descriptors (including DRM license metadata) for the
//! playback layer.
//!
//! ```rust,ignore
//! use cmore::CmoreClient;
//!
//! # async fn doc() -> cmore::Result<()> {
//! let client = CmoreClient::new("/path/to/settings", "sv_SE").await?;
//! client.login(Some("user@example.com"), Some("hunter2"), None).await?;
//!
//! let start = client.parse_page("start", "page", true).await?;
//! let stream = client.get_stream("12345").await?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod stream;
pub mod transport;

pub use catalog::{CatalogClient, PAGES};
pub use client::CmoreClient;
pub use config::{CONFIG_VERSION, Config, ConfigLinks, ConfigManager, ConfigSettings};
pub use error::{CmoreError, Result, check_error_envelope};
pub use session::{Credentials, RememberMe, SessionManager};
pub use store::SettingsStore;
pub use stream::{StreamDescriptor, StreamResolver};
pub use transport::{Transport, default_client};
