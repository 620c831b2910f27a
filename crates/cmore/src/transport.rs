use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder};
use rustc_hash::FxHashMap;
use rustls::ClientConfig;
use rustls::crypto::aws_lc_rs;
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::debug;

use crate::error::{Result, check_error_envelope};
use crate::store::{COOKIE_FILE, SettingsStore};

/// Build the default HTTP client used by [`crate::CmoreClient::new`].
pub fn default_client() -> Client {
    let provider = Arc::new(aws_lc_rs::default_provider());
    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("Failed to configure default TLS protocol versions")
        .with_platform_verifier()
        .unwrap()
        .with_no_client_auth();

    Client::builder()
        .use_preconfigured_tls(tls_config)
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
}

/// HTTP transport with a persisted cookie store.
///
/// Cookies live in a plain name/value map: loaded permissively at startup
/// (a missing or unreadable cookie document starts empty, discard and
/// expiry attributes are ignored), sent with every request, and re-saved to
/// the settings directory after every response. Every response body is
/// checked for a backend error envelope before it is handed back.
///
/// Clones share the same cookie store.
#[derive(Clone)]
pub struct Transport {
    client: Client,
    store: SettingsStore,
    cookies: Arc<Mutex<FxHashMap<String, String>>>,
}

impl Transport {
    pub async fn new(client: Client, store: SettingsStore) -> Self {
        let cookies = match store.load(COOKIE_FILE).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_default(),
            _ => FxHashMap::default(),
        };
        Self {
            client,
            store,
            cookies: Arc::new(Mutex::new(cookies)),
        }
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Create a request with the stored cookies attached.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        debug!(method = %method, url, "building request");
        let mut builder = self.client.request(method, url);
        if let Some(header) = self.cookie_header() {
            builder = builder.header(COOKIE, header);
        }
        builder
    }

    /// Send a prepared request and return the raw body.
    ///
    /// Response cookies are stored and the cookie document re-saved before
    /// the body is checked for a backend error envelope. Transport failures
    /// propagate unchanged.
    pub async fn execute(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        debug!(status = %response.status(), "response received");
        self.store_response_cookies(response.headers());
        self.save_cookies().await?;

        let body = response.text().await?;
        check_error_envelope(&body)?;
        Ok(body)
    }

    fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookies.lock();
        if cookies.is_empty() {
            return None;
        }

        let mut header = String::with_capacity(
            cookies.iter().map(|(k, v)| k.len() + 1 + v.len() + 2).sum(),
        );
        for (name, value) in cookies.iter() {
            if !header.is_empty() {
                header.push_str("; ");
            }
            header.push_str(name);
            header.push('=');
            header.push_str(value);
        }
        Some(header)
    }

    fn store_response_cookies(&self, headers: &HeaderMap) {
        let mut cookies = self.cookies.lock();
        for value in headers.get_all(SET_COOKIE).iter() {
            if let Ok(cookie_str) = value.to_str()
                && let Some(cookie_part) = cookie_str.split(';').next()
                && let Some((name, value)) = cookie_part.split_once('=')
            {
                let name = name.trim();
                let value = value.trim();
                if name.is_empty() || value.is_empty() {
                    continue;
                }
                cookies.insert(name.to_owned(), value.to_owned());
            }
        }
    }

    async fn save_cookies(&self) -> Result<()> {
        let bytes = {
            let cookies = self.cookies.lock();
            serde_json::to_vec(&*cookies)?
        };
        self.store.save(COOKIE_FILE, &bytes).await
    }

    #[cfg(test)]
    pub(crate) fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.lock().get(name).cloned()
    }

    #[cfg(test)]
    pub(crate) fn set_cookie(&self, name: &str, value: &str) {
        self.cookies.lock().insert(name.to_owned(), value.to_owned());
    }
}
