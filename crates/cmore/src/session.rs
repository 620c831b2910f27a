use std::sync::Arc;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::{CmoreError, Result};
use crate::store::{CREDENTIALS_FILE, SettingsStore};
use crate::transport::Transport;

/// Client identifier sent with account requests.
pub(crate) const CLIENT_ID: &str = "cmore-android";

/// Persisted session credentials.
///
/// Fields the library does not interpret are carried through untouched, so
/// a save never loses what the backend sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token for catalog and page calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    /// Bearer token for the streaming playback API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vimond_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<RememberMe>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Long-lived rotation token that can refresh a session without a password.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RememberMe {
    #[serde(default)]
    pub token: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credentials {
    /// The stored remember-me token, when a non-empty one is present.
    pub fn remember_me_token(&self) -> Option<&str> {
        self.remember_me
            .as_ref()
            .map(|r| r.token.as_str())
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: Credentials,
}

/// Owns login, logout and credential persistence. Other components only
/// read token fields through [`SessionManager::get_credentials`]; they
/// never mutate credentials.
#[derive(Clone)]
pub struct SessionManager {
    transport: Transport,
    store: SettingsStore,
    config: Arc<Config>,
    country: String,
    country_code: String,
}

impl SessionManager {
    pub(crate) fn new(
        transport: Transport,
        store: SettingsStore,
        config: Arc<Config>,
        country: &str,
    ) -> Self {
        // Locale strings look like `sv_SE`; the country code is the suffix.
        let country_code = country
            .split('_')
            .nth(1)
            .unwrap_or_default()
            .to_lowercase();
        Self {
            transport,
            store,
            config,
            country: country.to_string(),
            country_code,
        }
    }

    /// Load the stored credentials. A missing file is reset to an empty
    /// mapping and read back, so disk and memory agree from first access.
    pub async fn get_credentials(&self) -> Result<Credentials> {
        match self.store.load(CREDENTIALS_FILE).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => {
                self.reset_credentials().await?;
                let bytes = self.store.load(CREDENTIALS_FILE).await?.ok_or_else(|| {
                    CmoreError::payload("credentials document vanished after reset")
                })?;
                Ok(serde_json::from_slice(&bytes)?)
            }
        }
    }

    /// Overwrite the credentials document with an empty mapping (logout).
    pub async fn reset_credentials(&self) -> Result<()> {
        let empty = serde_json::to_vec(&Credentials::default())?;
        self.store.save(CREDENTIALS_FILE, &empty).await
    }

    /// Parse a login response and persist its credentials, carrying over a
    /// stored remember-me token so a token-based re-login never drops it.
    pub async fn save_credentials(&self, raw: &str) -> Result<()> {
        let mut credentials = serde_json::from_str::<LoginResponse>(raw)?.data;
        let stored = self.get_credentials().await?;
        if let Some(token) = stored.remember_me_token() {
            credentials.remember_me = Some(RememberMe {
                token: token.to_string(),
                ..Default::default()
            });
        }
        let bytes = serde_json::to_vec(&credentials)?;
        self.store.save(CREDENTIALS_FILE, &bytes).await
    }

    /// Log in to the account session endpoint.
    ///
    /// A stored remember-me token selects a PUT token refresh; otherwise a
    /// POST with username/password (plus operator and country code when an
    /// operator is given). The path is picked purely from token presence,
    /// never by the caller. Either response goes through
    /// [`SessionManager::save_credentials`].
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        operator: Option<&str>,
    ) -> Result<()> {
        let stored = self.get_credentials().await?;
        let (method, payload) = build_login_request(
            &stored,
            username,
            password,
            operator,
            &self.country,
            &self.country_code,
        );
        let url = format!("{}session", self.config.links.account_api);
        debug!(method = %method, url, "logging in");

        let request = self
            .transport
            .request(method, &url)
            .query(&[("client", CLIENT_ID), ("legacy", "true")])
            .form(&payload);
        let response = self.transport.execute(request).await?;
        self.save_credentials(&response).await
    }

    /// Fetch the TV-operator list used for operator-backed logins.
    pub async fn get_operators(&self) -> Result<Value> {
        let url = format!("{}operators", self.config.links.account_api);
        let request = self.transport.get(&url).query(&[
            ("client", CLIENT_ID),
            ("country_code", self.country_code.as_str()),
        ]);
        let body = self.transport.execute(request).await?;
        let document: Value = serde_json::from_str(&body)?;
        document
            .pointer("/data/operators")
            .cloned()
            .ok_or_else(|| CmoreError::payload("operators missing from response"))
    }
}

/// Decide the login request shape from the stored credentials.
fn build_login_request(
    stored: &Credentials,
    username: Option<&str>,
    password: Option<&str>,
    operator: Option<&str>,
    locale: &str,
    country_code: &str,
) -> (Method, Vec<(String, String)>) {
    if let Some(token) = stored.remember_me_token() {
        let payload = vec![
            ("locale".to_string(), locale.to_string()),
            ("remember_me".to_string(), token.to_string()),
        ];
        (Method::PUT, payload)
    } else {
        let mut payload = vec![
            (
                "username".to_string(),
                username.unwrap_or_default().to_string(),
            ),
            (
                "password".to_string(),
                password.unwrap_or_default().to_string(),
            ),
        ];
        if let Some(operator) = operator {
            payload.push(("country_code".to_string(), country_code.to_string()));
            payload.push(("operator".to_string(), operator.to_string()));
        }
        (Method::POST, payload)
    }
}
