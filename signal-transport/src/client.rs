//! SAFE API client
//!
//! Authenticates with HTTP Basic credentials against the auth endpoint to
//! obtain a bearer token, then posts signals as JSON or zipped batches as a
//! multipart `file` upload. Failed requests are reported, never retried.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{CredentialCache, TransportConfig};
use signal_core::ResolvedSignal;

/// Errors from talking to the SAFE API
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accepts `true`, `"true"` and numbers alike
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Number(u64),
    Text(String),
}

impl Loose {
    fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0,
            Self::Text(s) => s.trim().eq_ignore_ascii_case("true"),
        }
    }

    fn as_secs(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<Loose>::deserialize(deserializer)?.map_or(false, |v| v.as_bool()))
}

fn loose_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(Option::<Loose>::deserialize(deserializer)?.and_then(|v| v.as_secs()))
}

/// Reply to a signal submission
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default, deserialize_with = "loose_bool")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    /// Seconds the server asks the caller to wait before resubmitting
    #[serde(default, deserialize_with = "loose_secs")]
    pub retry_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default, deserialize_with = "loose_secs")]
    expires_in: Option<u64>,
}

/// Destination for resolved signals
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit one resolved signal as JSON
    async fn submit(&self, signal: &ResolvedSignal) -> Result<SubmitResponse, TransportError>;

    /// Forward a zipped batch of signals unchanged
    async fn submit_archive(&self, path: &Path) -> Result<SubmitResponse, TransportError>;
}

/// Create an HTTP client for the SAFE API
pub fn create_client(config: &TransportConfig) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(concat!("safe-signals/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TransportError::ClientBuild(e.to_string()))
}

/// [`Transport`] over HTTPS
pub struct HttpTransport {
    config: TransportConfig,
    client: Client,
    credentials: Arc<CredentialCache>,
    /// Serializes token refreshes so concurrent submissions authenticate once
    auth_lock: Mutex<()>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        Self::with_credentials(config, Arc::new(CredentialCache::new()))
    }

    /// Share a token cache with other transports
    pub fn with_credentials(
        config: TransportConfig,
        credentials: Arc<CredentialCache>,
    ) -> Result<Self, TransportError> {
        if config.base_url.trim().is_empty() {
            return Err(TransportError::ClientBuild("base URL is empty".to_string()));
        }

        let client = create_client(&config)?;
        Ok(Self {
            config,
            client,
            credentials,
            auth_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialCache> {
        &self.credentials
    }

    /// A valid access token, authenticating if none is cached
    pub async fn access_token(&self) -> Result<String, TransportError> {
        if let Some(token) = self.credentials.get() {
            return Ok(token);
        }

        let _guard = self.auth_lock.lock().await;
        // another task may have refreshed while we waited
        if let Some(token) = self.credentials.get() {
            return Ok(token);
        }

        self.authenticate().await
    }

    async fn authenticate(&self) -> Result<String, TransportError> {
        debug!("Authenticating against {}", self.config.auth_url());

        let response = self
            .client
            .post(self.config.auth_url())
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Auth(format!("{}: {}", status, body)));
        }

        let auth: AuthResponse = response.json().await?;
        let token = auth
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                TransportError::Auth(format!(
                    "no access token in response (status {})",
                    auth.status.as_deref().unwrap_or("unknown")
                ))
            })?;

        self.credentials
            .store(&token, auth.expires_in.map(Duration::from_secs));
        info!("Successfully fetched access token");
        Ok(token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<SubmitResponse, TransportError> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("Access token rejected, clearing credential cache");
            self.credentials.clear();
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, signal: &ResolvedSignal) -> Result<SubmitResponse, TransportError> {
        debug!("Submitting signal {}", signal.id);
        let request = self.client.post(self.config.signals_url()).json(signal);
        self.send(request).await
    }

    async fn submit_archive(&self, path: &Path) -> Result<SubmitResponse, TransportError> {
        debug!("Submitting archive {}", path.display());

        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "signals.zip".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/zip")?;

        let request = self
            .client
            .post(self.config.archive_url())
            .multipart(Form::new().part("file", part));
        self.send(request).await
    }
}
