//! # YouTube credentials
//!
//! OAuth2 for the YouTube Data API via the device authorization flow: on the
//! first run the operator visits a verification URL and enters a code, after
//! which tokens are cached through a [`TokenStore`] and refreshed silently.
//! The interactive prompt only ever happens from [`DeviceFlowAuthenticator::bootstrap`],
//! which the binary runs at startup; `obtain` never blocks on the operator.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use token_store::TokenStore;

const DEVICE_CODE_URL: &str = "https://oauth2.googleapis.com/device/code";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";
const CREDENTIALS_KEY: &str = "youtube_credentials";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest_middleware::Error),
    #[error("response decode error: {0}")]
    Decode(#[from] reqwest::Error),
    #[error("token endpoint error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("authorization denied or expired: {0}")]
    Denied(String),
    #[error("no cached credentials; restart the bot to run the authorization flow")]
    NoCredentials,
    #[error("credential store error: {0}")]
    Store(anyhow::Error),
}

/// Supplies bearer tokens for the video service.
pub trait CredentialProvider {
    /// Returns a currently-valid access token, refreshing a cached one if it
    /// has expired.
    fn obtain(&self) -> impl Future<Output = Result<String, AuthError>> + Send;

    /// Forces a refresh and returns the new access token.
    fn refresh(&self) -> impl Future<Output = Result<String, AuthError>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedCredentials {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl CachedCredentials {
    fn from_token_response(token: TokenResponse, fallback_refresh: Option<String>) -> Self {
        CachedCredentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token.or(fallback_refresh),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
        }
    }

    /// Valid with at least a minute of slack, so a token never expires
    /// mid-request.
    fn is_fresh(&self) -> bool {
        self.expires_at > Utc::now() + chrono::Duration::seconds(60)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_url: String,
    expires_in: u64,
    #[serde(default = "default_poll_interval")]
    interval: u64,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    error_description: Option<String>,
}

pub struct DeviceFlowAuthenticator<S: TokenStore> {
    client: ClientWithMiddleware,
    client_id: String,
    client_secret: String,
    store: S,
    cached: tokio::sync::Mutex<Option<CachedCredentials>>,
}

impl<S: TokenStore + Send + Sync> DeviceFlowAuthenticator<S> {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        store: S,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: crate::http::retrying_client(Duration::from_secs(30))?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            store,
            cached: tokio::sync::Mutex::new(None),
        })
    }

    /// Ensures usable credentials exist, running the interactive device flow
    /// if the cache is missing or beyond refresh. Call once at startup.
    pub async fn bootstrap(&self) -> anyhow::Result<()> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.load_cached().await?;
        }

        let renewed = match cached.as_ref() {
            Some(creds) if creds.is_fresh() => return Ok(()),
            Some(creds) if creds.refresh_token.is_some() => {
                match self.refresh_credentials(creds).await {
                    Ok(renewed) => renewed,
                    Err(e) => {
                        tracing::warn!(error = ?e, "Cached credentials beyond refresh, reauthorizing");
                        self.device_flow().await?
                    }
                }
            }
            _ => self.device_flow().await?,
        };

        self.persist(&renewed).await?;
        *cached = Some(renewed);
        Ok(())
    }

    async fn load_cached(&self) -> anyhow::Result<Option<CachedCredentials>> {
        let Some(raw) = self.store.load(CREDENTIALS_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(creds) => Ok(Some(creds)),
            Err(e) => {
                tracing::warn!(error = ?e, "Ignoring unreadable credential cache");
                Ok(None)
            }
        }
    }

    async fn persist(&self, creds: &CachedCredentials) -> anyhow::Result<()> {
        let raw = serde_json::to_string(creds)?;
        self.store.save(CREDENTIALS_KEY, &raw).await
    }

    #[tracing::instrument(skip(self))]
    async fn device_flow(&self) -> Result<CachedCredentials, AuthError> {
        let resp = self
            .client
            .post(DEVICE_CODE_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", YOUTUBE_SCOPE),
            ])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to request device code"))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let grant = resp.json::<DeviceCodeResponse>().await?;

        // Operator-facing prompt, deliberately on stdout rather than the log
        println!(
            "To authorize YouTube access, visit {} and enter code {}",
            grant.verification_url, grant.user_code
        );
        tracing::info!(verification_url = %grant.verification_url, "Waiting for device authorization");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(grant.expires_in);
        let mut interval = grant.interval.max(1);
        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::Denied("device authorization timed out".into()));
            }
            tokio::time::sleep(Duration::from_secs(interval)).await;
            if let Some(token) = self.poll_token(&grant.device_code, &mut interval).await? {
                return Ok(CachedCredentials::from_token_response(token, None));
            }
        }
    }

    async fn poll_token(
        &self,
        device_code: &str,
        interval: &mut u64,
    ) -> Result<Option<TokenResponse>, AuthError> {
        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("device_code", device_code),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(Some(resp.json::<TokenResponse>().await?));
        }

        let err_body = resp.json::<TokenErrorResponse>().await.unwrap_or_default();
        match err_body.error.as_str() {
            "authorization_pending" => Ok(None),
            "slow_down" => {
                *interval += 5;
                Ok(None)
            }
            "access_denied" | "expired_token" => Err(AuthError::Denied(err_body.error)),
            _ => Err(AuthError::Api {
                status: status.as_u16(),
                message: err_body.error_description.unwrap_or(err_body.error),
            }),
        }
    }

    async fn refresh_credentials(
        &self,
        creds: &CachedCredentials,
    ) -> Result<CachedCredentials, AuthError> {
        let refresh_token = creds.refresh_token.as_deref().ok_or(AuthError::NoCredentials)?;

        let resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to refresh access token"))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if message.contains("invalid_grant") {
                return Err(AuthError::Denied("refresh token revoked or expired".into()));
            }
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let token = resp.json::<TokenResponse>().await?;
        Ok(CachedCredentials::from_token_response(
            token,
            creds.refresh_token.clone(),
        ))
    }
}

impl<S: TokenStore + Send + Sync> CredentialProvider for DeviceFlowAuthenticator<S> {
    async fn obtain(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.load_cached().await.map_err(AuthError::Store)?;
        }
        let creds = cached.clone().ok_or(AuthError::NoCredentials)?;

        if creds.is_fresh() {
            return Ok(creds.access_token);
        }

        let renewed = self.refresh_credentials(&creds).await?;
        let token = renewed.access_token.clone();
        self.persist(&renewed).await.map_err(AuthError::Store)?;
        *cached = Some(renewed);
        Ok(token)
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.load_cached().await.map_err(AuthError::Store)?;
        }
        let creds = cached.clone().ok_or(AuthError::NoCredentials)?;

        let renewed = self.refresh_credentials(&creds).await?;
        let token = renewed.access_token.clone();
        self.persist(&renewed).await.map_err(AuthError::Store)?;
        *cached = Some(renewed);
        Ok(token)
    }
}

/// Fixed-token provider, the in-memory strategy used by tests.
pub struct StaticTokenProvider(pub String);

impl CredentialProvider for StaticTokenProvider {
    async fn obtain(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        Ok(self.0.clone())
    }
}
