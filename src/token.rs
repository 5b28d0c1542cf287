//! Access token management for the message channel
//!
//! Handles token caching, expiry tracking, forced refresh after the
//! provider rejects a token, and concurrency safety: the freshness check,
//! the fetch and the store all happen under one lock, so concurrent callers
//! racing a refresh trigger a single fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::client::WechatClient;
use crate::error::{codes, WechatError};
use crate::notify::{fire_and_forget, LogNotifier, Notifier};
use crate::types::AccessToken;

/// Tokens closer than this to expiry are refreshed.
pub const REFRESH_GRACE: Duration = Duration::from_secs(5 * 60);

const TOKEN_PATH: &str = "/cgi-bin/token";
const ALERT_SUBJECT: &str = "Failed to obtain WeChat access token";

/// A bearer token and its lifetime.
///
/// Replaced wholesale on refresh, never mutated.
#[derive(Debug, Clone)]
pub struct Credential {
    token: AccessToken,
    obtained_at: Instant,
    ttl: Option<Duration>,
}

impl Credential {
    pub fn new(token: AccessToken, ttl: Duration) -> Self {
        Self {
            token,
            obtained_at: Instant::now(),
            ttl: Some(ttl),
        }
    }

    /// An externally managed token with no known lifetime. Always fresh.
    pub fn permanent(token: AccessToken) -> Self {
        Self {
            token,
            obtained_at: Instant::now(),
            ttl: None,
        }
    }

    pub fn token(&self) -> &str {
        self.token.as_str()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.ttl.map(|ttl| self.obtained_at + ttl)
    }

    /// `expires_at - now > grace`, or no expiry at all.
    pub fn is_fresh(&self, grace: Duration) -> bool {
        match self.expires_at() {
            None => true,
            Some(expires_at) => expires_at.saturating_duration_since(Instant::now()) > grace,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: u64,
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Manages access_token lifecycle with automatic refresh
pub struct TokenManager {
    client: WechatClient,
    cache: Mutex<Option<Credential>>,
    refresh_grace: Duration,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("client", &self.client)
            .field("refresh_grace", &self.refresh_grace)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    pub fn new(client: WechatClient) -> Self {
        Self {
            client,
            cache: Mutex::new(None),
            refresh_grace: REFRESH_GRACE,
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Sets the collaborator alerted when a token fetch fails.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Returns a fresh token, fetching one if none is cached or the cached
    /// one is within the grace period of expiry.
    pub async fn get_token(&self) -> Result<String, WechatError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(self.refresh_grace) {
                return Ok(cached.token().to_string());
            }
        }

        let credential = self.fetch_token().await?;
        let token = credential.token().to_string();
        *cache = Some(credential);
        Ok(token)
    }

    /// Replaces a token the provider rejected.
    ///
    /// If another caller already replaced `stale` with a fresh token, that
    /// token is returned without fetching again.
    pub async fn refresh(&self, stale: &str) -> Result<String, WechatError> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if cached.token() != stale && cached.is_fresh(self.refresh_grace) {
                return Ok(cached.token().to_string());
            }
        }

        let credential = self.fetch_token().await?;
        let token = credential.token().to_string();
        *cache = Some(credential);
        Ok(token)
    }

    /// Installs an externally managed token. It is never refreshed on
    /// expiry, only when the provider rejects it.
    pub async fn set_token(&self, token: AccessToken) {
        *self.cache.lock().await = Some(Credential::permanent(token));
    }

    pub async fn invalidate(&self) {
        let mut cache = self.cache.lock().await;
        *cache = None;
    }

    /// A snapshot of the cached credential, if any.
    pub async fn credential(&self) -> Option<Credential> {
        self.cache.lock().await.clone()
    }

    async fn fetch_token(&self) -> Result<Credential, WechatError> {
        log::info!("fetching access token for appid {}", self.client.appid());

        match self.request_token().await {
            Ok(credential) => Ok(credential),
            Err(e) => {
                log::error!("failed to fetch access token: {e}");
                fire_and_forget(&self.notifier, ALERT_SUBJECT.to_string(), e.to_string());
                Err(e)
            }
        }
    }

    async fn request_token(&self) -> Result<Credential, WechatError> {
        let query = [
            ("grant_type", "client_credential"),
            ("appid", self.client.appid()),
            ("secret", self.client.secret()),
        ];
        let url = self.client.endpoint_url(TOKEN_PATH);
        let request = self.client.http().get(url).query(&query).build()?;
        let value = self.client.execute_json(request).await?;
        let response: TokenResponse = serde_json::from_value(value)?;

        if response.errcode != codes::SUCCESS {
            return Err(WechatError::Credential {
                code: response.errcode,
                message: response.errmsg,
            });
        }

        let token = AccessToken::new(response.access_token).map_err(WechatError::Token)?;
        Ok(Credential::new(
            token,
            Duration::from_secs(response.expires_in),
        ))
    }
}
