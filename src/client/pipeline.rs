//! Authenticated request pipeline for the message channel.
//!
//! One logical call runs through:
//!
//! 1. build: resolve the URL, inject the cached access token
//! 2. transmit: transport failures and non-2xx statuses are errors
//! 3. parse: normalize the JSON envelope (`base_resp`, string codes)
//! 4. classify: on an expired-credential code, refresh the token and
//!    replay the whole request exactly once; everything else is returned
//!    to the caller as data

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use crate::api::WechatContext;
use crate::error::WechatError;
use crate::types::Envelope;

use super::wechat_client::is_absolute;

/// Prefix for endpoints given relative to the message API root.
pub(crate) const API_PREFIX: &str = "/cgi-bin/";

const ACCESS_TOKEN: &str = "access_token";

/// A message-channel call, replayable for the credential retry.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    timeout: Option<Duration>,
}

impl ApiRequest {
    /// `endpoint` may be relative to `/cgi-bin/` (`"user/info"`), rooted at
    /// the base URL (`"/sns/userinfo"`), or an absolute URL.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Overrides the client-wide timeout for this call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl WechatContext {
    /// Runs `request` through the authenticated pipeline.
    ///
    /// Non-zero error codes come back as an [`Envelope`], not as `Err`;
    /// use [`Envelope::into_result`] to convert them.
    ///
    /// # Errors
    /// - `WechatError::Http` for transport failures and non-2xx statuses
    /// - `WechatError::Credential` / `WechatError::Token` when no token can be obtained
    pub async fn request(&self, request: &ApiRequest) -> Result<Envelope, WechatError> {
        let token = self.token_manager.get_token().await?;
        let envelope = self.send(request, &token).await?;

        if self.auto_retry && envelope.is_credential_expired() {
            log::info!(
                "access token rejected by {} (errcode={}), fetching a new one and retrying",
                request.endpoint,
                envelope.errcode()
            );
            let token = self.token_manager.refresh(&token).await?;
            let envelope = self.send(request, &token).await?;
            return Ok(log_outcome(request, envelope));
        }

        Ok(log_outcome(request, envelope))
    }

    /// Like [`request`](Self::request), then applies `processor` to the
    /// final envelope.
    pub async fn request_with<T, F>(&self, request: &ApiRequest, processor: F) -> Result<T, WechatError>
    where
        F: FnOnce(Envelope) -> Result<T, WechatError>,
    {
        let envelope = self.request(request).await?;
        processor(envelope)
    }

    pub(crate) fn resolve_url(&self, endpoint: &str) -> String {
        if is_absolute(endpoint) || endpoint.starts_with('/') {
            return self.client.endpoint_url(endpoint);
        }
        format!("{}{}{}", self.client.base_url(), API_PREFIX, endpoint)
    }

    async fn send(&self, request: &ApiRequest, token: &str) -> Result<Envelope, WechatError> {
        let url = self.resolve_url(&request.endpoint);

        let mut query: Vec<(&str, &str)> = request
            .query
            .iter()
            .filter(|(k, _)| k != ACCESS_TOKEN)
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        query.push((ACCESS_TOKEN, token));

        let mut builder = self
            .client
            .http()
            .request(request.method.clone(), url)
            .query(&query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let value = self.client.execute_json(builder.build()?).await?;
        Ok(Envelope::new(value))
    }
}

fn log_outcome(request: &ApiRequest, envelope: Envelope) -> Envelope {
    if envelope.is_success() {
        log::debug!("{} {} succeeded", request.method, request.endpoint);
    } else if envelope.is_rate_limited() {
        log::warn!(
            "{} {} exceeded the API frequency limit: {}",
            request.method,
            request.endpoint,
            envelope.errmsg()
        );
    } else {
        log::error!(
            "{} {} failed: errcode={} errmsg={}",
            request.method,
            request.endpoint,
            envelope.errcode(),
            envelope.errmsg()
        );
    }
    envelope
}
