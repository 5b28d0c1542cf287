//! WeChat HTTP Client
//!
//! Provides the HTTP transport shared by the message, OAuth and payment
//! channels. Transport failures and non-2xx statuses are always surfaced
//! as [`WechatError::Http`].

use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

use crate::error::{HttpError, WechatError};
use crate::types::{AppId, AppSecret};

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.weixin.qq.com";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Cap on how much of an error body is kept in [`HttpError::Status`].
const MAX_ERROR_BODY: usize = 512;

type MiddlewareFuture =
    Pin<Box<dyn Future<Output = Result<reqwest::Response, reqwest::Error>> + Send>>;
pub(crate) type MiddlewareExecutor =
    Arc<dyn Fn(reqwest::Request) -> MiddlewareFuture + Send + Sync>;

/// WeChat API Client
///
/// Reusable HTTP client for calling WeChat APIs.
/// Built with reqwest for async HTTP requests.
#[derive(Clone)]
pub struct WechatClient {
    http: Client,
    appid: AppId,
    secret: AppSecret,
    base_url: String,
    middleware_executor: Option<MiddlewareExecutor>,
}

impl std::fmt::Debug for WechatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatClient")
            .field("appid", &self.appid)
            .field("base_url", &self.base_url)
            .field(
                "middleware_executor",
                &self.middleware_executor.as_ref().map(|_| ".."),
            )
            .finish_non_exhaustive()
    }
}

impl WechatClient {
    /// Create a new client builder
    pub fn builder() -> WechatClientBuilder {
        WechatClientBuilder::default()
    }

    /// Get the appid
    pub fn appid(&self) -> &str {
        self.appid.as_str()
    }

    /// Get the app secret
    pub(crate) fn secret(&self) -> &str {
        self.secret.as_str()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying [`reqwest::Client`] for raw HTTP requests.
    ///
    /// Note: requests made through this client bypass the middleware pipeline.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Resolves `path` against the base URL. Absolute URLs pass through.
    pub fn endpoint_url(&self, path: &str) -> String {
        if is_absolute(path) {
            return path.to_string();
        }
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn with_middleware_executor(mut self, executor: MiddlewareExecutor) -> Self {
        self.middleware_executor = Some(executor);
        self
    }

    pub(crate) async fn send_request(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, reqwest::Error> {
        if let Some(executor) = &self.middleware_executor {
            (executor)(request).await
        } else {
            self.http.execute(request).await
        }
    }

    /// Sends `request` and returns the raw body of a 2xx response.
    pub(crate) async fn execute_bytes(
        &self,
        request: reqwest::Request,
    ) -> Result<Vec<u8>, WechatError> {
        let url = request.url().path().to_string();
        let response = self.send_request(request).await.map_err(|e| {
            log::error!("request to {url} failed: {e}");
            WechatError::from(e)
        })?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            let text: String = text.chars().take(MAX_ERROR_BODY).collect();
            log::error!("request to {url} returned HTTP {status}");
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: text,
            }
            .into());
        }

        Ok(body.to_vec())
    }

    /// Sends `request` and decodes a 2xx JSON body. The envelope is not
    /// inspected.
    pub(crate) async fn execute_json(
        &self,
        request: reqwest::Request,
    ) -> Result<serde_json::Value, WechatError> {
        let body = self.execute_bytes(request).await?;
        // The provider occasionally emits invalid UTF-8 in free-text fields.
        let text = String::from_utf8_lossy(&body);
        serde_json::from_str(&text).map_err(|e| HttpError::Decode(e.to_string()).into())
    }
}

pub(crate) fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Service<reqwest::Request> for WechatClient {
    type Response = reqwest::Response;
    type Error = reqwest::Error;
    type Future = MiddlewareFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: reqwest::Request) -> Self::Future {
        let client = self.http.clone();
        Box::pin(async move { client.execute(req).await })
    }
}

/// Builder for WechatClient
///
/// # Example
///
/// ```rust
/// use wechat_sdk::client::WechatClient;
/// use wechat_sdk::types::{AppId, AppSecret};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let appid = AppId::new("wx1234567890abcdef")?;
///     let secret = AppSecret::new("abc1234567890abcdef")?;
///
///     let client = WechatClient::builder()
///         .appid(appid)
///         .secret(secret)
///         .build()?;
///
///     assert_eq!(client.appid(), "wx1234567890abcdef");
///     Ok(())
/// }
/// ```
#[derive(Debug, Default)]
pub struct WechatClientBuilder {
    appid: Option<AppId>,
    secret: Option<AppSecret>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http: Option<Client>,
}

impl WechatClientBuilder {
    /// Set the WeChat AppID
    pub fn appid(mut self, appid: AppId) -> Self {
        self.appid = Some(appid);
        self
    }

    /// Set the WeChat AppSecret
    pub fn secret(mut self, secret: AppSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Set the base URL for API calls
    ///
    /// Default: `<https://api.weixin.qq.com>`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the total timeout for requests
    ///
    /// Default: 30 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connection timeout
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Use a preconfigured [`reqwest::Client`], e.g. one carrying the
    /// merchant certificate for the payment `secapi/` endpoints.
    ///
    /// The timeouts set on this builder are ignored in that case.
    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Build the WechatClient
    ///
    /// # Errors
    /// Returns an error if appid or secret is not set, or the base URL is
    /// not http(s)
    pub fn build(self) -> Result<WechatClient, WechatError> {
        let appid = self
            .appid
            .ok_or_else(|| WechatError::Config("appid is required".to_string()))?;
        let secret = self
            .secret
            .ok_or_else(|| WechatError::Config("secret is required".to_string()))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        if !is_absolute(&base_url) {
            return Err(WechatError::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let connect_timeout = self
            .connect_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));

        let client = match self.http {
            Some(http) => http,
            None => Client::builder()
                .timeout(timeout)
                .connect_timeout(connect_timeout)
                .build()?,
        };

        Ok(WechatClient {
            http: client,
            appid,
            secret,
            base_url,
            middleware_executor: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(base_url: Option<&str>) -> Result<WechatClient, WechatError> {
        let appid = AppId::new("wx1234567890abcdef").unwrap();
        let secret = AppSecret::new("secret1234567890ab").unwrap();
        let mut builder = WechatClient::builder().appid(appid).secret(secret);
        if let Some(url) = base_url {
            builder = builder.base_url(url);
        }
        builder.build()
    }

    #[test]
    fn test_builder_default_values() {
        let client = build(None).unwrap();
        assert_eq!(client.appid(), "wx1234567890abcdef");
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_custom_base_url_trailing_slash() {
        let client = build(Some("https://custom.api.example.com/")).unwrap();
        assert_eq!(client.base_url(), "https://custom.api.example.com");
    }

    #[test]
    fn test_builder_rejects_non_http_base_url() {
        assert!(matches!(
            build(Some("ftp://example.com")),
            Err(WechatError::Config(_))
        ));
    }

    #[test]
    fn test_builder_custom_timeouts() {
        let appid = AppId::new("wx1234567890abcdef").unwrap();
        let secret = AppSecret::new("secret1234567890ab").unwrap();

        let client = WechatClient::builder()
            .appid(appid)
            .secret(secret)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_missing_appid() {
        let secret = AppSecret::new("secret1234567890ab").unwrap();
        assert!(WechatClient::builder().secret(secret).build().is_err());
    }

    #[test]
    fn test_builder_missing_secret() {
        let appid = AppId::new("wx1234567890abcdef").unwrap();
        assert!(WechatClient::builder().appid(appid).build().is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let client = build(None).unwrap();
        assert_eq!(
            client.endpoint_url("/cgi-bin/token"),
            "https://api.weixin.qq.com/cgi-bin/token"
        );
        assert_eq!(
            client.endpoint_url("https://mp.weixin.qq.com/mp/subscribemsg"),
            "https://mp.weixin.qq.com/mp/subscribemsg"
        );
    }
}
