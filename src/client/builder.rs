use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Request as ReqwestRequest, Response as ReqwestResponse};
use tower::{Layer, Service};

use crate::api::WechatContext;
use crate::config::WechatConfig;
use crate::crypto::RsaSigner;
use crate::error::WechatError;
use crate::notify::Notifier;
use crate::oauth::WechatOAuth;
use crate::pay::{PayConfig, WechatPay};
use crate::token::TokenManager;
use crate::types::{AppId, AppSecret, MchId};

use super::wechat_client::{
    MiddlewareExecutor, WechatClient, DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_TIMEOUT_SECS,
};
use super::Wechat;

#[derive(Clone)]
enum ApiKeySource {
    Inline(String),
    File(PathBuf),
}

/// Builder for [`Wechat`].
///
/// Key material is read in [`build`](Self::build); unreadable or invalid
/// keys fail there, never on first use.
#[must_use]
#[derive(Default)]
pub struct WechatBuilder<M = ()> {
    appid: Option<AppId>,
    secret: Option<AppSecret>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    middleware: Option<M>,
    auto_retry: Option<bool>,
    notifier: Option<Arc<dyn Notifier>>,
    mch_id: Option<MchId>,
    sub_mch_id: Option<String>,
    api_key: Option<ApiKeySource>,
    sandbox: bool,
    pay_base_url: Option<String>,
    pay_http_client: Option<reqwest::Client>,
    private_key_path: Option<PathBuf>,
    redirect_uri: Option<String>,
}

impl<M> std::fmt::Debug for WechatBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatBuilder")
            .field("appid", &self.appid)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("middleware", &self.middleware.as_ref().map(|_| ".."))
            .field("auto_retry", &self.auto_retry)
            .field("mch_id", &self.mch_id)
            .field("sub_mch_id", &self.sub_mch_id)
            .field("sandbox", &self.sandbox)
            .field("pay_base_url", &self.pay_base_url)
            .field("private_key_path", &self.private_key_path)
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

impl WechatBuilder {
    /// Seeds a builder from externally loaded configuration.
    ///
    /// # Errors
    /// `WechatError::InvalidAppId`, `InvalidAppSecret` or `InvalidMchId`
    /// for malformed identifiers.
    pub fn from_config(config: &WechatConfig) -> Result<Self, WechatError> {
        let mut builder = Self::default()
            .appid(AppId::new(config.app_id.as_str()).map_err(WechatError::InvalidAppId)?)
            .secret(AppSecret::new(config.secret.as_str()).map_err(WechatError::InvalidAppSecret)?)
            .sandbox(config.debug);

        if let Some(mch_id) = &config.mch_id {
            builder = builder.mch_id(MchId::new(mch_id.as_str()).map_err(WechatError::InvalidMchId)?);
        }
        if let Some(sub_mch_id) = &config.sub_mch_id {
            builder = builder.sub_mch_id(sub_mch_id.as_str());
        }
        if let Some(path) = &config.api_key_path {
            builder = builder.api_key_path(path);
        }
        if let Some(path) = &config.private_key_path {
            builder = builder.private_key_path(path);
        }
        if let Some(uri) = &config.redirect_uri {
            builder = builder.redirect_uri(uri.as_str());
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder)
    }
}

impl<M> WechatBuilder<M> {
    pub fn appid(mut self, appid: AppId) -> Self {
        self.appid = Some(appid);
        self
    }

    pub fn secret(mut self, secret: AppSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    /// Message channel base URL. Default: `https://api.weixin.qq.com`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Retry once with a new token when the provider rejects the current
    /// one. Default: enabled.
    pub fn auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = Some(auto_retry);
        self
    }

    /// Alerted when an access token cannot be obtained. Default:
    /// [`LogNotifier`](crate::notify::LogNotifier).
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Enables the payment channel.
    pub fn mch_id(mut self, mch_id: MchId) -> Self {
        self.mch_id = Some(mch_id);
        self
    }

    pub fn sub_mch_id(mut self, sub_mch_id: impl Into<String>) -> Self {
        self.sub_mch_id = Some(sub_mch_id.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKeySource::Inline(api_key.into()));
        self
    }

    /// File holding the merchant API key.
    pub fn api_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.api_key = Some(ApiKeySource::File(path.into()));
        self
    }

    /// Use the payment sandbox.
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Default: `https://api.mch.weixin.qq.com/`
    pub fn pay_base_url(mut self, url: impl Into<String>) -> Self {
        self.pay_base_url = Some(url.into());
        self
    }

    /// HTTP client for the payment channel, e.g. one carrying the merchant
    /// certificate required by refunds and red packets.
    pub fn pay_http_client(mut self, client: reqwest::Client) -> Self {
        self.pay_http_client = Some(client);
        self
    }

    /// PEM private key for [`Wechat::sign_payload`].
    pub fn private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    /// OAuth redirect URI.
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_middleware<M2>(self, middleware: M2) -> WechatBuilder<M2>
    where
        M2: Layer<WechatClient> + Clone + Send + Sync + 'static,
    {
        WechatBuilder {
            appid: self.appid,
            secret: self.secret,
            base_url: self.base_url,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            middleware: Some(middleware),
            auto_retry: self.auto_retry,
            notifier: self.notifier,
            mch_id: self.mch_id,
            sub_mch_id: self.sub_mch_id,
            api_key: self.api_key,
            sandbox: self.sandbox,
            pay_base_url: self.pay_base_url,
            pay_http_client: self.pay_http_client,
            private_key_path: self.private_key_path,
            redirect_uri: self.redirect_uri,
        }
    }

    /// # Errors
    /// `WechatError::Config` for missing credentials, non-http(s) base URLs
    /// and unreadable or invalid key material.
    pub fn build(self) -> Result<Wechat, WechatError>
    where
        M: Layer<WechatClient> + Clone + Send + Sync + 'static,
        M::Service: Service<ReqwestRequest, Response = ReqwestResponse, Error = reqwest::Error>
            + Clone
            + Send
            + Sync
            + 'static,
        <M::Service as Service<ReqwestRequest>>::Future: Send + 'static,
    {
        let appid = self
            .appid
            .ok_or_else(|| WechatError::Config("appid is required".to_string()))?;
        let secret = self
            .secret
            .ok_or_else(|| WechatError::Config("secret is required".to_string()))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = self
            .timeout
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        let connect_timeout = self
            .connect_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));

        let transport = |http: Option<reqwest::Client>| -> Result<WechatClient, WechatError> {
            let mut builder = WechatClient::builder()
                .appid(appid.clone())
                .secret(secret.clone())
                .base_url(base_url.clone())
                .timeout(timeout)
                .connect_timeout(connect_timeout);
            if let Some(http) = http {
                builder = builder.http_client(http);
            }
            let client = builder.build()?;

            Ok(match &self.middleware {
                Some(middleware) => {
                    let service = middleware.layer(client.clone());
                    client.with_middleware_executor(make_middleware_executor(service))
                }
                None => client,
            })
        };

        let client = transport(None)?;

        let pay = match (self.mch_id, self.api_key) {
            (Some(mch_id), Some(api_key)) => {
                let mut config = match api_key {
                    ApiKeySource::Inline(key) => PayConfig::new(mch_id, key)?,
                    ApiKeySource::File(path) => PayConfig::from_key_file(mch_id, path)?,
                }
                .sandbox(self.sandbox);
                if let Some(sub_mch_id) = self.sub_mch_id {
                    config = config.sub_mch_id(sub_mch_id);
                }
                if let Some(url) = self.pay_base_url {
                    config = config.base_url(url);
                }
                let pay_client = match self.pay_http_client {
                    Some(http) => transport(Some(http))?,
                    None => client.clone(),
                };
                Some(Arc::new(WechatPay::new(pay_client, config)?))
            }
            (Some(_), None) => {
                return Err(WechatError::Config(
                    "api_key or api_key_path is required with mch_id".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(WechatError::Config(
                    "mch_id is required with an api key".to_string(),
                ))
            }
            (None, None) => None,
        };

        let rsa_signer = self
            .private_key_path
            .map(RsaSigner::from_pem_file)
            .transpose()?
            .map(Arc::new);

        let oauth = WechatOAuth::new(client.clone(), self.redirect_uri.unwrap_or_default());

        let client_arc = Arc::new(client);
        let mut token_manager = TokenManager::new(WechatClient::clone(&client_arc));
        if let Some(notifier) = self.notifier {
            token_manager = token_manager.with_notifier(notifier);
        }

        let mut context = WechatContext::new(client_arc, Arc::new(token_manager))
            .with_auto_retry(self.auto_retry.unwrap_or(true));
        if let Some(signer) = rsa_signer {
            context = context.with_rsa_signer(signer);
        }

        log::info!(
            "wechat client ready for appid {} (payment: {}, sandbox: {})",
            context.appid(),
            pay.is_some(),
            self.sandbox
        );

        Ok(Wechat::from_parts(Arc::new(context), pay, oauth))
    }
}

fn make_middleware_executor<S>(service: S) -> MiddlewareExecutor
where
    S: Service<ReqwestRequest, Response = ReqwestResponse, Error = reqwest::Error>
        + Clone
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
{
    let service = Arc::new(service);

    Arc::new(move |request: ReqwestRequest| {
        let mut service = (*service).clone();
        Box::pin(async move { service.call(request).await })
            as Pin<Box<dyn Future<Output = Result<ReqwestResponse, reqwest::Error>> + Send>>
    })
}
