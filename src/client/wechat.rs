//! Unified WeChat SDK client

use std::sync::Arc;

use serde::Serialize;

use crate::api::{MessageApi, MiscApi, UserApi, WechatContext};
use crate::config::WechatConfig;
use crate::error::WechatError;
use crate::oauth::WechatOAuth;
use crate::pay::WechatPay;
use crate::types::{AccessToken, Envelope};

use super::builder::WechatBuilder;
use super::ApiRequest;

/// Unified WeChat client
///
/// This is the main entry point for the SDK. It shares one access token
/// cache across the message API groups and, when a merchant is configured,
/// exposes the payment channel.
///
/// # Example
///
/// ```rust,ignore
/// use wechat_sdk::Wechat;
/// use wechat_sdk::types::{AppId, AppSecret};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let wechat = Wechat::builder()
///         .appid(AppId::new("wx1234567890abcdef")?)
///         .secret(AppSecret::new("your_secret")?)
///         .build()?;
///
///     let result = wechat.message().send_text("openid", "hello", None).await?;
///     println!("errcode: {}", result.errcode());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Wechat {
    context: Arc<WechatContext>,
    pay: Option<Arc<WechatPay>>,
    oauth: WechatOAuth,
}

impl std::fmt::Debug for Wechat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wechat")
            .field("appid", &self.appid())
            .field("pay", &self.pay.is_some())
            .finish_non_exhaustive()
    }
}

impl Wechat {
    pub fn builder() -> WechatBuilder {
        WechatBuilder::default()
    }

    /// # Errors
    /// Any error [`WechatBuilder::from_config`] or
    /// [`WechatBuilder::build`] reports.
    pub fn from_config(config: &WechatConfig) -> Result<Self, WechatError> {
        WechatBuilder::from_config(config)?.build()
    }

    pub(crate) fn from_parts(
        context: Arc<WechatContext>,
        pay: Option<Arc<WechatPay>>,
        oauth: WechatOAuth,
    ) -> Self {
        Self {
            context,
            pay,
            oauth,
        }
    }

    pub fn appid(&self) -> &str {
        self.context.appid()
    }

    pub fn context(&self) -> &Arc<WechatContext> {
        &self.context
    }

    pub fn message(&self) -> MessageApi {
        MessageApi::new(Arc::clone(&self.context))
    }

    pub fn user(&self) -> UserApi {
        UserApi::new(Arc::clone(&self.context))
    }

    pub fn misc(&self) -> MiscApi {
        MiscApi::new(Arc::clone(&self.context))
    }

    /// The payment channel.
    ///
    /// # Errors
    /// `WechatError::Config` when no merchant was configured.
    pub fn pay(&self) -> Result<&WechatPay, WechatError> {
        self.pay
            .as_deref()
            .ok_or_else(|| WechatError::Config("payment is not configured (mch_id)".to_string()))
    }

    pub fn oauth(&self) -> &WechatOAuth {
        &self.oauth
    }

    /// Any `/cgi-bin/` call not covered by an API group.
    pub async fn request(&self, request: &ApiRequest) -> Result<Envelope, WechatError> {
        self.context.request(request).await
    }

    pub async fn get_access_token(&self) -> Result<String, WechatError> {
        self.context.token_manager.get_token().await
    }

    /// Installs a token obtained elsewhere, e.g. from a central token
    /// service. It is used until the provider rejects it.
    pub async fn set_access_token(&self, token: AccessToken) {
        self.context.token_manager.set_token(token).await;
    }

    pub async fn invalidate_token(&self) {
        self.context.token_manager.invalidate().await;
    }

    /// Signs a JSON payload with the configured RSA private key.
    pub fn sign_payload<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, WechatError> {
        self.context.sign_payload(payload)
    }
}

impl From<Arc<WechatContext>> for Wechat {
    fn from(context: Arc<WechatContext>) -> Self {
        let oauth = WechatOAuth::new(context.client().clone(), String::new());
        Self {
            context,
            pay: None,
            oauth,
        }
    }
}
