//! WeChat Pay (merchant API v2)
//!
//! Every request is a flat parameter set, signed with the merchant API key
//! and sent as XML. Responses come back in the same XML dialect and are
//! judged by `return_code` plus `result_code`.
//!
//! In sandbox mode requests go to `sandboxnew/` and are signed with a
//! sandbox key fetched once through `sandboxnew/pay/getsignkey`.

mod jsapi;
mod notify;
mod order;
mod redpack;
mod refund;
mod tools;

use std::path::Path;

use reqwest::header::CONTENT_TYPE;
use tokio::sync::Mutex;

use crate::client::WechatClient;
use crate::crypto::{calculate_signature, SIGN_FIELD};
use crate::error::{HttpError, WechatError};
use crate::types::{MchId, Params, PayResponse};
use crate::utils::random_string;
use crate::xml;

pub use jsapi::JsapiApi;
pub use notify::{notification_reply, PaymentNotification, NOTIFICATION_AMOUNT_FIELDS};
pub use order::{CreateOrder, OrderApi, OrderRef, TradeType};
pub use redpack::{GroupRedpack, Redpack, RedpackApi};
pub use refund::{RefundApi, RefundApply, RefundRef};
pub use tools::{BillType, ToolsApi};

pub const DEFAULT_PAY_BASE_URL: &str = "https://api.mch.weixin.qq.com/";

const SANDBOX_PREFIX: &str = "sandboxnew/";
const SANDBOX_SIGNKEY_PATH: &str = "sandboxnew/pay/getsignkey";
const NONCE_LEN: usize = 32;

/// Merchant settings for [`WechatPay`].
#[derive(Clone)]
pub struct PayConfig {
    mch_id: MchId,
    api_key: String,
    sub_mch_id: Option<String>,
    sandbox: bool,
    base_url: String,
}

impl std::fmt::Debug for PayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayConfig")
            .field("mch_id", &self.mch_id)
            .field("api_key", &"[REDACTED]")
            .field("sub_mch_id", &self.sub_mch_id)
            .field("sandbox", &self.sandbox)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl PayConfig {
    /// # Errors
    /// `WechatError::Config` if `api_key` is empty.
    pub fn new(mch_id: MchId, api_key: impl Into<String>) -> Result<Self, WechatError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(WechatError::Config("merchant API key is empty".to_string()));
        }
        Ok(Self {
            mch_id,
            api_key,
            sub_mch_id: None,
            sandbox: false,
            base_url: DEFAULT_PAY_BASE_URL.to_string(),
        })
    }

    /// Reads the API key from `path`. Trailing newlines are stripped.
    ///
    /// # Errors
    /// `WechatError::Config` if the file cannot be read or holds no key.
    pub fn from_key_file(mch_id: MchId, path: impl AsRef<Path>) -> Result<Self, WechatError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WechatError::Config(format!(
                "failed to read merchant API key {}: {e}",
                path.display()
            ))
        })?;
        Self::new(mch_id, content.trim_end_matches(|c: char| c == '\n' || c == '\r'))
    }

    pub fn sub_mch_id(mut self, sub_mch_id: impl Into<String>) -> Self {
        self.sub_mch_id = Some(sub_mch_id.into());
        self
    }

    /// Route requests to the sandbox and sign them with the sandbox key.
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Default: `https://api.mch.weixin.qq.com/`
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Client for the payment channel.
pub struct WechatPay {
    client: WechatClient,
    mch_id: MchId,
    api_key: String,
    sub_mch_id: Option<String>,
    sandbox: bool,
    base_url: String,
    sandbox_key: Mutex<Option<String>>,
}

impl std::fmt::Debug for WechatPay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatPay")
            .field("appid", &self.client.appid())
            .field("mch_id", &self.mch_id)
            .field("sub_mch_id", &self.sub_mch_id)
            .field("sandbox", &self.sandbox)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl WechatPay {
    /// `client` supplies the transport (and any middleware) and the appid.
    ///
    /// # Errors
    /// `WechatError::Config` if the base URL is not http(s).
    pub fn new(client: WechatClient, config: PayConfig) -> Result<Self, WechatError> {
        let mut base_url = config.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(WechatError::Config(format!(
                "pay base_url must start with http:// or https://, got: {base_url}"
            )));
        }
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            mch_id: config.mch_id,
            api_key: config.api_key,
            sub_mch_id: config.sub_mch_id,
            sandbox: config.sandbox,
            base_url,
            sandbox_key: Mutex::new(None),
        })
    }

    pub fn appid(&self) -> &str {
        self.client.appid()
    }

    pub fn mch_id(&self) -> &str {
        self.mch_id.as_str()
    }

    pub fn sub_mch_id(&self) -> Option<&str> {
        self.sub_mch_id.as_deref()
    }

    pub fn is_sandbox(&self) -> bool {
        self.sandbox
    }

    pub fn order(&self) -> OrderApi<'_> {
        OrderApi::new(self)
    }

    pub fn refund(&self) -> RefundApi<'_> {
        RefundApi::new(self)
    }

    pub fn redpack(&self) -> RedpackApi<'_> {
        RedpackApi::new(self)
    }

    pub fn tools(&self) -> ToolsApi<'_> {
        ToolsApi::new(self)
    }

    pub fn jsapi(&self) -> JsapiApi<'_> {
        JsapiApi::new(self)
    }

    /// Signs and sends `params` to `endpoint`.
    ///
    /// A failed envelope is returned as data unless the responding appid
    /// differs from ours, which is a hard error.
    ///
    /// # Errors
    /// - `WechatError::Http` for transport failures, non-2xx statuses and
    ///   responses without `return_code`
    /// - `WechatError::Pay` for failures reported for another appid
    pub async fn request(&self, endpoint: &str, params: Params) -> Result<PayResponse, WechatError> {
        let body = self.request_raw(endpoint, params).await?;
        self.handle_response(&body)
    }

    /// Like [`request`](Self::request) but returns the body undecoded.
    pub async fn request_raw(&self, endpoint: &str, params: Params) -> Result<Vec<u8>, WechatError> {
        let key = self.signing_key().await?;
        let params = self.prepare(params, &key);
        let url = self.resolve_url(endpoint);
        log::debug!("pay request to {endpoint}");
        self.post_xml(url, xml::encode(&params)).await
    }

    /// The key requests are signed with: the sandbox key in sandbox mode,
    /// the merchant API key otherwise.
    pub async fn signing_key(&self) -> Result<String, WechatError> {
        if !self.sandbox {
            return Ok(self.api_key.clone());
        }

        let mut cached = self.sandbox_key.lock().await;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }
        let key = self.fetch_sandbox_key().await?;
        *cached = Some(key.clone());
        Ok(key)
    }

    pub(crate) fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let endpoint = endpoint.trim_start_matches('/');
        if self.sandbox {
            format!("{}{}{}", self.base_url, SANDBOX_PREFIX, endpoint)
        } else {
            format!("{}{}", self.base_url, endpoint)
        }
    }

    /// Fills merchant identity and nonce without overwriting caller values,
    /// then signs.
    fn prepare(&self, mut params: Params, key: &str) -> Params {
        if !params.contains_key("mchid") {
            params.set_if_absent("mch_id", self.mch_id.as_str());
        }
        if let Some(sub_mch_id) = &self.sub_mch_id {
            params.set_if_absent("sub_mch_id", sub_mch_id.as_str());
        }
        params.set_if_absent("nonce_str", nonce_str());
        params.remove(SIGN_FIELD);

        let sign = calculate_signature(&params, key);
        params.insert(SIGN_FIELD, sign);
        params
    }

    fn handle_response(&self, body: &[u8]) -> Result<PayResponse, WechatError> {
        let response = PayResponse::new(xml::decode(body));

        let Some(return_code) = response.return_code() else {
            return Err(HttpError::Decode("pay response has no return_code".to_string()).into());
        };
        log::info!("pay response: return_code is {return_code}");

        // Business failures (result_code FAIL) come back as data.
        if response.return_code() != Some("SUCCESS")
            && response.result_code() != Some("SUCCESS")
            && response.appid() != Some(self.appid())
        {
            let error = response.to_error();
            log::error!("pay request failed: {error}");
            return Err(error);
        }

        Ok(response)
    }

    async fn fetch_sandbox_key(&self) -> Result<String, WechatError> {
        log::info!("fetching sandbox sign key for merchant {}", self.mch_id.as_str());

        let mut params = Params::new()
            .with("mch_id", self.mch_id.as_str())
            .with("nonce_str", nonce_str());
        let sign = calculate_signature(&params, &self.api_key);
        params.insert(SIGN_FIELD, sign);

        let url = format!("{}{}", self.base_url, SANDBOX_SIGNKEY_PATH);
        let body = self.post_xml(url, xml::encode(&params)).await?;
        let response = PayResponse::new(xml::decode(&body));

        match response.get("sandbox_signkey") {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => {
                let error = response.to_error();
                log::error!("failed to fetch sandbox sign key: {error}");
                Err(error)
            }
        }
    }

    async fn post_xml(&self, url: String, body: String) -> Result<Vec<u8>, WechatError> {
        let request = self
            .client
            .http()
            .post(url)
            .header(CONTENT_TYPE, "text/xml")
            .body(body)
            .build()?;
        self.client.execute_bytes(request).await
    }
}

/// 32 random alphanumerics.
pub(crate) fn nonce_str() -> String {
    random_string(NONCE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AppId, AppSecret};

    fn pay(config: PayConfig) -> WechatPay {
        let client = WechatClient::builder()
            .appid(AppId::new("wx1234567890abcdef").unwrap())
            .secret(AppSecret::new("secret1234567890ab").unwrap())
            .build()
            .unwrap();
        WechatPay::new(client, config).unwrap()
    }

    fn config() -> PayConfig {
        PayConfig::new(MchId::new("10000100").unwrap(), "apikey").unwrap()
    }

    #[test]
    fn test_nonce_str() {
        let nonce = nonce_str();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(nonce, nonce_str());
    }

    #[test]
    fn test_resolve_url() {
        let pay = pay(config());
        assert_eq!(
            pay.resolve_url("pay/unifiedorder"),
            "https://api.mch.weixin.qq.com/pay/unifiedorder"
        );
        assert_eq!(
            pay.resolve_url("https://fraud.mch.weixin.qq.com/risk/getpublickey"),
            "https://fraud.mch.weixin.qq.com/risk/getpublickey"
        );
    }

    #[test]
    fn test_resolve_url_sandbox() {
        let pay = pay(config().sandbox(true));
        assert_eq!(
            pay.resolve_url("pay/orderquery"),
            "https://api.mch.weixin.qq.com/sandboxnew/pay/orderquery"
        );
    }

    #[test]
    fn test_prepare_sets_identity_if_absent() {
        let pay = pay(config().sub_mch_id("1900000109"));
        let params = Params::new()
            .with("nonce_str", "fixed")
            .with("mch_id", "custom")
            .with(SIGN_FIELD, "stale");

        let prepared = pay.prepare(params, "apikey");

        assert_eq!(prepared.get("mch_id").unwrap().to_string(), "custom");
        assert_eq!(prepared.get("sub_mch_id").unwrap().to_string(), "1900000109");
        assert_eq!(prepared.get("nonce_str").unwrap().to_string(), "fixed");

        let mut unsigned = prepared.clone();
        unsigned.remove(SIGN_FIELD);
        assert_eq!(
            prepared.get(SIGN_FIELD).unwrap().to_string(),
            calculate_signature(&unsigned, "apikey")
        );
    }

    #[test]
    fn test_prepare_skips_mch_id_when_mchid_present() {
        let pay = pay(config());
        let prepared = pay.prepare(Params::new().with("mchid", "10000100"), "apikey");

        assert!(!prepared.contains_key("mch_id"));
        assert!(prepared.contains_key("nonce_str"));
    }

    #[test]
    fn test_handle_response_missing_return_code() {
        let pay = pay(config());
        let result = pay.handle_response(b"not xml");
        assert!(matches!(
            result,
            Err(WechatError::Http(HttpError::Decode(_)))
        ));
    }

    #[test]
    fn test_handle_response_failure_for_own_appid_is_data() {
        let pay = pay(config());
        let body = b"<xml><return_code>SUCCESS</return_code><result_code>FAIL</result_code>\
<appid>wx1234567890abcdef</appid><err_code>ORDERPAID</err_code></xml>";

        let response = pay.handle_response(body).unwrap();
        assert!(!response.is_success());
        assert_eq!(response.err_code(), Some("ORDERPAID"));
    }

    #[test]
    fn test_handle_response_redpack_business_failure_is_data() {
        let pay = pay(config());
        let body = b"<xml><return_code>SUCCESS</return_code><result_code>FAIL</result_code>\
<err_code>NOTENOUGH</err_code><err_code_des>balance</err_code_des>\
<wxappid>wx1234567890abcdef</wxappid></xml>";

        let response = pay.handle_response(body).unwrap();
        assert_eq!(response.appid(), Some("wx1234567890abcdef"));
        assert_eq!(response.err_code(), Some("NOTENOUGH"));
    }

    #[test]
    fn test_handle_response_result_failure_without_appid_is_data() {
        let pay = pay(config());
        let body = b"<xml><return_code>SUCCESS</return_code><result_code>FAIL</result_code>\
<err_code>SYSTEMERROR</err_code></xml>";

        let response = pay.handle_response(body).unwrap();
        assert_eq!(response.err_code(), Some("SYSTEMERROR"));
    }

    #[test]
    fn test_handle_response_failure_for_other_appid_is_error() {
        let pay = pay(config());
        let body = b"<xml><return_code>FAIL</return_code><return_msg>appid mismatch</return_msg></xml>";

        match pay.handle_response(body) {
            Err(WechatError::Pay { code, message }) => {
                assert_eq!(code, "FAIL");
                assert_eq!(message, "appid mismatch");
            }
            other => panic!("expected Pay error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_rejects_empty_key() {
        let result = PayConfig::new(MchId::new("10000100").unwrap(), "");
        assert!(matches!(result, Err(WechatError::Config(_))));
    }

    #[test]
    fn test_config_from_key_file_strips_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apikey");
        std::fs::write(&path, "192006250b4c09247ec02edce69f6a2d\n").unwrap();

        let config = PayConfig::from_key_file(MchId::new("10000100").unwrap(), &path).unwrap();
        assert_eq!(config.api_key, "192006250b4c09247ec02edce69f6a2d");
    }

    #[test]
    fn test_config_from_missing_key_file() {
        let result = PayConfig::from_key_file(MchId::new("10000100").unwrap(), "/nonexistent/key");
        assert!(matches!(result, Err(WechatError::Config(_))));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let client = WechatClient::builder()
            .appid(AppId::new("wx1234567890abcdef").unwrap())
            .secret(AppSecret::new("secret1234567890ab").unwrap())
            .build()
            .unwrap();
        let result = WechatPay::new(client, config().base_url("ftp://example.com"));
        assert!(matches!(result, Err(WechatError::Config(_))));
    }
}
