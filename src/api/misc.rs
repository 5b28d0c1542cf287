//! Miscellaneous Official Account utilities.

use std::sync::Arc;

use serde_json::json;

use crate::api::r#trait::WechatContext;
use crate::client::ApiRequest;
use crate::error::{HttpError, WechatError};
use crate::types::Envelope;

pub struct MiscApi {
    context: Arc<WechatContext>,
}

impl MiscApi {
    pub fn new(context: Arc<WechatContext>) -> Self {
        Self { context }
    }

    /// Converts a long URL into a `w.url.cn` short link.
    ///
    /// POST /cgi-bin/shorturl
    pub async fn short_url(&self, long_url: &str) -> Result<Envelope, WechatError> {
        let request = ApiRequest::post("shorturl").json(json!({
            "action": "long2short",
            "long_url": long_url,
        }));
        self.context.request(&request).await
    }

    /// IP addresses WeChat servers call back from.
    ///
    /// GET /cgi-bin/getcallbackip
    ///
    /// # Errors
    /// `WechatError::Api` if the provider reports a failure,
    /// `WechatError::Http` if the response has no `ip_list`.
    pub async fn get_wechat_ips(&self) -> Result<Vec<String>, WechatError> {
        let request = ApiRequest::get("getcallbackip");
        self.context.request_with(&request, extract_ip_list).await
    }
}

fn extract_ip_list(envelope: Envelope) -> Result<Vec<String>, WechatError> {
    let envelope = envelope.into_result()?;
    let ips = envelope
        .get("ip_list")
        .cloned()
        .ok_or_else(|| HttpError::Decode("response has no ip_list".to_string()))?;
    serde_json::from_value(ips).map_err(|e| HttpError::Decode(e.to_string()).into())
}
