//! Message API
//!
//! Customer service messages, template messages and one-time subscribe
//! messages for Official Accounts.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::api::r#trait::WechatContext;
use crate::client::ApiRequest;
use crate::error::WechatError;
use crate::types::Envelope;
use crate::utils::{encode_query, random_string};

const SUBSCRIBE_AUTHORIZE_URL: &str = "https://mp.weixin.qq.com/mp/subscribemsg";
const RESERVED_LEN: usize = 16;

/// One entry of a news message.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub url: String,
    pub picurl: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        picurl: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            url: url.into(),
            picurl: picurl.into(),
        }
    }
}

/// Content of an articles message.
#[derive(Debug, Clone)]
pub enum Articles {
    /// Inline news, at most 8 entries.
    News(Vec<Article>),
    /// A published material, by media id.
    MpNews(String),
}

/// Mini program page opened from a template message.
#[derive(Debug, Clone, Serialize)]
pub struct MiniProgram {
    pub appid: String,
    pub pagepath: String,
}

/// Template message payload.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateMessage {
    pub touser: String,
    pub template_id: String,
    /// `{"keyword1": {"value": "..", "color": ".."}, ..}`
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "miniprogram", skip_serializing_if = "Option::is_none")]
    pub mini_program: Option<MiniProgram>,
}

/// One-time subscribe message payload.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeTemplateMessage {
    pub touser: String,
    pub template_id: String,
    /// 0..=10000, echoed from the authorization page.
    pub scene: u32,
    pub title: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Message API
pub struct MessageApi {
    context: Arc<WechatContext>,
}

impl MessageApi {
    pub fn new(context: Arc<WechatContext>) -> Self {
        Self { context }
    }

    /// Sends a text customer service message.
    ///
    /// `kf_account` sends as a specific customer service account.
    pub async fn send_text(
        &self,
        openid: &str,
        content: &str,
        kf_account: Option<&str>,
    ) -> Result<Envelope, WechatError> {
        let body = json!({
            "touser": openid,
            "msgtype": "text",
            "text": { "content": content },
        });
        self.send_custom(body, kf_account).await
    }

    /// Sends news articles or a published mpnews material.
    pub async fn send_articles(
        &self,
        openid: &str,
        articles: &Articles,
        kf_account: Option<&str>,
    ) -> Result<Envelope, WechatError> {
        let body = match articles {
            Articles::News(items) => json!({
                "touser": openid,
                "msgtype": "news",
                "news": { "articles": items },
            }),
            Articles::MpNews(media_id) => json!({
                "touser": openid,
                "msgtype": "mpnews",
                "mpnews": { "media_id": media_id },
            }),
        };
        self.send_custom(body, kf_account).await
    }

    /// POST /cgi-bin/message/template/send
    pub async fn send_template(&self, message: &TemplateMessage) -> Result<Envelope, WechatError> {
        let request = ApiRequest::post("message/template/send").json(serde_json::to_value(message)?);
        self.context.request(&request).await
    }

    /// POST /cgi-bin/message/template/subscribe
    pub async fn send_subscribe_template(
        &self,
        message: &SubscribeTemplateMessage,
    ) -> Result<Envelope, WechatError> {
        let request =
            ApiRequest::post("message/template/subscribe").json(serde_json::to_value(message)?);
        self.context.request(&request).await
    }

    /// Builds the page where a user authorizes one subscribe message.
    ///
    /// `reserved` is echoed back to `redirect_url`; a random value is
    /// generated when `None`.
    pub fn subscribe_authorize_url(
        &self,
        scene: u32,
        template_id: &str,
        redirect_url: &str,
        reserved: Option<&str>,
    ) -> String {
        let reserved = reserved.map_or_else(|| random_string(RESERVED_LEN), str::to_string);
        let scene = scene.to_string();
        let query = encode_query(&[
            ("action", "get_confirm"),
            ("appid", self.context.appid()),
            ("scene", &scene),
            ("template_id", template_id),
            ("redirect_url", redirect_url),
            ("reserved", &reserved),
        ]);
        format!("{SUBSCRIBE_AUTHORIZE_URL}?{query}#wechat_redirect")
    }

    async fn send_custom(&self, mut body: Value, kf_account: Option<&str>) -> Result<Envelope, WechatError> {
        if let (Some(account), Some(map)) = (kf_account, body.as_object_mut()) {
            map.insert("customservice".to_string(), json!({ "kf_account": account }));
        }
        let request = ApiRequest::post("message/custom/send").json(body);
        self.context.request(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::WechatClient;
    use crate::token::TokenManager;
    use crate::types::{AppId, AppSecret};

    fn api() -> MessageApi {
        let client = WechatClient::builder()
            .appid(AppId::new("wx1234567890abcdef").unwrap())
            .secret(AppSecret::new("secret1234567890ab").unwrap())
            .build()
            .unwrap();
        let token_manager = Arc::new(TokenManager::new(client.clone()));
        MessageApi::new(Arc::new(WechatContext::new(Arc::new(client), token_manager)))
    }

    #[test]
    fn test_subscribe_authorize_url() {
        let url = api().subscribe_authorize_url(
            1000,
            "tpl-1",
            "https://example.com/cb?x=1",
            Some("state"),
        );
        assert_eq!(
            url,
            "https://mp.weixin.qq.com/mp/subscribemsg?action=get_confirm&appid=wx1234567890abcdef\
&scene=1000&template_id=tpl-1&redirect_url=https%3A%2F%2Fexample.com%2Fcb%3Fx%3D1\
&reserved=state#wechat_redirect"
        );
    }

    #[test]
    fn test_subscribe_authorize_url_generates_reserved() {
        let url = api().subscribe_authorize_url(1, "tpl", "https://example.com", None);
        let reserved = url
            .split("reserved=")
            .nth(1)
            .and_then(|rest| rest.strip_suffix("#wechat_redirect"))
            .unwrap();
        assert_eq!(reserved.len(), 16);
    }

    #[test]
    fn test_template_message_skips_absent_fields() {
        let message = TemplateMessage {
            touser: "o1".into(),
            template_id: "t1".into(),
            data: json!({"first": {"value": "hi"}}),
            url: None,
            mini_program: Some(MiniProgram {
                appid: "wxmini".into(),
                pagepath: "index".into(),
            }),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("url").is_none());
        assert_eq!(value["miniprogram"]["pagepath"], "index");
    }
}
