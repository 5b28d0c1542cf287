//! Web page authorization (OAuth 2.0) for Official Accounts and website
//! QR-code login.
//!
//! The OAuth access token is per user and unrelated to the application
//! access token managed by [`TokenManager`](crate::token::TokenManager).
//! Tokens are handed back to the caller; the client keeps no per-user state.

use serde::Deserialize;

use crate::client::WechatClient;
use crate::error::WechatError;
use crate::types::Envelope;
use crate::utils::encode_component;

pub const DEFAULT_CONNECT_BASE_URL: &str = "https://open.weixin.qq.com/connect/";

const ACCESS_TOKEN_PATH: &str = "/sns/oauth2/access_token";
const REFRESH_TOKEN_PATH: &str = "/sns/oauth2/refresh_token";
const USER_INFO_PATH: &str = "/sns/userinfo";
const CHECK_TOKEN_PATH: &str = "/sns/auth";

/// Scope requested on the authorization page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OAuthScope {
    /// Silent, yields only the openid.
    #[default]
    Base,
    /// Prompts the user, allows [`WechatOAuth::get_user_info`].
    UserInfo,
}

impl OAuthScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthScope::Base => "snsapi_base",
            OAuthScope::UserInfo => "snsapi_userinfo",
        }
    }
}

/// A user's OAuth credential.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: String,
    pub openid: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub unionid: Option<String>,
}

/// OAuth client.
#[derive(Debug, Clone)]
pub struct WechatOAuth {
    client: WechatClient,
    redirect_uri: String,
    connect_base_url: String,
}

impl WechatOAuth {
    pub fn new(client: WechatClient, redirect_uri: impl Into<String>) -> Self {
        Self {
            client,
            redirect_uri: redirect_uri.into(),
            connect_base_url: DEFAULT_CONNECT_BASE_URL.to_string(),
        }
    }

    /// Overrides `https://open.weixin.qq.com/connect/`.
    pub fn with_connect_base_url(mut self, url: impl Into<String>) -> Self {
        let mut url = url.into();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.connect_base_url = url;
        self
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The authorization page inside the WeChat client.
    ///
    /// `state` is omitted when empty.
    pub fn authorize_url(&self, scope: OAuthScope, state: &str) -> String {
        self.connect_url("oauth2/authorize", scope.as_str(), state)
    }

    /// The QR-code login page for websites.
    pub fn qrconnect_url(&self, state: &str) -> String {
        self.connect_url("qrconnect", "snsapi_login", state)
    }

    fn connect_url(&self, path: &str, scope: &str, state: &str) -> String {
        let mut url = format!(
            "{}{}?appid={}&redirect_uri={}&response_type=code&scope={}",
            self.connect_base_url,
            path,
            self.client.appid(),
            encode_component(&self.redirect_uri),
            scope
        );
        if !state.is_empty() {
            url.push_str("&state=");
            url.push_str(state);
        }
        url.push_str("#wechat_redirect");
        url
    }

    /// Exchanges the `code` from the redirect for a user token.
    ///
    /// # Errors
    /// `WechatError::Api` if the provider rejects the code.
    pub async fn fetch_access_token(&self, code: &str) -> Result<OAuthToken, WechatError> {
        let envelope = self
            .get(
                ACCESS_TOKEN_PATH,
                &[
                    ("appid", self.client.appid()),
                    ("secret", self.client.secret()),
                    ("code", code),
                    ("grant_type", "authorization_code"),
                ],
            )
            .await?;
        envelope.into_result()?.parse()
    }

    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthToken, WechatError> {
        let envelope = self
            .get(
                REFRESH_TOKEN_PATH,
                &[
                    ("appid", self.client.appid()),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                ],
            )
            .await?;
        envelope.into_result()?.parse()
    }

    /// Profile of the user behind `access_token`. Requires
    /// [`OAuthScope::UserInfo`].
    pub async fn get_user_info(
        &self,
        openid: &str,
        access_token: &str,
        lang: &str,
    ) -> Result<Envelope, WechatError> {
        self.get(
            USER_INFO_PATH,
            &[
                ("access_token", access_token),
                ("openid", openid),
                ("lang", lang),
            ],
        )
        .await
    }

    /// Whether `access_token` is still valid for `openid`.
    pub async fn check_access_token(&self, openid: &str, access_token: &str) -> Result<bool, WechatError> {
        let envelope = self
            .get(
                CHECK_TOKEN_PATH,
                &[("access_token", access_token), ("openid", openid)],
            )
            .await?;
        Ok(envelope.is_success())
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Envelope, WechatError> {
        let url = self.client.endpoint_url(path);
        let request = self.client.http().get(url).query(query).build()?;
        let envelope = Envelope::new(self.client.execute_json(request).await?);

        if !envelope.is_success() {
            log::error!(
                "oauth request {path} failed: errcode={} errmsg={}",
                envelope.errcode(),
                envelope.errmsg()
            );
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AppId, AppSecret};

    fn oauth(redirect_uri: &str) -> WechatOAuth {
        let client = WechatClient::builder()
            .appid(AppId::new("wx1234567890abcdef").unwrap())
            .secret(AppSecret::new("secret1234567890ab").unwrap())
            .build()
            .unwrap();
        WechatOAuth::new(client, redirect_uri)
    }

    #[test]
    fn test_authorize_url() {
        let url = oauth("https://example.com/auth?next=/home").authorize_url(OAuthScope::UserInfo, "xyz");
        assert_eq!(
            url,
            "https://open.weixin.qq.com/connect/oauth2/authorize?appid=wx1234567890abcdef\
&redirect_uri=https%3A%2F%2Fexample.com%2Fauth%3Fnext%3D%2Fhome\
&response_type=code&scope=snsapi_userinfo&state=xyz#wechat_redirect"
        );
    }

    #[test]
    fn test_authorize_url_without_state() {
        let url = oauth("https://example.com/cb").authorize_url(OAuthScope::Base, "");
        assert!(!url.contains("state="));
        assert!(url.contains("scope=snsapi_base"));
        assert!(url.ends_with("#wechat_redirect"));
    }

    #[test]
    fn test_qrconnect_url() {
        let url = oauth("https://example.com/cb").qrconnect_url("s1");
        assert!(url.starts_with("https://open.weixin.qq.com/connect/qrconnect?appid=wx1234567890abcdef"));
        assert!(url.contains("&scope=snsapi_login&state=s1#wechat_redirect"));
    }

    #[test]
    fn test_connect_base_url_override() {
        let url = oauth("https://example.com/cb")
            .with_connect_base_url("https://open.example.com/connect")
            .qrconnect_url("");
        assert!(url.starts_with("https://open.example.com/connect/qrconnect?"));
    }
}
