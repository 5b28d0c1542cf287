use std::sync::Arc;

use crate::api::r#trait::WechatContext;
use crate::client::ApiRequest;
use crate::error::WechatError;
use crate::types::Envelope;

/// Languages `user/info` can localize country/province/city names into.
pub const USER_INFO_LANGS: [&str; 3] = ["zh_CN", "zh_TW", "en"];

/// User API for follower profiles and lists
pub struct UserApi {
    context: Arc<WechatContext>,
}

impl UserApi {
    /// Create a new UserApi instance
    pub fn new(context: Arc<WechatContext>) -> Self {
        Self { context }
    }

    /// Get a follower's basic profile, including unionid
    ///
    /// GET /cgi-bin/user/info
    ///
    /// # Errors
    /// `WechatError::Config` if `lang` is not one of [`USER_INFO_LANGS`];
    /// no request is made in that case.
    pub async fn get(&self, openid: &str, lang: &str) -> Result<Envelope, WechatError> {
        if !USER_INFO_LANGS.contains(&lang) {
            return Err(WechatError::Config(format!(
                "unsupported lang {lang:?}, expected one of {USER_INFO_LANGS:?}"
            )));
        }

        let request = ApiRequest::get("user/info")
            .query("openid", openid)
            .query("lang", lang);
        self.context.request(&request).await
    }

    /// List followers, 10000 per page
    ///
    /// GET /cgi-bin/user/get
    ///
    /// Pass the previous page's `next_openid` as `next_openid` to continue.
    pub async fn get_followers(&self, next_openid: Option<&str>) -> Result<Envelope, WechatError> {
        let mut request = ApiRequest::get("user/get");
        if let Some(openid) = next_openid.filter(|s| !s.is_empty()) {
            request = request.query("next_openid", openid);
        }
        self.context.request(&request).await
    }
}
