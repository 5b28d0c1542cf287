//! Deserializable client configuration.
//!
//! The SDK never reads configuration on its own; load a [`WechatConfig`]
//! from wherever the application keeps settings and hand it to
//! [`Wechat::from_config`](crate::Wechat::from_config).

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Clone, Default, Deserialize)]
pub struct WechatConfig {
    pub app_id: String,
    pub secret: String,
    #[serde(default)]
    pub mch_id: Option<String>,
    #[serde(default)]
    pub sub_mch_id: Option<String>,
    /// File holding the merchant API key.
    #[serde(default)]
    pub api_key_path: Option<PathBuf>,
    /// PEM private key used for RSA payload signing.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    /// Routes payment calls to the sandbox.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for WechatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatConfig")
            .field("app_id", &self.app_id)
            .field("secret", &"[REDACTED]")
            .field("mch_id", &self.mch_id)
            .field("sub_mch_id", &self.sub_mch_id)
            .field("api_key_path", &self.api_key_path)
            .field("private_key_path", &self.private_key_path)
            .field("redirect_uri", &self.redirect_uri)
            .field("debug", &self.debug)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
