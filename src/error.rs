use std::sync::Arc;

use thiserror::Error;

/// Provider error codes the SDK reacts to.
pub mod codes {
    pub const SUCCESS: i64 = 0;
    pub const SYSTEM_BUSY: i64 = -1;
    pub const INVALID_CREDENTIAL: i64 = 40001;
    pub const INVALID_ACCESS_TOKEN: i64 = 40014;
    pub const EXPIRED_ACCESS_TOKEN: i64 = 42001;
    pub const OUT_OF_API_FREQ_LIMIT: i64 = 45009;

    /// Codes meaning the access token must be re-fetched.
    pub const CREDENTIAL_EXPIRED: [i64; 3] =
        [INVALID_CREDENTIAL, INVALID_ACCESS_TOKEN, EXPIRED_ACCESS_TOKEN];

    pub fn is_credential_expired(code: i64) -> bool {
        CREDENTIAL_EXPIRED.contains(&code)
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Reqwest(Arc<reqwest::Error>),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// WeChat SDK error types
#[derive(Debug, Error)]
pub enum WechatError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WeChat API error (code={code}): {message}")]
    Api { code: i64, message: String },

    #[error("failed to obtain access token (code={code}): {message}")]
    Credential { code: i64, message: String },

    #[error("Access token error: {0}")]
    Token(String),

    #[error("WeChat Pay error ({code}): {message}")]
    Pay { code: String, message: String },

    #[error("Invalid payment notification: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("Invalid AppId: {0}")]
    InvalidAppId(String),

    #[error("Invalid AppSecret: {0}")]
    InvalidAppSecret(String),

    #[error("Invalid merchant id: {0}")]
    InvalidMchId(String),
}

impl From<reqwest::Error> for WechatError {
    fn from(error: reqwest::Error) -> Self {
        WechatError::Http(HttpError::Reqwest(Arc::new(error)))
    }
}

impl WechatError {
    /// Returns `Err(WechatError::Api)` when `errcode` is non-zero.
    pub fn check_api(errcode: i64, errmsg: &str) -> Result<(), WechatError> {
        if errcode != codes::SUCCESS {
            return Err(WechatError::Api {
                code: errcode,
                message: errmsg.to_string(),
            });
        }
        Ok(())
    }

    /// Whether retrying the same call later could succeed.
    ///
    /// Connection failures, timeouts, 5xx statuses and the provider's
    /// "system busy" code count as transient. Rate limiting does not: the
    /// SDK hands it back without backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            WechatError::Http(HttpError::Reqwest(e)) => e.is_timeout() || e.is_connect(),
            WechatError::Http(HttpError::Status { status, .. }) => *status >= 500,
            WechatError::Api { code, .. } => *code == codes::SYSTEM_BUSY,
            _ => false,
        }
    }
}
