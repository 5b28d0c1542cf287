//! WeChat API trait and context
//!
//! Shared context for the message-channel API groups.

use std::sync::Arc;

use serde::Serialize;

use crate::client::WechatClient;
use crate::crypto::RsaSigner;
use crate::error::WechatError;
use crate::token::TokenManager;

/// Context holding shared resources for WeChat API implementations.
///
/// Contains references to the HTTP client and token manager that
/// API implementations need to make requests. Endpoint groups hold an
/// `Arc` of it; they never own the transport or the credential cache.
#[derive(Clone)]
pub struct WechatContext {
    /// The WeChat HTTP client for making API requests
    pub(crate) client: Arc<WechatClient>,
    /// The token manager for access token lifecycle
    pub(crate) token_manager: Arc<TokenManager>,
    /// Retry once with a new token when the provider rejects the current one
    pub(crate) auto_retry: bool,
    pub(crate) rsa_signer: Option<Arc<RsaSigner>>,
}

impl std::fmt::Debug for WechatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatContext")
            .field("client", &"WechatClient { .. }")
            .field("token_manager", &"TokenManager { .. }")
            .field("auto_retry", &self.auto_retry)
            .field("rsa_signer", &self.rsa_signer.is_some())
            .finish()
    }
}

impl WechatContext {
    /// Create a new WechatContext with auto retry enabled
    pub fn new(client: Arc<WechatClient>, token_manager: Arc<TokenManager>) -> Self {
        Self {
            client,
            token_manager,
            auto_retry: true,
            rsa_signer: None,
        }
    }

    pub fn with_auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    pub fn with_rsa_signer(mut self, signer: Arc<RsaSigner>) -> Self {
        self.rsa_signer = Some(signer);
        self
    }

    /// Get a reference to the WeChat HTTP client.
    pub fn client(&self) -> &WechatClient {
        &self.client
    }

    /// Get a reference to the token manager.
    pub fn token_manager(&self) -> &TokenManager {
        &self.token_manager
    }

    pub fn appid(&self) -> &str {
        self.client.appid()
    }

    /// Signs a JSON payload with the configured RSA private key.
    ///
    /// # Errors
    /// `WechatError::Config` when no private key was configured.
    pub fn sign_payload<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, WechatError> {
        let signer = self
            .rsa_signer
            .as_ref()
            .ok_or_else(|| WechatError::Config("no RSA private key configured".to_string()))?;
        signer.sign_json(payload)
    }
}
