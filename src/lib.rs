//! WeChat SDK for Rust
//!
//! Server-side client for the two WeChat channels an Official Account
//! backend talks to:
//!
//! | Channel | Wire format | Authentication |
//! |---------|-------------|----------------|
//! | Messaging (`api.weixin.qq.com`) | JSON | cached access token |
//! | Payment (`api.mch.weixin.qq.com`) | XML | MD5 parameter signature |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wechat_sdk::{Wechat, types::{AppId, AppSecret, MchId}};
//! use wechat_sdk::pay::CreateOrder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let wechat = Wechat::builder()
//!         .appid(AppId::new("wx1234567890abcdef")?)
//!         .secret(AppSecret::new("your_secret")?)
//!         .mch_id(MchId::new("10000100")?)
//!         .api_key_path("/etc/wechat/api_key")
//!         .build()?;
//!
//!     // Messaging: provider error codes come back as data
//!     let sent = wechat.message().send_text("openid", "hello", None).await?;
//!     if !sent.is_success() {
//!         println!("send failed: {} {}", sent.errcode(), sent.errmsg());
//!     }
//!
//!     // Payment
//!     let order = CreateOrder::new("Coffee", "order-1", 100, "127.0.0.1", "https://example.com/notify");
//!     let result = wechat.pay()?.order().create(order).await?;
//!     println!("prepay_id: {:?}", result.get("prepay_id"));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`api`] - Official Account API groups (message, user, misc)
//! - [`client`] - HTTP client, request pipeline and the [`Wechat`] facade
//! - [`config`] - Deserializable configuration
//! - [`crypto`] - MD5 parameter signatures and RSA payload signing
//! - [`error`] - Error types
//! - [`middleware`] - Tower middleware for the HTTP transport
//! - [`notify`] - Alerts raised when an access token cannot be obtained
//! - [`oauth`] - Web page authorization
//! - [`pay`] - Payment channel
//! - [`token`] - Access token management
//! - [`types`] - Identifiers, parameter maps and response envelopes
//! - [`xml`] - The payment channel's XML codec
//!
//! ## Error Handling
//!
//! Messaging calls return the provider's envelope even when `errcode` is
//! non-zero; `Err` means the call itself could not be completed:
//!
//! ```rust,ignore
//! use wechat_sdk::WechatError;
//!
//! match wechat.user().get("openid", "zh_CN").await {
//!     Ok(envelope) if envelope.is_success() => { /* handle profile */ }
//!     Ok(envelope) => eprintln!("API error: {} - {}", envelope.errcode(), envelope.errmsg()),
//!     Err(WechatError::Http(e)) => eprintln!("HTTP error: {}", e),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod oauth;
pub mod pay;
pub mod token;
pub mod types;
mod utils;
pub mod xml;

pub use client::{ApiRequest, Wechat, WechatBuilder, WechatClient, WechatClientBuilder};
pub use config::WechatConfig;
pub use error::WechatError;
pub use notify::{LogNotifier, Notifier};
pub use oauth::{OAuthScope, OAuthToken, WechatOAuth};
pub use pay::{PaymentNotification, WechatPay};
pub use types::{Envelope, Params, PayResponse};
