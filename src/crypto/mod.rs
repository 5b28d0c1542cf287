//! Request and notification signing
//!
//! Two independent schemes, chosen by the calling context:
//!
//! - [`signature`] - MD5 over sorted parameters plus the merchant API key,
//!   used by every payment-channel request and notification
//! - [`rsa`] - RSA/SHA-256 over a JSON payload, base64 encoded
//!
//! ## Usage
//!
//! ```rust
//! use wechat_sdk::crypto::calculate_signature;
//! use wechat_sdk::types::Params;
//!
//! let params = Params::new().with("b", "2").with("a", "1");
//! // MD5("a=1&b=2&key=k"), uppercase hex
//! let sign = calculate_signature(&params, "k");
//! assert_eq!(sign.len(), 32);
//! ```

pub mod rsa;
pub mod signature;

pub use self::rsa::RsaSigner;
pub use signature::{calculate_signature, format_params, verify_signature, SIGN_FIELD};
