//! Middleware components for WeChat SDK.
//!
//! Middleware wraps the HTTP transport using Tower patterns and sees every
//! outgoing request of both channels, including token fetches. Access
//! token injection and the expired-token retry live in the request
//! pipeline, not here.
//!
//! ## Usage
//!
//! ```ignore
//! use wechat_sdk::middleware::LoggingMiddleware;
//! use wechat_sdk::Wechat;
//!
//! let wechat = Wechat::builder()
//!     .appid(appid)
//!     .secret(secret)
//!     .with_middleware(LoggingMiddleware::new().redact(["ticket"]))
//!     .build()?;
//! ```

// Re-export tower types for convenience
pub use tower::{Layer, Service, ServiceBuilder};

mod logging;

pub use logging::{LoggingMiddleware, LoggingMiddlewareService};
