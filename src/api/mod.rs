//! Official Account API groups
//!
//! Each group is a thin set of methods that assemble a request and hand it
//! to the authenticated pipeline on [`WechatContext`]:
//!
//! - [`message`] - Customer service, template and subscribe messages
//! - [`user`] - Follower profiles and lists
//! - [`misc`] - Short links and callback IP ranges
//!
//! Calls return the normalized [`Envelope`](crate::types::Envelope);
//! provider error codes are data, not `Err`.

pub mod message;
pub mod misc;
pub mod r#trait;
pub mod user;

pub use message::{
    Article, Articles, MessageApi, MiniProgram, SubscribeTemplateMessage, TemplateMessage,
};
pub use misc::MiscApi;
pub use r#trait::WechatContext;
pub use user::{UserApi, USER_INFO_LANGS};
