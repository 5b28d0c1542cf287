//! WeChat HTTP Client module
//!
//! This module contains the transport, the authenticated request pipeline
//! and the unified [`Wechat`] facade.

mod wechat_client;
pub use wechat_client::{WechatClient, WechatClientBuilder};

mod pipeline;
pub use pipeline::ApiRequest;

mod wechat;
pub use wechat::Wechat;

mod builder;
pub use builder::WechatBuilder;
