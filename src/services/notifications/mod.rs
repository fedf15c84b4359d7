//! Notification system with pluggable providers.
//!
//! This module provides the dispatch engine and one provider per supported
//! chat platform. The core trait `NotificationProvider` allows new platforms
//! to be added by registering a constructor with the [`ProviderRegistry`].

mod dingtalk_provider;
mod feishu_provider;
mod provider;
mod registry;
mod routing;
mod telegram_provider;
mod template;
mod wechat_work_provider;
mod wechat_work_webhook_provider;

pub mod notification_service;

pub use dingtalk_provider::DingTalkProvider;
pub use feishu_provider::FeishuProvider;
pub use notification_service::{DEFAULT_MAX_CONCURRENCY, NotificationService, RenderedNotification};
pub use provider::{NotificationMessage, NotificationProvider};
pub use registry::{ChannelLookup, ChannelRegistry, ConfiguredProvider, ProviderRegistry};
pub use routing::RoutingTable;
pub use telegram_provider::TelegramProvider;
pub use template::{RenderedTemplate, TemplateError, TemplateRenderer};
pub use wechat_work_provider::WechatWorkProvider;
pub use wechat_work_webhook_provider::WechatWorkWebhookProvider;
