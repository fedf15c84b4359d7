pub mod channel_config;
pub mod notification;

pub use channel_config::{
    ChannelConfig, DingTalkConfig, FeishuConfig, TelegramConfig, WechatWorkAppConfig,
    WechatWorkWebhookConfig, split_targets,
};
pub use notification::{AppAuth, MessageTemplate, NotificationApp, NotifierInstance, NotifierType};
