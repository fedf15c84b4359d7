//! WeChat Work group robot provider.
//!
//! Posts a `markdown_v2` message to the group webhook identified by `key`.
//! Targets are ignored; a group robot always posts to its own group.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;

use super::provider::{NotificationMessage, NotificationProvider};
use super::registry::ConfiguredProvider;
use super::wechat_work_provider::{WechatAck, wechat_transport};
use crate::error::{AppResult, ChannelError};
use crate::external::client::{HttpTransport, endpoint};
use crate::models::{ChannelConfig, WechatWorkWebhookConfig};

pub struct WechatWorkWebhookProvider {
    config: WechatWorkWebhookConfig,
    base_url: String,
    http: HttpTransport,
}

impl WechatWorkWebhookProvider {
    pub fn new(config: WechatWorkWebhookConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            base_url: config.base_url(),
            http: wechat_transport()?,
            config,
        })
    }

    fn markdown(message: &NotificationMessage) -> String {
        let mut content = String::new();
        if let Some(image) = message.image() {
            content.push_str(&format!("![{}]({})\n\n", message.title, image));
        }
        if !message.title.is_empty() {
            content.push_str(&format!("**{}**\n\n", message.title));
        }
        if !message.content.is_empty() {
            content.push_str(&message.content);
            content.push_str("\n\n");
        }
        if !message.timestamp.is_empty() {
            content.push_str(&format!("⏰ {}", message.timestamp));
        }
        content
    }

    fn build_body(message: &NotificationMessage) -> JsonValue {
        json!({
            "msgtype": "markdown_v2",
            "markdown_v2": { "content": Self::markdown(message) },
        })
    }
}

impl ConfiguredProvider for WechatWorkWebhookProvider {
    type Config = WechatWorkWebhookConfig;

    fn from_config(config: Self::Config) -> Result<Self, ChannelError> {
        Self::new(config)
    }
}

#[async_trait]
impl NotificationProvider for WechatWorkWebhookProvider {
    async fn send(
        &self,
        cancel: &CancellationToken,
        message: &NotificationMessage,
        _targets: &[String],
    ) -> Result<(), ChannelError> {
        let url = endpoint(
            &self.base_url,
            "/cgi-bin/webhook/send",
            &[("key", self.config.key.as_str())],
        )?;

        let ack: WechatAck = self
            .http
            .execute_json(
                self.http.client().post(url).json(&Self::build_body(message)),
                cancel,
            )
            .await?;
        ack.into_result()
    }

    fn name(&self) -> &'static str {
        "wechatWorkWebhookBot"
    }

    fn validate(&self) -> AppResult<()> {
        self.config.check()
    }
}
