//! DingTalk custom robot provider.
//!
//! Posts to `/robot/send`. When a signing secret is configured every request
//! carries `timestamp` and `sign` query parameters, where `sign` is the
//! base64 HMAC-SHA256 of `"{timestamp}\n{secret}"` keyed by the secret.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use serde_json::{Value as JsonValue, json};
use sha2::Sha256;
use tokio_util::sync::CancellationToken;

use super::provider::{NotificationMessage, NotificationProvider};
use super::registry::ConfiguredProvider;
use super::wechat_work_provider::WechatAck;
use crate::error::{AppResult, ChannelError};
use crate::external::client::{HttpTransport, RetryPolicy, TransportOptions, endpoint};
use crate::models::{ChannelConfig, DingTalkConfig, split_targets};

type HmacSha256 = Hmac<Sha256>;

/// Computes the DingTalk robot signature (base64, not yet URL-escaped)
pub fn sign(timestamp_ms: i64, secret: &str) -> Result<String, ChannelError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .map_err(|e| ChannelError::Misconfigured(format!("invalid signing secret: {e}")))?;
    mac.update(format!("{timestamp_ms}\n{secret}").as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

pub struct DingTalkProvider {
    config: DingTalkConfig,
    http: HttpTransport,
}

impl DingTalkProvider {
    pub fn new(config: DingTalkConfig) -> Result<Self, ChannelError> {
        let http = HttpTransport::new(
            TransportOptions::new(
                Duration::from_secs(30),
                RetryPolicy::new(3, Duration::from_secs(2)),
            )
            .with_proxy(config.proxy()),
        )?;
        Ok(Self { config, http })
    }

    fn send_url(&self, timestamp_ms: i64) -> Result<reqwest::Url, ChannelError> {
        let base = self.config.api_base();
        let token = self.config.access_token.as_str();

        match self.config.secret() {
            Some(secret) => {
                let timestamp = timestamp_ms.to_string();
                let signature = sign(timestamp_ms, secret)?;
                endpoint(
                    base,
                    "/robot/send",
                    &[
                        ("access_token", token),
                        ("timestamp", timestamp.as_str()),
                        ("sign", signature.as_str()),
                    ],
                )
            }
            None => endpoint(base, "/robot/send", &[("access_token", token)]),
        }
    }

    fn build_body(&self, message: &NotificationMessage, targets: &[String]) -> JsonValue {
        if let Some(image) = message.image() {
            // feedCard cannot @-mention anyone
            return json!({
                "msgtype": "feedCard",
                "feedCard": {
                    "links": [{
                        "title": message.title,
                        "messageURL": message.url().unwrap_or_default(),
                        "picURL": image,
                    }]
                }
            });
        }

        let mut body = json!({
            "msgtype": "markdown",
            "markdown": {
                "title": message.title,
                "text": format!("**{}**\n\n{}", message.title, message.content),
            }
        });

        let mobiles = if targets.is_empty() {
            split_targets(&self.config.targets)
        } else {
            targets.to_vec()
        };
        if !mobiles.is_empty() {
            body["at"] = json!({ "atMobiles": mobiles, "isAtAll": false });
        }

        body
    }
}

impl ConfiguredProvider for DingTalkProvider {
    type Config = DingTalkConfig;

    fn from_config(config: Self::Config) -> Result<Self, ChannelError> {
        Self::new(config)
    }
}

#[async_trait]
impl NotificationProvider for DingTalkProvider {
    async fn send(
        &self,
        cancel: &CancellationToken,
        message: &NotificationMessage,
        targets: &[String],
    ) -> Result<(), ChannelError> {
        let url = self.send_url(jiff::Timestamp::now().as_millisecond())?;

        // DingTalk answers with the same {errcode, errmsg} envelope as WeChat Work
        let ack: WechatAck = self
            .http
            .execute_json(
                self.http
                    .client()
                    .post(url)
                    .json(&self.build_body(message, targets)),
                cancel,
            )
            .await?;
        ack.into_result()
    }

    fn name(&self) -> &'static str {
        "dingTalkAppBot"
    }

    fn validate(&self) -> AppResult<()> {
        self.config.check()
    }
}
