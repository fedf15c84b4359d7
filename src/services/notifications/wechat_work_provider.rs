//! WeChat Work (企业微信) application bot provider.
//!
//! Each send fetches a fresh access token from `/cgi-bin/gettoken` and then
//! posts to `/cgi-bin/message/send`. Messages without an image go out as
//! `text`; with an image they become a single `news` article.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;

use super::provider::{NotificationMessage, NotificationProvider};
use super::registry::ConfiguredProvider;
use crate::error::{AppResult, ChannelError};
use crate::external::client::{HttpTransport, RetryPolicy, TransportOptions, endpoint};
use crate::models::{ChannelConfig, WechatWorkAppConfig, split_targets};

/// Standard `{errcode, errmsg}` envelope of WeChat Work APIs
#[derive(Debug, Deserialize)]
pub(super) struct WechatAck {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl WechatAck {
    pub(super) fn into_result(self) -> Result<(), ChannelError> {
        if self.errcode == 0 {
            Ok(())
        } else {
            Err(ChannelError::rejected(self.errcode, self.errmsg))
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    access_token: String,
}

/// WeChat Work `proxy` settings replace the API base instead of acting as an
/// HTTP proxy, so the transport always connects directly
pub(super) fn wechat_transport() -> Result<HttpTransport, ChannelError> {
    HttpTransport::new(TransportOptions::new(
        Duration::from_secs(30),
        RetryPolicy::new(3, Duration::from_secs(2)),
    ))
}

/// WeChat Work application message provider
pub struct WechatWorkProvider {
    config: WechatWorkAppConfig,
    base_url: String,
    http: HttpTransport,
}

impl WechatWorkProvider {
    pub fn new(config: WechatWorkAppConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            base_url: config.base_url(),
            http: wechat_transport()?,
            config,
        })
    }

    async fn access_token(&self, cancel: &CancellationToken) -> Result<String, ChannelError> {
        let url = endpoint(
            &self.base_url,
            "/cgi-bin/gettoken",
            &[
                ("corpid", self.config.corp_id.as_str()),
                ("corpsecret", self.config.secret.as_str()),
            ],
        )?;

        let token: TokenResponse = self
            .http
            .execute_json(self.http.client().get(url), cancel)
            .await?;

        if token.errcode != 0 {
            return Err(ChannelError::rejected(token.errcode, token.errmsg));
        }
        if token.access_token.is_empty() {
            return Err(ChannelError::Decode("gettoken returned no access_token".to_string()));
        }
        Ok(token.access_token)
    }

    fn recipients(&self, targets: &[String]) -> String {
        if !targets.is_empty() {
            return targets.join("|");
        }
        let configured = split_targets(&self.config.targets.replace('|', ","));
        if configured.is_empty() {
            "@all".to_string()
        } else {
            configured.join("|")
        }
    }

    fn agent_id(&self) -> JsonValue {
        match self.config.agent_id.trim().parse::<i64>() {
            Ok(id) => json!(id),
            Err(_) => json!(self.config.agent_id),
        }
    }

    fn build_body(&self, message: &NotificationMessage, targets: &[String]) -> JsonValue {
        let mut body = json!({
            "touser": self.recipients(targets),
            "agentid": self.agent_id(),
        });

        match message.image() {
            Some(image) => {
                body["msgtype"] = json!("news");
                body["news"] = json!({
                    "articles": [{
                        "title": message.title,
                        "description": message.content,
                        "url": message.url().unwrap_or_default(),
                        "picurl": image,
                    }]
                });
            }
            None => {
                body["msgtype"] = json!("text");
                body["text"] = json!({
                    "content": format!("{}\n{}", message.title, message.content),
                });
            }
        }

        body
    }
}

impl ConfiguredProvider for WechatWorkProvider {
    type Config = WechatWorkAppConfig;

    fn from_config(config: Self::Config) -> Result<Self, ChannelError> {
        Self::new(config)
    }
}

#[async_trait]
impl NotificationProvider for WechatWorkProvider {
    async fn send(
        &self,
        cancel: &CancellationToken,
        message: &NotificationMessage,
        targets: &[String],
    ) -> Result<(), ChannelError> {
        let token = self.access_token(cancel).await?;
        let url = endpoint(
            &self.base_url,
            "/cgi-bin/message/send",
            &[("access_token", token.as_str())],
        )?;

        let ack: WechatAck = self
            .http
            .execute_json(
                self.http.client().post(url).json(&self.build_body(message, targets)),
                cancel,
            )
            .await?;
        ack.into_result()
    }

    fn name(&self) -> &'static str {
        "wechatWorkAPPBot"
    }

    fn validate(&self) -> AppResult<()> {
        self.config.check()
    }
}
