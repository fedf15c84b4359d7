//! Feishu (Lark) application bot provider.
//!
//! A send fetches a tenant access token, uploads the message image once
//! (best effort), then creates one `post` rich-text message per recipient.
//! The `receive_id_type` of each recipient is inferred from its id.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::provider::{NotificationMessage, NotificationProvider};
use super::registry::ConfiguredProvider;
use crate::error::{AppResult, ChannelError};
use crate::external::client::{HttpTransport, RetryPolicy, TransportOptions, endpoint};
use crate::models::{ChannelConfig, FeishuConfig, split_targets};

const TIME_LABEL: &str = "Time: ";
const LINK_TEXT: &str = "View details";
/// Feishu refuses message images above 10 MiB
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct TenantTokenResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
}

#[derive(Debug, Deserialize)]
struct FeishuResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: JsonValue,
}

impl FeishuResponse {
    fn into_data(self) -> Result<JsonValue, ChannelError> {
        if self.code == 0 {
            Ok(self.data)
        } else {
            Err(ChannelError::rejected(self.code, self.msg))
        }
    }
}

/// Maps a recipient id to the `receive_id_type` Feishu expects for it
pub fn receive_id_type(target: &str) -> &'static str {
    if target.starts_with("ou_") {
        "open_id"
    } else if target.starts_with("on_") {
        "union_id"
    } else if target.starts_with("oc_") {
        "chat_id"
    } else if target.contains('@') {
        "email"
    } else {
        "user_id"
    }
}

pub struct FeishuProvider {
    config: FeishuConfig,
    http: HttpTransport,
}

impl FeishuProvider {
    pub fn new(config: FeishuConfig) -> Result<Self, ChannelError> {
        let http = HttpTransport::new(
            TransportOptions::new(
                Duration::from_secs(30),
                RetryPolicy::new(3, Duration::from_secs(2)),
            )
            .with_proxy(config.proxy()),
        )?;
        Ok(Self { config, http })
    }

    async fn tenant_token(&self, cancel: &CancellationToken) -> Result<String, ChannelError> {
        let url = endpoint(
            self.config.api_base(),
            "/open-apis/auth/v3/tenant_access_token/internal",
            &[],
        )?;
        let body = json!({
            "app_id": self.config.app_id,
            "app_secret": self.config.app_secret,
        });

        let response: TenantTokenResponse = self
            .http
            .execute_json(self.http.client().post(url).json(&body), cancel)
            .await?;

        if response.code != 0 {
            return Err(ChannelError::rejected(response.code, response.msg));
        }
        if response.tenant_access_token.is_empty() {
            return Err(ChannelError::Decode(
                "tenant_access_token missing from response".to_string(),
            ));
        }
        Ok(response.tenant_access_token)
    }

    /// Downloads the image and uploads it to Feishu, returning its image key
    async fn upload_image(
        &self,
        cancel: &CancellationToken,
        token: &str,
        image_url: &str,
    ) -> Result<String, ChannelError> {
        let mut download = self
            .http
            .execute(self.http.client().get(image_url), cancel)
            .await?;
        let status = download.status();
        if !status.is_success() {
            return Err(ChannelError::Status {
                status: status.as_u16(),
                body: format!("image download from {image_url} failed"),
            });
        }
        let too_large =
            || ChannelError::Decode(format!("image at {image_url} exceeds {MAX_IMAGE_BYTES} bytes"));
        if download
            .content_length()
            .is_some_and(|len| len > MAX_IMAGE_BYTES as u64)
        {
            return Err(too_large());
        }

        let mut bytes = Vec::new();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(ChannelError::Cancelled),
                chunk = download.chunk() => chunk?,
            };
            let Some(chunk) = chunk else { break };
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        let form = Form::new()
            .text("image_type", "message")
            .part("image", Part::bytes(bytes).file_name("image"));
        let url = endpoint(self.config.api_base(), "/open-apis/im/v1/images", &[])?;

        let response: FeishuResponse = self
            .http
            .execute_json(
                self.http.client().post(url).bearer_auth(token).multipart(form),
                cancel,
            )
            .await?;

        response
            .into_data()?
            .get("image_key")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| ChannelError::Decode("image_key missing from response".to_string()))
    }

    /// Rich-text `post` content, serialized to the JSON string the API expects
    fn post_content(message: &NotificationMessage, image_key: Option<&str>) -> String {
        let mut rows: Vec<JsonValue> = Vec::new();
        if let Some(key) = image_key {
            rows.push(json!([{ "tag": "img", "image_key": key }]));
        }
        if !message.content.is_empty() {
            rows.push(json!([{ "tag": "md", "text": message.content }]));
        }
        if !message.timestamp.is_empty() {
            rows.push(json!([{ "tag": "text", "text": format!("{TIME_LABEL}{}", message.timestamp) }]));
        }
        if let Some(url) = message.url() {
            rows.push(json!([{ "tag": "a", "text": LINK_TEXT, "href": url }]));
        }

        json!({ "zh_cn": { "title": message.title, "content": rows } }).to_string()
    }
}

impl ConfiguredProvider for FeishuProvider {
    type Config = FeishuConfig;

    fn from_config(config: Self::Config) -> Result<Self, ChannelError> {
        Self::new(config)
    }
}

#[async_trait]
impl NotificationProvider for FeishuProvider {
    async fn send(
        &self,
        cancel: &CancellationToken,
        message: &NotificationMessage,
        targets: &[String],
    ) -> Result<(), ChannelError> {
        let recipients = if targets.is_empty() {
            split_targets(&self.config.targets)
        } else {
            targets.to_vec()
        };
        if recipients.is_empty() {
            return Err(ChannelError::Misconfigured(
                "no recipients: render targets or set targets".to_string(),
            ));
        }

        let token = self.tenant_token(cancel).await?;

        let image_key = match message.image() {
            Some(image) => match self.upload_image(cancel, &token, image).await {
                Ok(key) => Some(key),
                Err(ChannelError::Cancelled) => return Err(ChannelError::Cancelled),
                Err(e) => {
                    warn!(image, error = %e, "Feishu image upload failed, sending without image");
                    None
                }
            },
            None => None,
        };
        let content = Self::post_content(message, image_key.as_deref());

        for target in &recipients {
            let url = endpoint(
                self.config.api_base(),
                "/open-apis/im/v1/messages",
                &[("receive_id_type", receive_id_type(target))],
            )?;
            let body = json!({
                "receive_id": target,
                "msg_type": "post",
                "content": content,
            });

            let response: FeishuResponse = self
                .http
                .execute_json(
                    self.http.client().post(url).bearer_auth(&token).json(&body),
                    cancel,
                )
                .await?;
            response.into_data()?;
            debug!(target = %target, "Feishu message sent");
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "feishuAppBot"
    }

    fn validate(&self) -> AppResult<()> {
        self.config.check()
    }
}
