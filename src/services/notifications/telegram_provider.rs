//! Telegram bot provider.
//!
//! Sends one Bot API call per recipient: `sendMessage` for text, `sendPhoto`
//! when the message carries an image. Recipients are the rendered targets,
//! or the configured `chat_id` when none were rendered.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::provider::{NotificationMessage, NotificationProvider};
use super::registry::ConfiguredProvider;
use crate::error::{AppResult, ChannelError};
use crate::external::client::{HttpTransport, RetryPolicy, TransportOptions};
use crate::models::{ChannelConfig, TelegramConfig, split_targets};

const LINK_BUTTON_TEXT: &str = "🔗 View details";

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    error_code: i64,
}

pub struct TelegramProvider {
    config: TelegramConfig,
    http: HttpTransport,
}

impl TelegramProvider {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        let http = HttpTransport::new(
            TransportOptions::new(
                Duration::from_secs(100),
                RetryPolicy::new(3, Duration::from_secs(10)),
            )
            .with_proxy(config.proxy()),
        )?;
        Ok(Self { config, http })
    }

    fn recipients(&self, targets: &[String]) -> Vec<String> {
        if targets.is_empty() {
            split_targets(&self.config.chat_id)
        } else {
            targets.to_vec()
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base(), self.config.bot_token, method)
    }

    /// Builds the Bot API method name and body for one chat
    fn build_request(message: &NotificationMessage, chat_id: &str) -> (&'static str, JsonValue) {
        let text = format!("*{}*\n\n{}", message.title, message.content);

        let (method, mut body) = match message.image() {
            Some(image) => (
                "sendPhoto",
                json!({
                    "chat_id": chat_id,
                    "photo": image,
                    "caption": text,
                    "parse_mode": "Markdown",
                }),
            ),
            None => (
                "sendMessage",
                json!({
                    "chat_id": chat_id,
                    "text": text,
                    "parse_mode": "Markdown",
                }),
            ),
        };

        if let Some(url) = message.url() {
            body["reply_markup"] = json!({
                "inline_keyboard": [[{ "text": LINK_BUTTON_TEXT, "url": url }]]
            });
        }

        (method, body)
    }
}

impl ConfiguredProvider for TelegramProvider {
    type Config = TelegramConfig;

    fn from_config(config: Self::Config) -> Result<Self, ChannelError> {
        Self::new(config)
    }
}

#[async_trait]
impl NotificationProvider for TelegramProvider {
    async fn send(
        &self,
        cancel: &CancellationToken,
        message: &NotificationMessage,
        targets: &[String],
    ) -> Result<(), ChannelError> {
        let recipients = self.recipients(targets);
        if recipients.is_empty() {
            return Err(ChannelError::Misconfigured(
                "no recipients: render targets or set chat_id".to_string(),
            ));
        }

        for chat_id in &recipients {
            let (method, body) = Self::build_request(message, chat_id);
            let response: TelegramResponse = self
                .http
                .execute_json(
                    self.http.client().post(self.method_url(method)).json(&body),
                    cancel,
                )
                .await?;

            if !response.ok {
                return Err(ChannelError::rejected(response.error_code, response.description));
            }
            debug!(chat_id = %chat_id, method, "Telegram message sent");
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegramAppBot"
    }

    fn validate(&self) -> AppResult<()> {
        self.config.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, chat_id: &str) -> TelegramProvider {
        TelegramProvider::new(TelegramConfig {
            bot_token: "123:abc".to_string(),
            chat_id: chat_id.to_string(),
            api_base: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    fn message(image: Option<&str>, url: Option<&str>) -> NotificationMessage {
        NotificationMessage {
            title: "Backup".to_string(),
            content: "nightly backup done".to_string(),
            image: image.map(str::to_string),
            url: url.map(str::to_string),
            timestamp: "2024-05-01 03:00:00".to_string(),
        }
    }

    #[test]
    fn test_text_request_with_link_button() {
        let (method, body) =
            TelegramProvider::build_request(&message(None, Some("https://ci/1")), "42");

        assert_eq!(method, "sendMessage");
        assert_eq!(body["text"], "*Backup*\n\nnightly backup done");
        assert_eq!(body["parse_mode"], "Markdown");
        assert_eq!(body["reply_markup"]["inline_keyboard"][0][0]["url"], "https://ci/1");
    }

    #[test]
    fn test_photo_request() {
        let (method, body) =
            TelegramProvider::build_request(&message(Some("https://img/a.png"), None), "42");

        assert_eq!(method, "sendPhoto");
        assert_eq!(body["photo"], "https://img/a.png");
        assert_eq!(body["caption"], "*Backup*\n\nnightly backup done");
        assert!(body.get("reply_markup").is_none());
    }

    #[tokio::test]
    async fn test_sends_once_per_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": {}})))
            .expect(2)
            .mount(&server)
            .await;

        provider(&server, "999")
            .send(
                &CancellationToken::new(),
                &message(None, None),
                &["1".to_string(), "2".to_string()],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_falls_back_to_configured_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(json!({"chat_id": "999"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server, "999")
            .send(&CancellationToken::new(), &message(None, None), &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ok_false_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"
            })))
            .mount(&server)
            .await;

        let err = provider(&server, "999")
            .send(&CancellationToken::new(), &message(None, None), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Rejected { code: 403, .. }));
    }

    #[tokio::test]
    async fn test_no_recipients_is_misconfigured() {
        let server = MockServer::start().await;
        let err = provider(&server, "")
            .send(&CancellationToken::new(), &message(None, None), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Misconfigured(_)));
    }
}
