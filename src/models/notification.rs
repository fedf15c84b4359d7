//! Notification routing models.
//!
//! These are the config entities consumed by the dispatch engine: notifier
//! instances, message templates and notification apps. They are loaded as
//! part of [`Settings`](crate::config::settings::Settings) and treated as an
//! immutable snapshot per dispatch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ============================================================================
// Enums
// ============================================================================

/// Supported delivery platforms, tagged the way config files spell them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NotifierType {
    #[serde(rename = "wechatWorkAPPBot")]
    WechatWorkAppBot,
    #[serde(rename = "wechatWorkWebhookBot")]
    WechatWorkWebhookBot,
    #[serde(rename = "telegramAppBot")]
    TelegramAppBot,
    #[serde(rename = "dingTalkAppBot")]
    DingTalkAppBot,
    #[serde(rename = "feishuAppBot")]
    FeishuAppBot,
    /// Any tag this build has no adapter for
    #[serde(other)]
    Unsupported,
}

impl NotifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifierType::WechatWorkAppBot => "wechatWorkAPPBot",
            NotifierType::WechatWorkWebhookBot => "wechatWorkWebhookBot",
            NotifierType::TelegramAppBot => "telegramAppBot",
            NotifierType::DingTalkAppBot => "dingTalkAppBot",
            NotifierType::FeishuAppBot => "feishuAppBot",
            NotifierType::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for NotifierType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Config entities
// ============================================================================

/// One configured, named channel adapter endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierInstance {
    #[serde(rename = "type")]
    pub kind: NotifierType,
    #[serde(default)]
    pub enabled: bool,
    /// Free-form platform settings, parsed per type when the registry is built
    #[serde(default)]
    pub config: BTreeMap<String, JsonValue>,
}

/// Stored template fields, each rendered independently against a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub targets: String,
}

/// Optional per-app bearer token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppAuth {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub token: String,
}

/// Routing entry binding a template to an ordered set of notifier instances
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationApp {
    /// Public id; falls back to the config key when left empty
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub notifiers: Vec<String>,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub default_image: Option<String>,
    #[serde(default)]
    pub auth: Option<AppAuth>,
}

impl NotificationApp {
    /// Name used in messages: the display name when set, the id otherwise
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.app_id
        } else {
            &self.name
        }
    }

    pub fn requires_auth(&self) -> bool {
        self.auth.as_ref().is_some_and(|auth| auth.enabled)
    }

    /// Checks a presented `Authorization` value (`Bearer <token>`).
    ///
    /// Apps without enabled auth accept anything.
    pub fn verify_credential(&self, credential: Option<&str>) -> bool {
        if !self.requires_auth() {
            return true;
        }
        let expected = self.auth.as_ref().map_or("", |auth| auth.token.as_str());

        credential
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| !expected.is_empty() && token == expected)
    }
}
