//! Type-safe per-platform channel configuration.
//!
//! Notifier instances carry a loosely typed key/value map. Each platform has a
//! strongly typed record here; the registry parses the raw map into it when
//! the routing snapshot is built, so incomplete instances surface as a
//! load-time diagnostic instead of a failure on every send.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{AppError, AppResult};
use crate::models::NotifierType;

/// A typed channel configuration parsed from a raw notifier config map
pub trait ChannelConfig: DeserializeOwned + Sized {
    /// The notifier type tag this config belongs to
    const KIND: NotifierType;

    /// Field name / value pairs that must be non-empty for an enabled instance
    fn required_fields(&self) -> Vec<(&'static str, &str)>;

    /// Parse and check a raw config map
    ///
    /// Scalars are coerced to strings first, so `agent_id = 1000002` and
    /// `agent_id = "1000002"` are equivalent.
    fn from_raw(raw: &BTreeMap<String, JsonValue>) -> AppResult<Self> {
        let config: Self = serde_json::from_value(normalize_raw(raw)).map_err(|e| {
            AppError::validation("config", format!("Invalid {} config: {}", Self::KIND, e))
        })?;
        config.check()?;
        Ok(config)
    }

    /// Fails on the first required field that is blank
    fn check(&self) -> AppResult<()> {
        for (field, value) in self.required_fields() {
            if value.trim().is_empty() {
                return Err(AppError::validation(
                    field,
                    format!("{} requires a non-empty '{}'", Self::KIND, field),
                ));
            }
        }
        Ok(())
    }
}

fn normalize_raw(raw: &BTreeMap<String, JsonValue>) -> JsonValue {
    let mut map = Map::new();
    for (key, value) in raw {
        let normalized = match value {
            JsonValue::Null => continue,
            JsonValue::Bool(b) => JsonValue::String(b.to_string()),
            JsonValue::Number(n) => JsonValue::String(n.to_string()),
            JsonValue::Array(items) => JsonValue::String(
                items
                    .iter()
                    .map(|item| match item {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => other.clone(),
        };
        map.insert(key.clone(), normalized);
    }
    JsonValue::Object(map)
}

/// Split a comma separated list, trimming entries and dropping empty ones
pub fn split_targets(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

// ============================================================================
// WeChat Work
// ============================================================================

/// WeChat Work application bot (`wechatWorkAPPBot`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WechatWorkAppConfig {
    #[serde(default)]
    pub corp_id: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub secret: String,
    /// Default recipients (`|`-joined user ids), used when a send has none
    #[serde(default)]
    pub targets: String,
    /// Replaces the API base URL, e.g. a reverse proxy in front of qyapi
    #[serde(default)]
    pub proxy: String,
}

impl WechatWorkAppConfig {
    pub fn base_url(&self) -> String {
        non_empty(&self.proxy)
            .map(|proxy| proxy.trim_end_matches('/').to_string())
            .unwrap_or_else(|| WECHAT_WORK_API_BASE.to_string())
    }
}

impl ChannelConfig for WechatWorkAppConfig {
    const KIND: NotifierType = NotifierType::WechatWorkAppBot;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("corp_id", &self.corp_id),
            ("agent_id", &self.agent_id),
            ("secret", &self.secret),
        ]
    }
}

/// WeChat Work group robot (`wechatWorkWebhookBot`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WechatWorkWebhookConfig {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub proxy: String,
}

impl WechatWorkWebhookConfig {
    pub fn base_url(&self) -> String {
        non_empty(&self.proxy)
            .map(|proxy| proxy.trim_end_matches('/').to_string())
            .unwrap_or_else(|| WECHAT_WORK_API_BASE.to_string())
    }
}

impl ChannelConfig for WechatWorkWebhookConfig {
    const KIND: NotifierType = NotifierType::WechatWorkWebhookBot;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("key", &self.key)]
    }
}

pub const WECHAT_WORK_API_BASE: &str = "https://qyapi.weixin.qq.com";

// ============================================================================
// Telegram
// ============================================================================

/// Telegram bot (`telegramAppBot`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Default chat, used when a send has no targets
    #[serde(default)]
    pub chat_id: String,
    /// Outbound HTTP(S)/SOCKS proxy URL
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub api_base: String,
}

impl TelegramConfig {
    pub fn proxy(&self) -> Option<&str> {
        non_empty(&self.proxy)
    }

    pub fn api_base(&self) -> &str {
        non_empty(&self.api_base)
            .map(|base| base.trim_end_matches('/'))
            .unwrap_or(TELEGRAM_API_BASE)
    }
}

impl ChannelConfig for TelegramConfig {
    const KIND: NotifierType = NotifierType::TelegramAppBot;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("bot_token", &self.bot_token)]
    }
}

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

// ============================================================================
// DingTalk
// ============================================================================

/// DingTalk custom robot (`dingTalkAppBot`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DingTalkConfig {
    #[serde(default)]
    pub access_token: String,
    /// Signing secret; requests are signed only when this is set
    #[serde(default)]
    pub secret: String,
    /// Default mobiles to @-mention
    #[serde(default)]
    pub targets: String,
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub api_base: String,
}

impl DingTalkConfig {
    pub fn proxy(&self) -> Option<&str> {
        non_empty(&self.proxy)
    }

    pub fn secret(&self) -> Option<&str> {
        non_empty(&self.secret)
    }

    pub fn api_base(&self) -> &str {
        non_empty(&self.api_base)
            .map(|base| base.trim_end_matches('/'))
            .unwrap_or(DINGTALK_API_BASE)
    }
}

impl ChannelConfig for DingTalkConfig {
    const KIND: NotifierType = NotifierType::DingTalkAppBot;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("access_token", &self.access_token)]
    }
}

pub const DINGTALK_API_BASE: &str = "https://oapi.dingtalk.com";

// ============================================================================
// Feishu
// ============================================================================

/// Feishu (Lark) application bot (`feishuAppBot`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeishuConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    /// Default receive ids, comma separated
    #[serde(default)]
    pub targets: String,
    #[serde(default)]
    pub proxy: String,
    #[serde(default)]
    pub api_base: String,
}

impl FeishuConfig {
    pub fn proxy(&self) -> Option<&str> {
        non_empty(&self.proxy)
    }

    pub fn api_base(&self) -> &str {
        non_empty(&self.api_base)
            .map(|base| base.trim_end_matches('/'))
            .unwrap_or(FEISHU_API_BASE)
    }
}

impl ChannelConfig for FeishuConfig {
    const KIND: NotifierType = NotifierType::FeishuAppBot;

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        vec![("app_id", &self.app_id), ("app_secret", &self.app_secret)]
    }
}

pub const FEISHU_API_BASE: &str = "https://open.feishu.cn";
