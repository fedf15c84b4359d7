//! Deserialized shape of the configuration files.
//!
//! Every table is optional; a missing key falls back to the value in the
//! type's `Default` impl.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};
use crate::models::{MessageTemplate, NotificationApp, NotifierInstance};
use crate::services::notifications::DEFAULT_MAX_CONCURRENCY;

/// `[application]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: crate::pkg_version().to_string(),
        }
    }
}

/// `[dispatch]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on concurrent channel sends within one dispatch
    pub max_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// `[logger.console]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub enabled: bool,
    /// ANSI colours; ignored when stderr is not a terminal
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

/// `[logger.file]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub enabled: bool,
    pub path: String,
    /// Truncate the file on start when false
    pub append: bool,
    /// "full", "compact" or "json"
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "logs/notify-hub.log".to_string(),
            append: true,
            format: LogFormat::Json.as_str().to_string(),
        }
    }
}

/// `[logger]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// EnvFilter directives, e.g. `info` or `warn,notify_hub=debug`
    pub level: String,
    pub console: ConsoleSettings,
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Converts into the runtime logger configuration
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = self.file.into_file_config()?;

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", e.to_string()))
    }
}

impl FileSettings {
    pub fn into_file_config(self) -> Result<FileConfig, ConfigError> {
        let format = self.parse_format()?;

        FileConfig::new(self.enabled, PathBuf::from(self.path), self.append, format)
            .map_err(|e| ConfigError::validation("logger.file", e.to_string()))
    }

    pub(crate) fn parse_format(&self) -> Result<LogFormat, ConfigError> {
        self.format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))
    }
}

/// Complete application settings.
///
/// Besides the ambient sections this carries the routing configuration:
/// named notifier instances, message templates and notification apps. The
/// maps are ordered so that load-time diagnostics come out in a stable order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationConfig,
    pub logger: LoggerSettings,
    pub dispatch: DispatchConfig,
    /// Notifier instances keyed by the name apps refer to them with
    pub notifiers: BTreeMap<String, NotifierInstance>,
    /// Message templates keyed by id
    pub templates: BTreeMap<String, MessageTemplate>,
    /// Notification apps keyed by id
    pub notification_apps: BTreeMap<String, NotificationApp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.application.name, "notify-hub");
        assert_eq!(settings.application.version, crate::pkg_version());
        assert_eq!(settings.dispatch.max_concurrency, 10);
        assert_eq!(settings.logger.level, "info");
        assert!(settings.logger.console.enabled);
        assert!(!settings.logger.file.enabled);
        assert!(settings.notifiers.is_empty());
        assert!(settings.notification_apps.is_empty());
    }

    #[test]
    fn test_deserialize_routing_sections() {
        let settings: Settings = serde_json::from_value(serde_json::json!({
            "notifiers": {
                "ops_wechat": {
                    "type": "wechatWorkWebhookBot",
                    "enabled": true,
                    "config": { "key": "abc" }
                }
            },
            "templates": {
                "order_created": { "title": "Order {{id}}", "content": "total {{total}}" }
            },
            "notification_apps": {
                "orders": {
                    "enabled": true,
                    "notifiers": ["ops_wechat"],
                    "template_id": "order_created"
                }
            }
        }))
        .unwrap();

        assert_eq!(settings.notifiers["ops_wechat"].config["key"], "abc");
        assert_eq!(settings.templates["order_created"].title, "Order {{id}}");
        assert_eq!(settings.notification_apps["orders"].notifiers, vec!["ops_wechat"]);
        assert_eq!(settings.dispatch, DispatchConfig::default());
    }

    #[test]
    fn test_logger_settings_conversion() {
        let settings = LoggerSettings {
            level: "debug".to_string(),
            console: ConsoleSettings {
                enabled: true,
                colored: false,
            },
            file: FileSettings {
                enabled: true,
                path: "logs/test.log".to_string(),
                append: false,
                format: "compact".to_string(),
            },
        };

        let config = settings.into_logger_config().unwrap();
        assert_eq!(config.level, "debug");
        assert!(!config.console.colored);
        assert!(config.file.enabled);
        assert_eq!(config.file.path, PathBuf::from("logs/test.log"));
        assert!(!config.file.append);
        assert_eq!(config.file.format, LogFormat::Compact);
    }

    #[test]
    fn test_logger_settings_invalid_format() {
        let settings = LoggerSettings {
            file: FileSettings {
                format: "xml".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let err = settings.into_logger_config().unwrap_err();
        assert_eq!(err.field(), Some("logger.file.format"));
    }

    #[test]
    fn test_logger_settings_no_output() {
        let settings = LoggerSettings {
            console: ConsoleSettings {
                enabled: false,
                colored: false,
            },
            ..Default::default()
        };

        let err = settings.into_logger_config().unwrap_err();
        assert_eq!(err.field(), Some("logger"));
    }
}
