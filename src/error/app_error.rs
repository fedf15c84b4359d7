use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::error::ChannelError;
use crate::services::notifications::TemplateError;

/// Application-wide error type covering every failure a dispatch can report.
///
/// App, template and routing errors abort a dispatch immediately. Channel-level
/// errors (`ChannelNotFound`, `ChannelDisabled`, `ChannelSend`) are only ever
/// surfaced inside [`AppError::AggregateSend`].
#[derive(Error, Debug)]
pub enum AppError {
    /// No notification app is registered under the requested id
    #[error("Notification app not found: {app_id}")]
    AppNotFound { app_id: String },

    /// The notification app exists but is switched off
    #[error("Notification app is disabled: {app_id}")]
    AppDisabled { app_id: String },

    /// The presented credential does not match the app's token
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The app references a template id that does not resolve
    #[error("Template not found: '{template_id}'")]
    TemplateNotFound { template_id: String },

    /// Title or content rendering failed
    #[error("Failed to render template '{template_id}': {source}")]
    TemplateRender {
        template_id: String,
        #[source]
        source: TemplateError,
    },

    /// The app has an empty notifier list
    #[error("Notification app {app_id} has no notifiers configured")]
    NoNotifiersConfigured { app_id: String },

    /// A notifier name listed by the app is not in the channel registry
    #[error("Notifier '{name}' not found")]
    ChannelNotFound { name: String },

    /// A notifier name listed by the app refers to a disabled instance
    #[error("Notifier '{name}' is disabled")]
    ChannelDisabled { name: String },

    /// Delivery through a single notifier failed
    #[error("Notifier '{name}' failed to send: {source}")]
    ChannelSend {
        name: String,
        #[source]
        source: ChannelError,
    },

    /// One or more channels failed during a fan-out
    #[error("{0}")]
    AggregateSend(SendFailures),

    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Configuration error with key information
    #[error("Configuration error: {key}")]
    Configuration {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    /// Shorthand for a field validation failure
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the per-channel failures when this is an aggregate error
    pub fn failures(&self) -> Option<&SendFailures> {
        match self {
            AppError::AggregateSend(failures) => Some(failures),
            _ => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::ValidationError { field, message } => AppError::Validation {
                field,
                reason: message,
            },
            other => AppError::Configuration {
                key: "settings".to_string(),
                source: other.into(),
            },
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

/// Ordered list of channel-level failures collected from one fan-out.
#[derive(Debug, Default)]
pub struct SendFailures {
    errors: Vec<AppError>,
}

impl SendFailures {
    pub fn new(errors: Vec<AppError>) -> Self {
        Self { errors }
    }

    pub fn push(&mut self, error: AppError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[AppError] {
        &self.errors
    }

    /// Converts the list into `Ok(())` when empty, an aggregate error otherwise
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::AggregateSend(self))
        }
    }
}

impl fmt::Display for SendFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to deliver notification through {} notifier(s):",
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_failures_lists_each_channel_on_its_own_line() {
        let failures = SendFailures::new(vec![
            AppError::ChannelNotFound {
                name: "bad_channel".to_string(),
            },
            AppError::ChannelDisabled {
                name: "tg".to_string(),
            },
        ]);

        let rendered = failures.to_string();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("2 notifier(s)"));
        assert!(lines[1].contains("'bad_channel' not found"));
        assert!(lines[2].contains("'tg' is disabled"));
    }

    #[test]
    fn test_empty_failures_is_success() {
        assert!(SendFailures::default().into_result().is_ok());
    }

    #[test]
    fn test_non_empty_failures_is_aggregate() {
        let mut failures = SendFailures::default();
        failures.push(AppError::ChannelNotFound {
            name: "x".to_string(),
        });

        let err = failures.into_result().unwrap_err();
        assert_eq!(err.failures().map(SendFailures::len), Some(1));
    }

    #[test]
    fn test_config_validation_maps_to_validation() {
        let err: AppError = ConfigError::validation("dispatch.max_concurrency", "out of range").into();
        assert!(matches!(
            err,
            AppError::Validation { ref field, .. } if field == "dispatch.max_concurrency"
        ));

        let err: AppError = ConfigError::file_not_found("config/default.toml").into();
        assert!(matches!(err, AppError::Configuration { .. }));
    }
}
