//! Fatal settings checks.
//!
//! A value failing these aborts loading. Routing problems (bad notifier
//! configs, dangling references) are not checked here; they surface as
//! diagnostics when the routing table is built.

use crate::config::error::ConfigError;
use crate::config::settings::{DispatchConfig, FileSettings, LoggerSettings, Settings};
use crate::logger::{LEVEL_NAMES, base_directive};

/// Hard ceiling for `dispatch.max_concurrency`
const MAX_CONCURRENCY_LIMIT: usize = 1000;

impl DispatchConfig {
    /// `max_concurrency` must be within 1..=1000
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONCURRENCY_LIMIT).contains(&self.max_concurrency) {
            return Err(ConfigError::validation(
                "dispatch.max_concurrency",
                format!(
                    "max_concurrency must be between 1 and {MAX_CONCURRENCY_LIMIT}, got {}",
                    self.max_concurrency
                ),
            ));
        }
        Ok(())
    }
}

impl FileSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }
        self.parse_format().map(drop)
    }
}

impl LoggerSettings {
    /// Checks the base level, the file section, and that some output is on.
    ///
    /// `target=level` directives after the base level are passed through to
    /// the filter unchecked.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = base_directive(&self.level).to_lowercase();
        if !LEVEL_NAMES.contains(&base.as_str()) {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    LEVEL_NAMES.join(", ")
                ),
            ));
        }

        self.file.validate()?;

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        Ok(())
    }
}

impl Settings {
    /// Returns the first failing section, logger before dispatch
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logger.validate()?;
        self.dispatch.validate()
    }
}
