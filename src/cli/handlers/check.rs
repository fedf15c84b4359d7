//! Check command handler
//!
//! Builds the routing table exactly as `send` would and reports every
//! load-time diagnostic.

use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Handler for the check command
pub struct CheckCommandHandler {
    config: Settings,
}

impl CheckCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Validate settings and routing
    ///
    /// # Errors
    /// - Fatal settings validation errors
    /// - A `Validation` error summarising the routing diagnostics, if any
    pub fn execute(&self) -> AppResult<()> {
        self.config.validate()?;
        println!("✓ Settings are valid");

        let (state, mut diagnostics) = AppState::new(&self.config);
        let routing = state.notifications.routing();
        diagnostics.extend(routing.channels().validate());
        println!(
            "✓ {} notifier(s) ready: {}",
            routing.channels().len(),
            routing.channels().names().join(", ")
        );
        println!(
            "✓ {} notification app(s): {}",
            routing.app_ids().len(),
            routing.app_ids().join(", ")
        );

        if diagnostics.is_empty() {
            println!("Configuration check passed");
            return Ok(());
        }

        for diagnostic in &diagnostics {
            println!("✗ {diagnostic}");
        }
        Err(AppError::validation(
            "config",
            format!("{} routing problem(s) found", diagnostics.len()),
        ))
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}
