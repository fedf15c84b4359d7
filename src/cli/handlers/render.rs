//! Render command handler
//!
//! Prints what an app would send for a payload without contacting any
//! platform.

use anyhow::Context;

use crate::cli::parser::PayloadArgs;
use crate::cli::validation::build_payload;
use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::services::notifications::RenderedNotification;
use crate::state::AppState;

/// Handler for the render command
pub struct RenderCommandHandler {
    state: AppState,
}

impl RenderCommandHandler {
    pub fn new(settings: &Settings) -> Self {
        let (state, _diagnostics) = AppState::new(settings);
        Self { state }
    }

    /// Render the notification and return it
    pub fn render(&self, args: &PayloadArgs) -> AppResult<RenderedNotification> {
        let payload = build_payload(args.json.as_ref(), &args.data);
        self.state.notifications.preview(&args.app_id, &payload)
    }

    /// Render the notification and print it as pretty JSON
    pub fn execute(&self, args: &PayloadArgs) -> AppResult<()> {
        let rendered = self.render(args)?;
        let output = serde_json::to_string_pretty(&rendered)
            .context("Failed to serialize rendered notification")?;
        println!("{output}");
        Ok(())
    }
}
