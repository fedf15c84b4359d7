//! Command executor for dispatching CLI commands
//!
//! This module provides the main entry point for executing CLI commands
//! after parsing and configuration loading.

use super::handlers::{CheckCommandHandler, RenderCommandHandler, SendCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::AppResult;

/// Execute a CLI command with the given settings
///
/// # Arguments
/// * `cli` - Parsed CLI arguments
/// * `settings` - Merged and validated settings
///
/// # Errors
/// Returns the command's error; for `send` this includes the aggregate of
/// every failing channel
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    match &cli.command {
        Commands::Send(args) => SendCommandHandler::new(&settings).execute(args).await,
        Commands::Render(args) => RenderCommandHandler::new(&settings).execute(args),
        Commands::Check => CheckCommandHandler::new(settings).execute(),
    }
}
