//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{Map, Value as JsonValue};

/// Multi-channel notification dispatch gateway
#[derive(Parser, Debug)]
#[command(name = "notify-hub")]
#[command(about = "Multi-channel notification dispatch gateway")]
#[command(long_about = "
notify-hub renders a notification app's message template against a payload
and delivers the result to every chat platform the app is routed to
(WeChat Work, Telegram, DingTalk, Feishu) concurrently.

EXAMPLES:
    # Send through the 'orders' app
    notify-hub send orders -d id=1001 -d total=59.90

    # Same payload as JSON, with the app's bearer token
    notify-hub send orders --json '{\"id\": 1001, \"total\": 59.90}' --token s3cret

    # Show what would be sent without delivering anything
    notify-hub render orders -d id=1001

    # Validate configuration and list routing diagnostics
    notify-hub --env production check

    # Use a specific configuration file or directory
    notify-hub --config /etc/notify-hub/hub.toml check
")]
#[command(version = crate::clap_long_version())]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file or directory
    ///
    /// A file is loaded on its own. A directory is loaded in layers:
    /// default.toml, then {env}.toml, then local.toml.
    ///
    /// Example: --config /etc/notify-hub
    #[arg(short, long, global = true, value_name = "PATH", value_parser = super::validation::validate_config_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which {env}.toml overlay is loaded.
    ///
    /// Available values: development (dev), test, staging (stage), production (prod)
    #[arg(short, long, global = true, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Raises the log level to debug. Cannot be used with --quiet.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Lowers the log level to error. Cannot be used with --verbose.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render and deliver a notification
    ///
    /// Exits non-zero if the app cannot be resolved, the template fails to
    /// render, or any channel fails. Every failing channel is listed.
    ///
    /// Examples:
    ///   notify-hub send orders -d id=1001
    ///   notify-hub send orders --json '{"id": 1001}' --timeout 30
    Send(SendArgs),

    /// Render a notification without delivering it
    ///
    /// Prints the rendered message, targets and notifier list as JSON.
    Render(PayloadArgs),

    /// Validate configuration and report routing diagnostics
    ///
    /// Exits non-zero when any notifier, template or app has a problem.
    Check,
}

/// App and payload shared by `send` and `render`
#[derive(Args, Debug, Clone)]
pub struct PayloadArgs {
    /// Notification app id
    #[arg(value_name = "APP_ID")]
    pub app_id: String,

    /// Payload entry, repeatable
    ///
    /// Example: -d id=1001 -d customer=alice
    #[arg(short = 'd', long = "data", value_name = "KEY=VALUE", value_parser = super::validation::parse_key_value)]
    pub data: Vec<(String, String)>,

    /// Payload as a JSON object; -d entries override its keys
    #[arg(long, value_name = "JSON", value_parser = super::validation::parse_json_object)]
    pub json: Option<Map<String, JsonValue>>,
}

/// Arguments of the `send` command
#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[command(flatten)]
    pub payload: PayloadArgs,

    /// Bearer token for apps with auth enabled
    #[arg(long, value_name = "TOKEN", env = "NOTIFY_HUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Cancel outstanding channel sends after this many seconds
    #[arg(long, value_name = "SECS", value_parser = super::validation::validate_timeout)]
    pub timeout: Option<u64>,
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

impl Cli {
    /// Log level forced by --verbose / --quiet, if any
    pub fn log_level_override(&self) -> Option<&'static str> {
        if self.verbose {
            Some("debug")
        } else if self.quiet {
            Some("error")
        } else {
            None
        }
    }
}
