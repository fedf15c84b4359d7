//! Logger built on `tracing-subscriber`
//!
//! - Console output on stderr, colored only when stderr is a terminal
//! - Optional file output in full, compact or JSON format
//! - `EnvFilter` directives for the level (`info,notify_hub=debug`)

pub mod config;

pub use config::*;

use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initialize the global subscriber with the given configuration.
///
/// Fails if the configuration is invalid, the log file cannot be opened, or
/// a global subscriber is already installed.
pub fn init_logger(config: LoggerConfig) -> anyhow::Result<()> {
    config.validate()?;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if !config.file.enabled {
        return install(filter, None::<fmt::Layer<Registry>>, &config.console);
    }

    let writer = Mutex::new(open_log_file(&config.file)?);

    // The file layer goes first so console ANSI settings never leak into it
    match config.file.format {
        LogFormat::Full => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            install(filter, Some(layer), &config.console)
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .compact()
                .with_writer(writer);
            install(filter, Some(layer), &config.console)
        }
        LogFormat::Json => {
            let layer = fmt::layer().with_ansi(false).json().with_writer(writer);
            install(filter, Some(layer), &config.console)
        }
    }
}

fn install<F>(filter: EnvFilter, file_layer: Option<F>, console: &ConsoleConfig) -> anyhow::Result<()>
where
    F: Layer<Registry> + Send + Sync + 'static,
{
    let console_layer = console.enabled.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(console.colored && io::stderr().is_terminal())
            .with_target(true)
            .with_level(true)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter)
        .try_init()
        .context("Failed to install the global tracing subscriber")
}

fn open_log_file(config: &FileConfig) -> anyhow::Result<File> {
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let mut options = OpenOptions::new();
    options.create(true);
    if config.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }

    options
        .open(&config.path)
        .with_context(|| format!("Failed to open log file {}", config.path.display()))
}
