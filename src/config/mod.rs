//! Settings for the hub: logging, dispatch limits and the routing tables
//! (notifier instances, message templates, notification apps).
//!
//! Sources are merged lowest first:
//! `default.toml`, `{env}.toml`, `local.toml`, then `NOTIFY_HUB_*` variables
//! (`NOTIFY_HUB_DISPATCH__MAX_CONCURRENCY=4`). A single file passed with
//! `--config` replaces the three TOML layers.

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::{ConfigLoader, ConfigSource};
pub use settings::{DispatchConfig, LoggerSettings, Settings};
