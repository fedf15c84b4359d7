//! Application state shared by every entry point.
//!
//! Holds the provider registry and the notification service. Configuration
//! changes are applied with [`AppState::reload`], which builds a complete new
//! routing snapshot off to the side and publishes it in one atomic swap.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ConfigError, Settings};
use crate::services::notifications::{ProviderRegistry, RoutingTable};
use crate::services::NotificationService;

/// Application state containing all shared services.
///
/// Cloning is cheap; clones observe the same routing snapshot.
#[derive(Clone)]
pub struct AppState {
    /// Channel adapter constructors keyed by notifier type
    pub providers: Arc<ProviderRegistry>,
    /// Dispatch engine
    pub notifications: NotificationService,
}

impl AppState {
    /// Builds the state from settings with the built-in adapters.
    ///
    /// Routing problems do not fail construction; they are returned as
    /// diagnostics and the affected entries are left out.
    ///
    /// # Example
    /// ```ignore
    /// let settings = ConfigLoader::new()?.load()?;
    /// let (state, diagnostics) = AppState::new(&settings);
    /// ```
    pub fn new(settings: &Settings) -> (Self, Vec<ConfigError>) {
        Self::with_providers(settings, ProviderRegistry::with_builtin())
    }

    /// Builds the state with a caller-supplied provider registry
    pub fn with_providers(
        settings: &Settings,
        providers: ProviderRegistry,
    ) -> (Self, Vec<ConfigError>) {
        let (routing, diagnostics) = RoutingTable::from_settings(settings, &providers);
        log_snapshot(&routing, &diagnostics);

        let state = Self {
            providers: Arc::new(providers),
            notifications: NotificationService::new(routing, settings.dispatch.max_concurrency),
        };
        (state, diagnostics)
    }

    /// Rebuilds the channel registry and routing table from new settings
    /// and publishes them atomically.
    ///
    /// Dispatches already in flight finish against the snapshot they
    /// started with. `dispatch.max_concurrency` is fixed at construction
    /// and is not changed by a reload.
    pub fn reload(&self, settings: &Settings) -> Vec<ConfigError> {
        let (routing, diagnostics) = RoutingTable::from_settings(settings, &self.providers);
        log_snapshot(&routing, &diagnostics);

        if settings.dispatch.max_concurrency != self.notifications.max_concurrency() {
            warn!(
                configured = settings.dispatch.max_concurrency,
                active = self.notifications.max_concurrency(),
                "dispatch.max_concurrency changes take effect on restart"
            );
        }

        self.notifications.publish(routing);
        diagnostics
    }
}

fn log_snapshot(routing: &RoutingTable, diagnostics: &[ConfigError]) {
    info!(
        apps = routing.app_ids().len(),
        notifiers = routing.channels().len(),
        diagnostics = diagnostics.len(),
        "Routing table built"
    );
}
