//! Notification dispatch engine.
//!
//! Resolves an app, renders its template against the request payload and
//! fans the rendered message out to every listed channel concurrently.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::provider::{NotificationMessage, NotificationProvider};
use super::registry::ChannelLookup;
use super::routing::RoutingTable;
use super::template::TemplateRenderer;
use crate::error::{AppError, AppResult, ChannelError, SendFailures};
use crate::models::NotificationApp;

/// Default number of channel sends allowed in flight per dispatch
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// A rendered notification that has not been delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedNotification {
    pub app_id: String,
    pub message: NotificationMessage,
    pub targets: Vec<String>,
    /// Channel instance names the message would go to, in order
    pub notifiers: Vec<String>,
}

/// Notification service handling routing, rendering and fan-out
///
/// Reads go through an atomically swappable [`RoutingTable`]; a dispatch
/// keeps the snapshot it started with even if a new one is published
/// mid-flight. Cloning is cheap.
#[derive(Clone)]
pub struct NotificationService {
    routing: Arc<ArcSwap<RoutingTable>>,
    renderer: Arc<TemplateRenderer>,
    max_concurrency: usize,
}

impl NotificationService {
    /// Creates a new NotificationService
    ///
    /// # Arguments
    /// * `routing` - Initial routing snapshot
    /// * `max_concurrency` - Channel sends allowed in flight per dispatch (min 1)
    pub fn new(routing: RoutingTable, max_concurrency: usize) -> Self {
        Self {
            routing: Arc::new(ArcSwap::from_pointee(routing)),
            renderer: Arc::new(TemplateRenderer::new()),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Current routing snapshot
    pub fn routing(&self) -> Arc<RoutingTable> {
        self.routing.load_full()
    }

    /// Replaces the routing snapshot in one atomic swap
    pub fn publish(&self, routing: RoutingTable) {
        self.routing.store(Arc::new(routing));
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Renders and delivers a notification through every channel of an app
    ///
    /// App and template problems abort before any channel is touched.
    /// Channel problems never stop the other channels; they are collected
    /// and returned together as [`AppError::AggregateSend`].
    ///
    /// # Arguments
    /// * `app_id` - The notification app to route through
    /// * `payload` - Flat key/value data the template is rendered against
    /// * `cancel` - Cancels every in-flight channel send when triggered
    #[instrument(skip(self, payload, cancel))]
    pub async fn send(
        &self,
        app_id: &str,
        payload: &Map<String, JsonValue>,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let routing = self.routing.load_full();
        let app = resolve_app(&routing, app_id)?;
        let (message, targets) = self.render(&routing, app, payload)?;

        if app.notifiers.is_empty() {
            return Err(AppError::NoNotifiersConfigured {
                app_id: app.app_id.clone(),
            });
        }

        let failures = Arc::new(Mutex::new(SendFailures::default()));
        let limiter = Arc::new(Semaphore::new(self.max_concurrency));
        let message = Arc::new(message);
        let targets: Arc<[String]> = targets.into();
        let mut tasks = JoinSet::new();

        for name in &app.notifiers {
            let provider = match routing.channels().lookup(name) {
                ChannelLookup::Ready(provider) => Arc::clone(provider),
                ChannelLookup::Disabled => {
                    warn!(notifier = %name, "Notifier is disabled");
                    failures
                        .lock()
                        .await
                        .push(AppError::ChannelDisabled { name: name.clone() });
                    continue;
                }
                ChannelLookup::Missing => {
                    warn!(notifier = %name, "Notifier not found");
                    failures
                        .lock()
                        .await
                        .push(AppError::ChannelNotFound { name: name.clone() });
                    continue;
                }
            };

            tasks.spawn(deliver(
                name.clone(),
                provider,
                Arc::clone(&message),
                Arc::clone(&targets),
                Arc::clone(&limiter),
                Arc::clone(&failures),
                cancel.clone(),
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Notifier task did not complete");
                failures.lock().await.push(AppError::Internal {
                    source: anyhow::Error::new(e),
                });
            }
        }

        let failures = std::mem::take(&mut *failures.lock().await);
        if failures.is_empty() {
            info!(
                app = app.display_name(),
                notifiers = app.notifiers.len(),
                "Notification delivered"
            );
        } else {
            warn!(
                app = app.display_name(),
                notifiers = app.notifiers.len(),
                failed = failures.len(),
                "Notification partially failed"
            );
        }
        failures.into_result()
    }

    /// Renders the notification an app would send, without delivering it
    pub fn preview(
        &self,
        app_id: &str,
        payload: &Map<String, JsonValue>,
    ) -> AppResult<RenderedNotification> {
        let routing = self.routing.load_full();
        let app = resolve_app(&routing, app_id)?;
        let (message, targets) = self.render(&routing, app, payload)?;

        Ok(RenderedNotification {
            app_id: app.app_id.clone(),
            message,
            targets,
            notifiers: app.notifiers.clone(),
        })
    }

    /// Checks a presented credential against the app's token
    ///
    /// # Arguments
    /// * `app_id` - The notification app being called
    /// * `credential` - Raw `Authorization` value (`Bearer <token>`), if any
    pub fn authenticate(&self, app_id: &str, credential: Option<&str>) -> AppResult<()> {
        let routing = self.routing.load_full();
        let app = resolve_app(&routing, app_id)?;

        if app.verify_credential(credential) {
            Ok(())
        } else {
            Err(AppError::Unauthorized {
                message: match credential {
                    Some(_) => format!("Invalid token for app {}", app.app_id),
                    None => format!("App {} requires a bearer token", app.app_id),
                },
            })
        }
    }

    fn render(
        &self,
        routing: &RoutingTable,
        app: &NotificationApp,
        payload: &Map<String, JsonValue>,
    ) -> AppResult<(NotificationMessage, Vec<String>)> {
        let template = routing
            .template(&app.template_id)
            .filter(|_| !app.template_id.is_empty())
            .ok_or_else(|| AppError::TemplateNotFound {
                template_id: app.template_id.clone(),
            })?;

        let rendered = self
            .renderer
            .render(template, payload, app.default_image.as_deref())
            .map_err(|source| AppError::TemplateRender {
                template_id: template.id.clone(),
                source,
            })?;

        let message = NotificationMessage {
            title: rendered.title,
            content: rendered.content,
            image: rendered.image,
            url: rendered.url,
            timestamp: render_timestamp(),
        };
        Ok((message, rendered.targets))
    }
}

fn resolve_app<'a>(routing: &'a RoutingTable, app_id: &str) -> AppResult<&'a NotificationApp> {
    let app = routing.app(app_id).ok_or_else(|| AppError::AppNotFound {
        app_id: app_id.to_string(),
    })?;

    if !app.enabled {
        return Err(AppError::AppDisabled {
            app_id: app_id.to_string(),
        });
    }

    Ok(app)
}

fn render_timestamp() -> String {
    jiff::Zoned::now().strftime("%Y-%m-%d %H:%M:%S").to_string()
}

/// One channel send, run as its own task
async fn deliver(
    name: String,
    provider: Arc<dyn NotificationProvider>,
    message: Arc<NotificationMessage>,
    targets: Arc<[String]>,
    limiter: Arc<Semaphore>,
    failures: Arc<Mutex<SendFailures>>,
    cancel: CancellationToken,
) {
    // The semaphore is never closed
    let Ok(_permit) = limiter.acquire_owned().await else {
        return;
    };

    let outcome = AssertUnwindSafe(provider.send(&cancel, &message, &targets))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ChannelError::Panicked(panic_message(panic.as_ref()))));

    match outcome {
        Ok(()) => debug!(notifier = %name, platform = provider.name(), "Notifier delivered"),
        Err(source) => {
            warn!(notifier = %name, platform = provider.name(), error = %source, "Notifier failed");
            failures
                .lock()
                .await
                .push(AppError::ChannelSend { name, source });
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
