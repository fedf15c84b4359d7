//! Send command handler
//!
//! Authenticates against the app, then dispatches the payload. The dispatch
//! is cancelled on `--timeout` expiry or Ctrl-C; channels that already
//! finished keep their outcome.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::parser::SendArgs;
use crate::cli::validation::build_payload;
use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::state::AppState;

/// Handler for the send command
pub struct SendCommandHandler {
    state: AppState,
}

impl SendCommandHandler {
    /// Build the handler from settings with the built-in adapters
    pub fn new(settings: &Settings) -> Self {
        let (state, _diagnostics) = AppState::new(settings);
        Self::with_state(state)
    }

    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    /// Execute the send command
    ///
    /// # Errors
    /// - `AppNotFound`, `AppDisabled` or `Unauthorized` before anything is rendered
    /// - Template errors before any channel is contacted
    /// - `AggregateSend` listing every failing channel
    pub async fn execute(&self, args: &SendArgs) -> AppResult<()> {
        let app_id = args.payload.app_id.as_str();
        let credential = args.token.as_ref().map(|token| format!("Bearer {token}"));
        self.state
            .notifications
            .authenticate(app_id, credential.as_deref())?;

        let payload = build_payload(args.payload.json.as_ref(), &args.payload.data);

        let cancel = CancellationToken::new();
        let watchdog = tokio::spawn(cancel_on_timeout_or_interrupt(cancel.clone(), args.timeout));

        let result = self
            .state
            .notifications
            .send(app_id, &payload, &cancel)
            .await;
        watchdog.abort();

        result?;
        let notifiers = self
            .state
            .notifications
            .routing()
            .app(app_id)
            .map_or(0, |app| app.notifiers.len());
        println!("✓ Notification delivered through {notifiers} notifier(s)");
        Ok(())
    }
}

async fn cancel_on_timeout_or_interrupt(cancel: CancellationToken, timeout: Option<u64>) {
    let deadline = async {
        match timeout {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = deadline => warn!(timeout_secs = timeout, "Send timed out, cancelling outstanding channels"),
        _ = tokio::signal::ctrl_c() => warn!("Interrupted, cancelling outstanding channels"),
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use clap::Parser;
    use serde_json::json;

    use crate::cli::parser::{Cli, Commands};
    use crate::error::{AppError, ChannelError};
    use crate::models::{AppAuth, MessageTemplate, NotificationApp, NotifierInstance, NotifierType};
    use crate::services::notifications::{NotificationMessage, NotificationProvider, ProviderRegistry};

    /// Counts deliveries, or stalls until cancelled when `hang` is set
    struct CountingProvider {
        sent: Arc<AtomicUsize>,
        hang: bool,
    }

    #[async_trait]
    impl NotificationProvider for CountingProvider {
        async fn send(
            &self,
            cancel: &CancellationToken,
            _message: &NotificationMessage,
            _targets: &[String],
        ) -> Result<(), ChannelError> {
            if self.hang {
                cancel.cancelled().await;
                return Err(ChannelError::Cancelled);
            }
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn handler(sent: Arc<AtomicUsize>, hang: bool) -> SendCommandHandler {
        let mut providers = ProviderRegistry::new();
        providers.register_factory(NotifierType::TelegramAppBot, move |_| {
            Ok(Arc::new(CountingProvider {
                sent: sent.clone(),
                hang,
            }) as Arc<dyn NotificationProvider>)
        });

        let mut settings = Settings::default();
        settings.notifiers.insert(
            "tg".to_string(),
            NotifierInstance {
                kind: NotifierType::TelegramAppBot,
                enabled: true,
                config: Default::default(),
            },
        );
        settings.templates.insert(
            "deploy".to_string(),
            MessageTemplate {
                title: "Deploy {{service}}".to_string(),
                content: "{{service}} is live".to_string(),
                ..Default::default()
            },
        );
        settings.notification_apps.insert(
            "ci".to_string(),
            NotificationApp {
                enabled: true,
                notifiers: vec!["tg".to_string()],
                template_id: "deploy".to_string(),
                auth: Some(AppAuth {
                    enabled: true,
                    token: "s3cret".to_string(),
                }),
                ..Default::default()
            },
        );

        let (state, diagnostics) = AppState::with_providers(&settings, providers);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        SendCommandHandler::with_state(state)
    }

    fn send_args(argv: &[&str]) -> SendArgs {
        let mut full = vec!["notify-hub", "send"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Send(args) => args,
            other => panic!("Expected Send command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_with_valid_token() {
        let sent = Arc::new(AtomicUsize::new(0));
        let handler = handler(sent.clone(), false);

        handler
            .execute(&send_args(&["ci", "-d", "service=api", "--token", "s3cret"]))
            .await
            .unwrap();
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_rejects_bad_token_before_delivery() {
        let sent = Arc::new(AtomicUsize::new(0));
        let handler = handler(sent.clone(), false);

        let err = handler
            .execute(&send_args(&["ci", "-d", "service=api", "--token", "wrong"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_unknown_app() {
        let handler = handler(Arc::new(AtomicUsize::new(0)), false);

        let err = handler.execute(&send_args(&["nope"])).await.unwrap_err();
        assert!(matches!(err, AppError::AppNotFound { .. }));
    }

    #[tokio::test]
    async fn test_send_timeout_cancels_outstanding_channels() {
        let handler = handler(Arc::new(AtomicUsize::new(0)), true);

        let err = handler
            .execute(&send_args(&["ci", "--token", "s3cret", "--timeout", "1"]))
            .await
            .unwrap_err();

        let failures = err.failures().expect("aggregate error");
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures.errors()[0],
            AppError::ChannelSend { source: ChannelError::Cancelled, .. }
        ));
    }

    #[test]
    fn test_payload_merges_json_and_pairs() {
        let args = send_args(&["ci", "--json", r#"{"service": "web", "n": 1}"#, "-d", "service=api"]);
        let payload = build_payload(args.payload.json.as_ref(), &args.payload.data);
        assert_eq!(payload["service"], json!("api"));
        assert_eq!(payload["n"], json!(1));
    }
}
