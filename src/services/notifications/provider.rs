//! Core notification provider trait and types.
//!
//! This module provides the abstraction every delivery channel implements.
//! The dispatch engine only ever sees `dyn NotificationProvider`, so adding a
//! platform means adding a provider and registering its constructor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{AppResult, ChannelError};

/// Rendered message handed to every channel of one dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Message title, may be empty
    pub title: String,
    /// Message body (never empty)
    pub content: String,
    /// Image URL, from the template or the app's default image
    pub image: Option<String>,
    /// Link the message points at
    pub url: Option<String>,
    /// Render time, `YYYY-MM-DD HH:MM:SS` local time
    pub timestamp: String,
}

impl NotificationMessage {
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().filter(|image| !image.is_empty())
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Trait for delivery channels (chat bots, webhooks)
///
/// Uses `async_trait` to support async methods with dynamic dispatch.
/// All providers must be Send + Sync since one instance serves every
/// concurrent dispatch.
///
/// # Example Implementation
/// ```ignore
/// use async_trait::async_trait;
///
/// pub struct EchoProvider;
///
/// #[async_trait]
/// impl NotificationProvider for EchoProvider {
///     async fn send(
///         &self,
///         cancel: &CancellationToken,
///         message: &NotificationMessage,
///         targets: &[String],
///     ) -> Result<(), ChannelError> {
///         println!("{} -> {:?}", message.content, targets);
///         Ok(())
///     }
///
///     fn name(&self) -> &'static str {
///         "echo"
///     }
/// }
/// ```
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    /// Delivers a message
    ///
    /// # Arguments
    /// * `cancel` - Caller cancellation; providers stop at the next await point
    /// * `message` - The rendered message
    /// * `targets` - Recipients rendered from the template, may be empty
    ///
    /// # Returns
    /// Ok(()) when the platform accepted the message
    async fn send(
        &self,
        cancel: &CancellationToken,
        message: &NotificationMessage,
        targets: &[String],
    ) -> Result<(), ChannelError>;

    /// Returns the platform name for logging/debugging
    fn name(&self) -> &'static str;

    /// Whether this instance accepts sends
    fn is_enabled(&self) -> bool {
        true
    }

    /// Validates provider configuration (optional, default no-op)
    fn validate(&self) -> AppResult<()> {
        Ok(())
    }
}
