//! Provider construction and the live channel registry.
//!
//! [`ProviderRegistry`] maps a notifier type tag to a constructor, so new
//! platforms plug in without touching the dispatch engine. [`ChannelRegistry`]
//! holds the adapter instances built from one config snapshot, keyed by
//! instance name.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::error::ConfigError;
use crate::error::{AppError, AppResult, ChannelError};
use crate::models::{ChannelConfig, NotifierInstance, NotifierType};
use crate::services::notifications::{
    DingTalkProvider, FeishuProvider, NotificationProvider, TelegramProvider, WechatWorkProvider,
    WechatWorkWebhookProvider,
};

/// A provider that can be built from its typed channel config
pub trait ConfiguredProvider: NotificationProvider + Sized + 'static {
    type Config: ChannelConfig;

    fn from_config(config: Self::Config) -> Result<Self, ChannelError>;
}

type ProviderFactory =
    Box<dyn Fn(&BTreeMap<String, JsonValue>) -> AppResult<Arc<dyn NotificationProvider>> + Send + Sync>;

/// Registry for mapping notifier types to provider constructors
pub struct ProviderRegistry {
    factories: HashMap<NotifierType, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with every built-in platform adapter
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register::<WechatWorkProvider>()
            .register::<WechatWorkWebhookProvider>()
            .register::<TelegramProvider>()
            .register::<DingTalkProvider>()
            .register::<FeishuProvider>();
        registry
    }

    /// Register a provider type under its config's type tag
    pub fn register<P: ConfiguredProvider>(&mut self) -> &mut Self {
        let factory: ProviderFactory = Box::new(|raw| {
            let config = P::Config::from_raw(raw)?;
            let provider = P::from_config(config).map_err(|e| {
                AppError::validation("config", format!("Cannot build {} notifier: {}", P::Config::KIND, e))
            })?;
            Ok(Arc::new(provider) as Arc<dyn NotificationProvider>)
        });

        self.factories.insert(P::Config::KIND, factory);
        self
    }

    /// Register an arbitrary constructor for a type tag
    pub fn register_factory<F>(&mut self, kind: NotifierType, factory: F) -> &mut Self
    where
        F: Fn(&BTreeMap<String, JsonValue>) -> AppResult<Arc<dyn NotificationProvider>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
        self
    }

    pub fn supports(&self, kind: NotifierType) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Create a provider from a notifier instance
    pub fn create(&self, instance: &NotifierInstance) -> AppResult<Arc<dyn NotificationProvider>> {
        let factory = self.factories.get(&instance.kind).ok_or_else(|| {
            AppError::validation("type", format!("Unsupported notifier type: {}", instance.kind))
        })?;

        factory(&instance.config)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Live adapter instances for one config snapshot.
///
/// Disabled instances are remembered by name so that dispatch can tell a
/// disabled channel from one that does not exist.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    providers: HashMap<String, Arc<dyn NotificationProvider>>,
    disabled: HashSet<String>,
}

/// Result of looking up a channel by instance name
pub enum ChannelLookup<'a> {
    Ready(&'a Arc<dyn NotificationProvider>),
    Disabled,
    Missing,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from configured instances.
    ///
    /// Each built adapter is checked with [`NotificationProvider::validate`].
    /// Instances that fail to build or validate are logged and left out; the
    /// rest of the registry still builds. Every skipped instance is returned
    /// as a diagnostic.
    pub fn build(
        providers: &ProviderRegistry,
        instances: &BTreeMap<String, NotifierInstance>,
    ) -> (Self, Vec<ConfigError>) {
        let mut registry = Self::new();
        let mut diagnostics = Vec::new();

        for (name, instance) in instances {
            if !instance.enabled {
                debug!(notifier = %name, kind = %instance.kind, "Notifier disabled");
                registry.disabled.insert(name.clone());
                continue;
            }

            let built = providers
                .create(instance)
                .and_then(|provider| provider.validate().map(|()| provider));
            match built {
                Ok(provider) => {
                    debug!(notifier = %name, kind = %instance.kind, "Notifier ready");
                    registry.providers.insert(name.clone(), provider);
                }
                Err(e) => {
                    warn!(notifier = %name, kind = %instance.kind, error = %e, "Skipping notifier");
                    diagnostics.push(ConfigError::validation(
                        format!("notifiers.{name}"),
                        e.to_string(),
                    ));
                }
            }
        }

        (registry, diagnostics)
    }

    /// Runs every usable adapter's own config check, in name order
    pub fn validate(&self) -> Vec<ConfigError> {
        self.names()
            .into_iter()
            .filter_map(|name| {
                let provider = self.providers.get(name)?;
                provider.validate().err().map(|e| {
                    ConfigError::validation(format!("notifiers.{name}"), e.to_string())
                })
            })
            .collect()
    }

    pub fn insert(&mut self, name: impl Into<String>, provider: Arc<dyn NotificationProvider>) {
        let name = name.into();
        self.disabled.remove(&name);
        self.providers.insert(name, provider);
    }

    pub fn mark_disabled(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.providers.remove(&name);
        self.disabled.insert(name);
    }

    pub fn lookup(&self, name: &str) -> ChannelLookup<'_> {
        match self.providers.get(name) {
            Some(provider) if provider.is_enabled() => ChannelLookup::Ready(provider),
            Some(_) => ChannelLookup::Disabled,
            None if self.disabled.contains(name) => ChannelLookup::Disabled,
            None => ChannelLookup::Missing,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name) || self.disabled.contains(name)
    }

    /// Names of the usable instances, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instance(kind: NotifierType, enabled: bool, config: JsonValue) -> NotifierInstance {
        NotifierInstance {
            kind,
            enabled,
            config: serde_json::from_value(config).unwrap(),
        }
    }

    #[test]
    fn test_builtin_supports_every_platform() {
        let registry = ProviderRegistry::with_builtin();
        for kind in [
            NotifierType::WechatWorkAppBot,
            NotifierType::WechatWorkWebhookBot,
            NotifierType::TelegramAppBot,
            NotifierType::DingTalkAppBot,
            NotifierType::FeishuAppBot,
        ] {
            assert!(registry.supports(kind), "{kind} not registered");
        }
        assert!(!registry.supports(NotifierType::Unsupported));
    }

    #[test]
    fn test_build_log_and_skip() {
        let mut instances = BTreeMap::new();
        instances.insert(
            "wx_hook".to_string(),
            instance(NotifierType::WechatWorkWebhookBot, true, json!({"key": "abc"})),
        );
        instances.insert(
            "tg_broken".to_string(),
            instance(NotifierType::TelegramAppBot, true, json!({"chat_id": "1"})),
        );
        instances.insert(
            "ding_off".to_string(),
            instance(NotifierType::DingTalkAppBot, false, json!({})),
        );
        instances.insert(
            "mystery".to_string(),
            instance(NotifierType::Unsupported, true, json!({})),
        );

        let (registry, diagnostics) =
            ChannelRegistry::build(&ProviderRegistry::with_builtin(), &instances);

        assert_eq!(registry.names(), vec!["wx_hook"]);
        assert!(matches!(registry.lookup("wx_hook"), ChannelLookup::Ready(_)));
        assert!(matches!(registry.lookup("ding_off"), ChannelLookup::Disabled));
        assert!(matches!(registry.lookup("tg_broken"), ChannelLookup::Missing));
        assert!(matches!(registry.lookup("nope"), ChannelLookup::Missing));

        assert_eq!(diagnostics.len(), 2);
        let rendered: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
        assert!(rendered.iter().any(|d| d.contains("notifiers.tg_broken") && d.contains("bot_token")));
        assert!(rendered.iter().any(|d| d.contains("notifiers.mystery")));
    }

    fn blank_config_fails_validation<P: ConfiguredProvider>()
    where
        P::Config: Default,
    {
        let provider = P::from_config(P::Config::default()).unwrap();
        let err = provider.validate().unwrap_err();
        assert!(
            matches!(err, AppError::Validation { .. }),
            "{}: {err}",
            provider.name()
        );
    }

    #[test]
    fn test_every_adapter_rejects_blank_required_fields() {
        blank_config_fails_validation::<WechatWorkProvider>();
        blank_config_fails_validation::<WechatWorkWebhookProvider>();
        blank_config_fails_validation::<TelegramProvider>();
        blank_config_fails_validation::<DingTalkProvider>();
        blank_config_fails_validation::<FeishuProvider>();
    }

    #[test]
    fn test_build_skips_adapter_that_fails_validation() {
        let mut providers = ProviderRegistry::with_builtin();
        // Bypasses from_raw, so only validate() can catch the blank token
        providers.register_factory(NotifierType::TelegramAppBot, |_| {
            let provider = TelegramProvider::from_config(Default::default())
                .map_err(|e| AppError::validation("config", e.to_string()))?;
            Ok(Arc::new(provider) as Arc<dyn NotificationProvider>)
        });

        let mut instances = BTreeMap::new();
        instances.insert(
            "tg".to_string(),
            instance(NotifierType::TelegramAppBot, true, json!({"bot_token": "123:abc"})),
        );
        instances.insert(
            "wx_hook".to_string(),
            instance(NotifierType::WechatWorkWebhookBot, true, json!({"key": "abc"})),
        );

        let (registry, diagnostics) = ChannelRegistry::build(&providers, &instances);

        assert_eq!(registry.names(), vec!["wx_hook"]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].field(), Some("notifiers.tg"));
        assert!(diagnostics[0].to_string().contains("bot_token"));
        assert!(registry.validate().is_empty());
    }

    #[test]
    fn test_insert_and_disable() {
        let mut registry = ChannelRegistry::new();
        let provider = ProviderRegistry::with_builtin()
            .create(&instance(
                NotifierType::WechatWorkWebhookBot,
                true,
                json!({"key": "abc"}),
            ))
            .unwrap();

        registry.insert("a", provider);
        assert!(registry.contains("a"));
        assert_eq!(registry.len(), 1);

        registry.mark_disabled("a");
        assert!(matches!(registry.lookup("a"), ChannelLookup::Disabled));
        assert!(registry.is_empty());
    }
}
