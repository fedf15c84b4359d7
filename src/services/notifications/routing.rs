//! Immutable routing snapshot consumed by the dispatch engine.
//!
//! A [`RoutingTable`] bundles the notification apps, message templates and
//! live channel registry built from one [`Settings`] value. It is never
//! mutated after construction; config changes build a new table.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::config::error::ConfigError;
use crate::config::settings::Settings;
use crate::models::{MessageTemplate, NotificationApp, NotifierInstance};
use crate::services::notifications::{ChannelRegistry, ProviderRegistry};

#[derive(Default, Clone)]
pub struct RoutingTable {
    apps: HashMap<String, NotificationApp>,
    templates: HashMap<String, MessageTemplate>,
    channels: ChannelRegistry,
}

impl RoutingTable {
    /// Assembles a table from already validated parts
    pub fn new(
        apps: impl IntoIterator<Item = NotificationApp>,
        templates: impl IntoIterator<Item = MessageTemplate>,
        channels: ChannelRegistry,
    ) -> Self {
        Self {
            apps: apps
                .into_iter()
                .map(|app| (app.app_id.clone(), app))
                .collect(),
            templates: templates
                .into_iter()
                .map(|template| (template.id.clone(), template))
                .collect(),
            channels,
        }
    }

    /// Builds the snapshot for a settings value.
    ///
    /// Problems are returned as diagnostics and logged at `warn`; they never
    /// abort the build. Notifiers that cannot be constructed and apps whose
    /// id is already taken are left out, everything else is kept so dispatch
    /// reports the problem per send.
    pub fn from_settings(settings: &Settings, providers: &ProviderRegistry) -> (Self, Vec<ConfigError>) {
        let (channels, mut diagnostics) = ChannelRegistry::build(providers, &settings.notifiers);

        let templates = index_templates(&settings.templates, &mut diagnostics);
        let apps = index_apps(
            &settings.notification_apps,
            &settings.notifiers,
            &templates,
            &mut diagnostics,
        );

        for diagnostic in &diagnostics {
            warn!(diagnostic = %diagnostic, "Routing configuration problem");
        }

        (
            Self {
                apps,
                templates,
                channels,
            },
            diagnostics,
        )
    }

    pub fn app(&self, app_id: &str) -> Option<&NotificationApp> {
        self.apps.get(app_id)
    }

    pub fn template(&self, template_id: &str) -> Option<&MessageTemplate> {
        self.templates.get(template_id)
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// App ids, sorted
    pub fn app_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.apps.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn index_templates(
    configured: &BTreeMap<String, MessageTemplate>,
    diagnostics: &mut Vec<ConfigError>,
) -> HashMap<String, MessageTemplate> {
    configured
        .iter()
        .map(|(key, template)| {
            let mut template = template.clone();
            if template.id.is_empty() {
                template.id = key.clone();
            }
            if template.title.is_empty() {
                diagnostics.push(ConfigError::validation(
                    format!("templates.{key}.title"),
                    "Template title is empty; sends using it will fail".to_string(),
                ));
            }
            if template.content.is_empty() {
                diagnostics.push(ConfigError::validation(
                    format!("templates.{key}.content"),
                    "Template content is empty; sends using it will fail".to_string(),
                ));
            }
            (template.id.clone(), template)
        })
        .collect()
}

fn index_apps(
    configured: &BTreeMap<String, NotificationApp>,
    notifiers: &BTreeMap<String, NotifierInstance>,
    templates: &HashMap<String, MessageTemplate>,
    diagnostics: &mut Vec<ConfigError>,
) -> HashMap<String, NotificationApp> {
    let mut apps: HashMap<String, NotificationApp> = HashMap::new();

    for (key, app) in configured {
        let mut app = app.clone();
        if app.app_id.is_empty() {
            app.app_id = key.clone();
        }
        let field = format!("notification_apps.{key}");

        if apps.contains_key(&app.app_id) {
            diagnostics.push(ConfigError::validation(
                field,
                format!("Duplicate app id '{}'; entry ignored", app.app_id),
            ));
            continue;
        }

        if app.notifiers.is_empty() {
            diagnostics.push(ConfigError::validation(
                format!("{field}.notifiers"),
                "No notifiers configured".to_string(),
            ));
        }
        for name in app.notifiers.iter().filter(|name| !notifiers.contains_key(*name)) {
            diagnostics.push(ConfigError::validation(
                format!("{field}.notifiers"),
                format!("Unknown notifier '{name}'"),
            ));
        }

        if !templates.contains_key(&app.template_id) {
            diagnostics.push(ConfigError::validation(
                format!("{field}.template_id"),
                format!("Unknown template '{}'", app.template_id),
            ));
        }

        if app.requires_auth()
            && app.auth.as_ref().is_some_and(|auth| auth.token.is_empty())
        {
            diagnostics.push(ConfigError::validation(
                format!("{field}.auth.token"),
                "Auth is enabled but no token is set; every request will be rejected".to_string(),
            ));
        }

        apps.insert(app.app_id.clone(), app);
    }

    apps
}
