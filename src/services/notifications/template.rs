//! Message template rendering.
//!
//! Templates are logic-less handlebars strings rendered against the flat
//! request payload. Missing keys render as empty strings, output is never
//! HTML-escaped, and a set of string helpers is registered:
//!
//! | helper       | example                                  |
//! |--------------|------------------------------------------|
//! | `contains`   | `{{#if (contains status "fail")}}`       |
//! | `hasPrefix`  | `{{#if (hasPrefix ref "refs/tags/")}}`   |
//! | `hasSuffix`  | `{{#if (hasSuffix file ".rs")}}`         |
//! | `index`      | `{{index repo "/"}}` (-1 when absent)    |
//! | `lastIndex`  | `{{lastIndex repo "/"}}`                 |
//! | `replace`    | `{{replace msg "a" "b" 1}}` (n < 0: all) |
//! | `replaceAll` | `{{replaceAll msg "\n" " "}}`            |
//! | `split`      | `{{#each (split tags ",")}}`             |
//! | `join`       | `{{join (split tags ",") " | "}}`        |
//! | `isEmpty`    | `{{#if (isEmpty user)}}`                 |

use handlebars::{Handlebars, RenderError, handlebars_helper, no_escape};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::models::{MessageTemplate, split_targets};

/// Marker some template engines emit for missing keys; always stripped
const MISSING_VALUE_MARKER: &str = "<no value>";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template title is empty")]
    EmptyTitle,

    #[error("template content is empty")]
    EmptyContent,

    #[error("failed to render {field}: {source}")]
    Render {
        field: &'static str,
        #[source]
        source: RenderError,
    },
}

/// Output of rendering every field of a [`MessageTemplate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub image: Option<String>,
    pub targets: Vec<String>,
}

handlebars_helper!(contains: |s: str, sub: str| s.contains(sub));
handlebars_helper!(has_prefix: |s: str, prefix: str| s.starts_with(prefix));
handlebars_helper!(has_suffix: |s: str, suffix: str| s.ends_with(suffix));
handlebars_helper!(index_of: |s: str, sub: str| s.find(sub).map_or(-1, |i| i as i64));
handlebars_helper!(last_index_of: |s: str, sub: str| s.rfind(sub).map_or(-1, |i| i as i64));
handlebars_helper!(replace: |s: str, old: str, new: str, n: i64| {
    if n < 0 {
        s.replace(old, new)
    } else {
        s.replacen(old, new, n as usize)
    }
});
handlebars_helper!(replace_all: |s: str, old: str, new: str| s.replace(old, new));
handlebars_helper!(split: |s: str, sep: str| s.split(sep).map(str::to_string).collect::<Vec<_>>());
handlebars_helper!(join: |items: array, sep: str| {
    items
        .iter()
        .map(|item| match item {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(sep)
});
handlebars_helper!(is_empty: |value: Json| match value {
    JsonValue::Null => true,
    JsonValue::String(s) => s.is_empty(),
    JsonValue::Array(items) => items.is_empty(),
    JsonValue::Object(map) => map.is_empty(),
    _ => false,
});

/// Renders message templates against request payloads.
///
/// Rendering is pure: the same template and payload always produce the same
/// output.
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_escape_fn(no_escape);

        registry.register_helper("contains", Box::new(contains));
        registry.register_helper("hasPrefix", Box::new(has_prefix));
        registry.register_helper("hasSuffix", Box::new(has_suffix));
        registry.register_helper("index", Box::new(index_of));
        registry.register_helper("lastIndex", Box::new(last_index_of));
        registry.register_helper("replace", Box::new(replace));
        registry.register_helper("replaceAll", Box::new(replace_all));
        registry.register_helper("split", Box::new(split));
        registry.register_helper("join", Box::new(join));
        registry.register_helper("isEmpty", Box::new(is_empty));

        Self { registry }
    }

    /// Renders one template string
    pub fn render_str(
        &self,
        field: &'static str,
        template: &str,
        payload: &Map<String, JsonValue>,
    ) -> Result<String, TemplateError> {
        let rendered = self
            .registry
            .render_template(template, payload)
            .map_err(|source| TemplateError::Render { field, source })?;
        Ok(rendered.replace(MISSING_VALUE_MARKER, ""))
    }

    /// Renders every field of a template.
    ///
    /// Title and content must be non-empty and must render; url, image and
    /// targets are best effort and left empty when they fail. Rendered url
    /// and image are passed through as is. An empty image falls back to
    /// `default_image`.
    pub fn render(
        &self,
        template: &MessageTemplate,
        payload: &Map<String, JsonValue>,
        default_image: Option<&str>,
    ) -> Result<RenderedTemplate, TemplateError> {
        if template.title.is_empty() {
            return Err(TemplateError::EmptyTitle);
        }
        if template.content.is_empty() {
            return Err(TemplateError::EmptyContent);
        }

        let title = self.render_str("title", &template.title, payload)?;
        let content = self.render_str("content", &template.content, payload)?;

        let url = self.render_optional("url", &template.url, payload);
        let image = self
            .render_optional("image", &template.image, payload)
            .or_else(|| {
                default_image
                    .filter(|image| !image.is_empty())
                    .map(str::to_string)
            });
        let targets = self
            .render_optional("targets", &template.targets, payload)
            .map(|targets| split_targets(&targets))
            .unwrap_or_default();

        Ok(RenderedTemplate {
            title,
            content,
            url,
            image,
            targets,
        })
    }

    fn render_optional(
        &self,
        field: &'static str,
        template: &str,
        payload: &Map<String, JsonValue>,
    ) -> Option<String> {
        if template.is_empty() {
            return None;
        }

        match self.render_str(field, template, payload) {
            Ok(rendered) if !rendered.is_empty() => Some(rendered),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(field, error = %e, "Optional template field skipped");
                None
            }
        }
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("payload must be an object"),
        }
    }

    fn render(template: &str, data: JsonValue) -> String {
        TemplateRenderer::new()
            .render_str("content", template, &payload(data))
            .unwrap()
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            render("Order {{id}} shipped", json!({"id": "42"})),
            "Order 42 shipped"
        );
        assert_eq!(render("{{count}} items", json!({"count": 3})), "3 items");
    }

    #[test]
    fn test_missing_key_renders_empty() {
        assert_eq!(render("[{{missing}}]", json!({})), "[]");
    }

    #[test]
    fn test_no_html_escaping() {
        assert_eq!(
            render("{{msg}}", json!({"msg": "<b>a & b</b>"})),
            "<b>a & b</b>"
        );
    }

    #[test]
    fn test_missing_value_marker_stripped() {
        assert_eq!(render("x{{v}}y", json!({"v": "<no value>"})), "xy");
    }

    #[test]
    fn test_string_helpers() {
        let data = json!({"repo": "org/team/app", "status": "build failed", "tags": "a,b,c"});

        assert_eq!(
            render("{{#if (contains status \"fail\")}}red{{else}}green{{/if}}", data.clone()),
            "red"
        );
        assert_eq!(render("{{#if (hasPrefix repo \"org/\")}}y{{/if}}", data.clone()), "y");
        assert_eq!(render("{{#if (hasSuffix repo \"/api\")}}y{{else}}n{{/if}}", data.clone()), "n");
        assert_eq!(render("{{index repo \"/\"}}", data.clone()), "3");
        assert_eq!(render("{{lastIndex repo \"/\"}}", data.clone()), "8");
        assert_eq!(render("{{index repo \"#\"}}", data.clone()), "-1");
        assert_eq!(render("{{replace repo \"/\" \"-\" 1}}", data.clone()), "org-team/app");
        assert_eq!(render("{{replace repo \"/\" \"-\" -1}}", data.clone()), "org-team-app");
        assert_eq!(render("{{replaceAll repo \"/\" \".\"}}", data.clone()), "org.team.app");
        assert_eq!(render("{{#each (split tags \",\")}}[{{this}}]{{/each}}", data.clone()), "[a][b][c]");
        assert_eq!(render("{{join (split tags \",\") \" | \"}}", data.clone()), "a | b | c");
        assert_eq!(render("{{#if (isEmpty nobody)}}empty{{/if}}", data), "empty");
    }

    #[test]
    fn test_render_is_pure() {
        let renderer = TemplateRenderer::new();
        let data = payload(json!({"id": "7"}));
        let first = renderer.render_str("title", "#{{id}}", &data).unwrap();
        let second = renderer.render_str("title", "#{{id}}", &data).unwrap();
        assert_eq!(first, second);
    }

    fn template() -> MessageTemplate {
        MessageTemplate {
            id: "order_shipped".to_string(),
            title: "Order {{id}}".to_string(),
            content: "Order {{id}} shipped".to_string(),
            image: "{{image}}".to_string(),
            url: "https://shop.example.com/orders/{{id}}".to_string(),
            targets: "{{users}}".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_full_template() {
        let rendered = TemplateRenderer::new()
            .render(
                &template(),
                &payload(json!({"id": "42", "users": "alice, bob,", "image": "https://img/1.png"})),
                Some("https://img/default.png"),
            )
            .unwrap();

        assert_eq!(rendered.title, "Order 42");
        assert_eq!(rendered.content, "Order 42 shipped");
        assert_eq!(rendered.url.as_deref(), Some("https://shop.example.com/orders/42"));
        assert_eq!(rendered.image.as_deref(), Some("https://img/1.png"));
        assert_eq!(rendered.targets, vec!["alice", "bob"]);
    }

    #[test]
    fn test_image_falls_back_to_default() {
        let rendered = TemplateRenderer::new()
            .render(&template(), &payload(json!({"id": "1"})), Some("https://img/default.png"))
            .unwrap();

        assert_eq!(rendered.image.as_deref(), Some("https://img/default.png"));
        assert!(rendered.targets.is_empty());
    }

    #[test]
    fn test_empty_content_rejected() {
        let mut template = template();
        template.content = String::new();

        let err = TemplateRenderer::new()
            .render(&template, &Map::new(), None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::EmptyContent));
    }

    #[test]
    fn test_broken_content_fails_but_broken_url_is_skipped() {
        let renderer = TemplateRenderer::new();

        let mut broken_url = template();
        broken_url.url = "{{#if}}".to_string();
        let rendered = renderer
            .render(&broken_url, &payload(json!({"id": "1"})), None)
            .unwrap();
        assert!(rendered.url.is_none());

        let mut broken_content = template();
        broken_content.content = "{{#each items}}".to_string();
        let err = renderer
            .render(&broken_content, &payload(json!({"id": "1"})), None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Render { field: "content", .. }));
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut template = template();
        template.title = String::new();

        let err = TemplateRenderer::new()
            .render(&template, &payload(json!({"id": "42"})), None)
            .unwrap_err();
        assert!(matches!(err, TemplateError::EmptyTitle));
    }

    #[test]
    fn test_blank_content_is_not_empty() {
        let mut template = template();
        template.content = "  ".to_string();

        let rendered = TemplateRenderer::new()
            .render(&template, &payload(json!({"id": "1"})), None)
            .unwrap();
        assert_eq!(rendered.content, "  ");
    }

    #[test]
    fn test_optional_fields_are_not_trimmed() {
        let mut template = template();
        template.url = " https://shop.example.com/{{id}} ".to_string();

        let rendered = TemplateRenderer::new()
            .render(&template, &payload(json!({"id": "9", "image": "https://img/9.png\n"})), None)
            .unwrap();
        assert_eq!(rendered.url.as_deref(), Some(" https://shop.example.com/9 "));
        assert_eq!(rendered.image.as_deref(), Some("https://img/9.png\n"));
    }
}
