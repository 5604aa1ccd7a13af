//! Embed templates.
//!
//! A template is JSON text containing `${root.path.to.value}` placeholders. Rendering
//! scans the placeholders, fetches only the panel data they need, resolves each
//! path against a [ResolutionContext] and substitutes the results textually before
//! parsing the text as JSON.
//!
//! Roots are `self` (the server's config), `server` (panel metadata), `settings`
//! (daemon data) and `regex` (captures from the console log after running the
//! server's command).

mod context;

use std::sync::OnceLock;

use regex::Captures;
use regex::Regex;
use serde_json::Value;
use tracing::instrument;

use crate::error::ConfigError;
use crate::error::PanelError;
use crate::error::RenderError;
use crate::error::TemplateError;
use crate::panel::JsonMap;
use crate::panel::LogPattern;
use crate::panel::Panel;
use context::replacement_text;
pub use context::ResolutionContext;

/// Matches `${...}`, capturing the path.
fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\$\{([^}]*)\}").expect("placeholder regex is valid"))
}

/// A `${path}` occurrence in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// The exact text, `${...}` included.
    pub source: &'a str,
    /// The dotted path inside the braces.
    pub path: &'a str,
}

/// Find every placeholder, in order.
pub fn scan(template: &str) -> Vec<Placeholder<'_>> {
    placeholder_regex()
        .captures_iter(template)
        .filter_map(|caps| {
            Some(Placeholder {
                source: caps.get(0)?.as_str(),
                path: caps.get(1)?.as_str(),
            })
        })
        .collect()
}

/// Which panel data a template needs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Sources {
    /// Fetch panel metadata.
    pub server: bool,
    /// Fetch daemon data.
    pub settings: bool,
    /// Run the command and scrape the console log.
    pub regex: bool,
}

impl Sources {
    /// Each root is detected on its own, a template may need all three.
    pub fn classify(placeholders: &[Placeholder]) -> Self {
        let starts = |prefix: &str| placeholders.iter().any(|p| p.path.starts_with(prefix));
        Sources {
            server: starts("server."),
            settings: starts("settings."),
            regex: starts("regex."),
        }
    }
}

/// Apply every pattern to the log. Later matches of the same pattern overwrite earlier ones.
pub fn capture(patterns: &[LogPattern], logs: &str) -> JsonMap {
    let mut captures = JsonMap::new();
    for pattern in patterns {
        for caps in pattern.regex.captures_iter(logs) {
            if let Some(group) = caps.get(1) {
                captures.insert(pattern.name.clone(), Value::String(group.as_str().to_string()));
            }
        }
    }
    captures
}

/// Replace each placeholder occurrence once. Unresolved ones are left as they are.
pub fn substitute(template: &str, context: &ResolutionContext) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            let path = caps.get(1).map_or("", |m| m.as_str());
            match context.lookup(path) {
                Some(value) => replacement_text(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Run the server's command and scrape the log written since just before it.
async fn scrape<P: Panel + ?Sized>(panel: &P, command: &str) -> Result<JsonMap, PanelError> {
    let since = chrono::Utc::now().timestamp() - 1;
    panel.send_command(command).await?;
    let logs = panel.logs_since(since).await?;
    Ok(capture(&panel.config().patterns, &logs))
}

/// Render template text for the server behind `panel`.
#[instrument(skip_all, fields(server = %panel.config().id))]
pub async fn render_text<P: Panel + ?Sized>(panel: &P, template: &str) -> Result<Value, RenderError> {
    let config = panel.config();
    let placeholders = scan(template);
    let sources = Sources::classify(&placeholders);
    tracing::debug!(placeholders = placeholders.len(), ?sources, "Scanned template.");

    let command = match (sources.regex, config.command.as_deref()) {
        (true, None) => {
            return Err(ConfigError::MissingCommand {
                id: config.id.clone(),
            }
            .into())
        }
        (true, Some(command)) => Some(command),
        (false, _) => None,
    };

    let server = async {
        if sources.server {
            panel.server().await.map(Some)
        } else {
            Ok(None)
        }
    };
    let settings = async {
        if sources.settings {
            panel.settings().await.map(Some)
        } else {
            Ok(None)
        }
    };
    let regex = async {
        match command {
            Some(command) => scrape(panel, command).await.map(Some),
            None => Ok(None),
        }
    };
    let (server, settings, regex) = tokio::try_join!(server, settings, regex)?;

    let context = ResolutionContext::new(config.self_view())
        .with_server(server)
        .with_settings(settings)
        .with_regex(regex);

    for placeholder in placeholders.iter().filter(|p| context.lookup(p.path).is_none()) {
        tracing::debug!(placeholder = placeholder.source, "Placeholder left unresolved.");
    }

    let text = substitute(template, &context);
    serde_json::from_str(&text).map_err(|e| TemplateError::Parse(e).into())
}

/// Load the server's template and render it.
pub async fn render<P: Panel + ?Sized>(panel: &P) -> Result<Value, RenderError> {
    let template = panel.config().template.load().await?;
    render_text(panel, &template).await
}
