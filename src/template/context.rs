//! The per-render resolution context and dotted path lookup.

use serde_json::Value;

use crate::panel::JsonMap;

/// The first segment of a placeholder path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    /// `self`, the server's own config.
    SelfInfo,
    /// `server`, panel metadata.
    Server,
    /// `settings`, daemon data.
    Settings,
    /// `regex`, console log captures.
    Regex,
}

impl Root {
    /// `None` for an unknown root.
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "self" => Some(Root::SelfInfo),
            "server" => Some(Root::Server),
            "settings" => Some(Root::Settings),
            "regex" => Some(Root::Regex),
            _ => None,
        }
    }
}

/// Values placeholders are resolved against. Built fresh for every render.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    /// Always present.
    pub self_info: Value,
    /// Present only when fetched.
    pub server: Option<Value>,
    /// Present only when fetched.
    pub settings: Option<Value>,
    /// Captures of the log patterns.
    pub regex: Option<Value>,
}

impl ResolutionContext {
    /// A context with only the `self` root.
    pub fn new(self_info: Value) -> Self {
        Self {
            self_info,
            ..Default::default()
        }
    }

    /// Set the `server` root.
    pub fn with_server(mut self, server: Option<JsonMap>) -> Self {
        self.server = server.map(Value::Object);
        self
    }

    /// Set the `settings` root.
    pub fn with_settings(mut self, settings: Option<JsonMap>) -> Self {
        self.settings = settings.map(Value::Object);
        self
    }

    /// Set the `regex` root.
    pub fn with_regex(mut self, regex: Option<JsonMap>) -> Self {
        self.regex = regex.map(Value::Object);
        self
    }

    /// The value behind a root, if it was fetched.
    fn root(&self, root: Root) -> Option<&Value> {
        match root {
            Root::SelfInfo => Some(&self.self_info),
            Root::Server => self.server.as_ref(),
            Root::Settings => self.settings.as_ref(),
            Root::Regex => self.regex.as_ref(),
        }
    }

    /// Walk a dotted path.
    ///
    /// Every segment after the root is a key lookup in a JSON object; anything else
    /// (arrays included) ends the walk. `null` counts as not found.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let root = Root::parse(segments.next()?)?;
        let mut current = self.root(root)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                _ => return None,
            };
        }

        match current {
            Value::Null => None,
            value => Some(value),
        }
    }
}

/// The text inserted in place of a placeholder.
///
/// Strings are JSON-escaped without the surrounding quotes so they can sit inside
/// a string literal of the template. Everything else is its compact JSON form, so an
/// object or array placed inside a string literal makes the template unparsable.
pub fn replacement_text(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let quoted = Value::String(s.clone()).to_string();
            quoted[1..quoted.len() - 1].to_string()
        }
        other => other.to_string(),
    }
}
