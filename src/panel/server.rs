//! Immutable description of a managed game server.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use url::Url;

use crate::error::ConfigError;
use crate::error::RenderError;
use crate::error::TemplateError;

/// Matches the `/server/<hex-id>` segment of a panel url.
fn server_segment() -> &'static Regex {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT.get_or_init(|| {
        Regex::new(r"(?i)/server/([0-9a-f]+)(?:[/?#]|$)").expect("server segment regex is valid")
    })
}

/// A `[[servers]]` entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Full url of the server page, e.g. `https://panel.example.com/server/1a2b3c4d`.
    pub server_url: String,
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret.
    pub client_secret: String,
    /// Console command to run before scraping logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Named patterns applied to the console log, `name = "pattern"`.
    #[serde(default)]
    pub regex: BTreeMap<String, String>,
    /// See [TemplateSource].
    pub embed_template: TemplateSource,
}

/// Where the embed template of a server comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateSource {
    /// Path to a JSON file, read again on every render.
    File(PathBuf),
    /// A table written directly in the config.
    Inline(Map<String, Value>),
}

impl TemplateSource {
    /// Produce the raw template text.
    pub async fn load(&self) -> Result<String, RenderError> {
        match self {
            TemplateSource::File(path) => {
                tokio::fs::read_to_string(path).await.map_err(|source| {
                    ConfigError::TemplateRead {
                        path: path.display().to_string(),
                        source,
                    }
                    .into()
                })
            }
            TemplateSource::Inline(map) => serde_json::to_string(map)
                .map_err(|e| TemplateError::Serialize(e).into()),
        }
    }
}

/// A named console log pattern.
#[derive(Debug, Clone)]
pub struct LogPattern {
    /// Key under the `regex` root.
    pub name: String,
    /// Group 1 of the last match is the value.
    pub regex: Regex,
}

/// Everything needed to talk to one server on a panel.
/// Built once from a [ServerEntry] and never changed.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server id on the panel.
    pub id: String,
    /// Panel root, without a trailing `/`.
    pub root_url: String,
    /// `host[:port]` of the panel.
    pub host: String,
    /// The url this config was made from.
    pub server_url: String,
    /// OAuth2 client id.
    pub client_id: String,
    /// OAuth2 client secret, never shown to templates.
    pub client_secret: String,
    /// Console command, `None` if blank.
    pub command: Option<String>,
    /// Compiled `regex` table.
    pub patterns: Vec<LogPattern>,
    /// The embed template.
    pub template: TemplateSource,
}

impl TryFrom<ServerEntry> for ServerConfig {
    type Error = ConfigError;

    fn try_from(entry: ServerEntry) -> Result<Self, Self::Error> {
        let invalid = || ConfigError::InvalidServerUrl {
            url: entry.server_url.clone(),
        };

        let captures = server_segment()
            .captures(&entry.server_url)
            .ok_or_else(invalid)?;
        let segment = captures.get(0).ok_or_else(invalid)?;
        let id = captures.get(1).ok_or_else(invalid)?.as_str().to_string();

        // Everything in front of `/server/<id>` is the panel root.
        let root_url = entry.server_url[..segment.start()]
            .trim_end_matches('/')
            .to_string();
        let root = Url::parse(&root_url).map_err(|_| invalid())?;
        let host = match (root.host_str(), root.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(invalid()),
        };

        let patterns = entry
            .regex
            .iter()
            .map(|(name, pattern)| {
                Regex::new(pattern)
                    .map(|regex| LogPattern {
                        name: name.clone(),
                        regex,
                    })
                    .map_err(|source| ConfigError::InvalidRegex {
                        name: name.clone(),
                        url: entry.server_url.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ServerConfig {
            id,
            root_url,
            host,
            server_url: entry.server_url,
            client_id: entry.client_id,
            client_secret: entry.client_secret,
            command: entry.command.filter(|c| !c.trim().is_empty()),
            patterns,
            template: entry.embed_template,
        })
    }
}

/// The parts of a [ServerConfig] templates may see. Never includes the secret.
#[derive(Serialize)]
#[allow(clippy::missing_docs_in_private_items)]
struct SelfView<'a> {
    id: &'a str,
    root_url: &'a str,
    host: &'a str,
    server_url: &'a str,
    client_id: &'a str,
    command: Option<&'a str>,
}

impl ServerConfig {
    /// The `self` root of a template's resolution context.
    pub fn self_view(&self) -> Value {
        let view = SelfView {
            id: &self.id,
            root_url: &self.root_url,
            host: &self.host,
            server_url: &self.server_url,
            client_id: &self.client_id,
            command: self.command.as_deref(),
        };
        serde_json::to_value(view).unwrap_or(Value::Null)
    }

    /// Build an endpoint url from a path starting with `/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.root_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> ServerEntry {
        ServerEntry {
            server_url: url.to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            command: None,
            regex: BTreeMap::new(),
            embed_template: TemplateSource::Inline(Map::new()),
        }
    }

    #[test]
    fn derives_root_and_id() {
        let config = ServerConfig::try_from(entry("https://panel.example.com/server/1A2b3c")).unwrap();
        assert_eq!(config.id, "1A2b3c");
        assert_eq!(config.root_url, "https://panel.example.com");
        assert_eq!(config.host, "panel.example.com");
        assert_eq!(config.endpoint("/oauth2/token"), "https://panel.example.com/oauth2/token");
    }

    #[test]
    fn keeps_sub_path_and_port() {
        let config =
            ServerConfig::try_from(entry("http://10.0.0.2:8080/puffer/server/deadbeef/console"))
                .unwrap();
        assert_eq!(config.id, "deadbeef");
        assert_eq!(config.root_url, "http://10.0.0.2:8080/puffer");
        assert_eq!(config.host, "10.0.0.2:8080");
    }

    #[test]
    fn rejects_bad_urls() {
        for url in [
            "https://panel.example.com/servers/abc",
            "https://panel.example.com/server/",
            "https://panel.example.com/server/xyz",
            "https://panel.example.com/server/abcxyz",
            "/server/abc",
        ] {
            let result = ServerConfig::try_from(entry(url));
            assert!(
                matches!(result, Err(ConfigError::InvalidServerUrl { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_bad_regex() {
        let mut entry = entry("https://panel.example.com/server/abc");
        entry.regex.insert("players".to_string(), "Players: (\\d+".to_string());
        let result = ServerConfig::try_from(entry);
        assert!(matches!(result, Err(ConfigError::InvalidRegex { name, .. }) if name == "players"));
    }

    #[test]
    fn self_view_hides_secret() {
        let config = ServerConfig::try_from(entry("https://panel.example.com/server/abc")).unwrap();
        let view = config.self_view();
        assert_eq!(view["id"], "abc");
        assert!(view.get("client_secret").is_none());
        assert!(!view.to_string().contains("secret"));
    }

    #[test]
    fn blank_command_is_none() {
        let mut entry = entry("https://panel.example.com/server/abc");
        entry.command = Some("  ".to_string());
        assert!(ServerConfig::try_from(entry).unwrap().command.is_none());
    }

    #[test]
    fn template_source_from_toml() {
        let text = r#"
            server_url = "https://panel.example.com/server/abc"
            client_id = "id"
            client_secret = "secret"
            embed_template = "templates/status.json"
        "#;
        let entry: ServerEntry = toml::from_str(text).unwrap();
        assert!(matches!(entry.embed_template, TemplateSource::File(_)));

        let text = r#"
            server_url = "https://panel.example.com/server/abc"
            client_id = "id"
            client_secret = "secret"

            [regex]
            players = "Players: (\\d+)"

            [embed_template]
            title = "${server.name}"
            color = 3447003
        "#;
        let entry: ServerEntry = toml::from_str(text).unwrap();
        assert_eq!(entry.regex["players"], "Players: (\\d+)");
        match entry.embed_template {
            TemplateSource::Inline(map) => assert_eq!(map["title"], "${server.name}"),
            other => panic!("expected inline template, got {other:?}"),
        }
    }
}
