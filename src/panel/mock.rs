//! In-memory [Panel] used by tests.

use std::sync::Mutex;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use super::JsonMap;
use super::LogPattern;
use super::Panel;
use super::ServerConfig;
use crate::error::PanelError;

/// Answers with canned payloads and records every call in order.
#[allow(clippy::missing_docs_in_private_items)]
pub struct MockPanel {
    pub config: ServerConfig,
    pub server: Option<JsonMap>,
    pub settings: Option<JsonMap>,
    pub logs: String,
    pub calls: Mutex<Vec<String>>,
}

impl MockPanel {
    pub fn new(url: &str) -> Self {
        let mut config = crate::panel::tests::test_config(url, "secret");
        config.patterns.clear();
        Self {
            config,
            server: None,
            settings: None,
            logs: String::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_server(mut self, server: Value) -> Self {
        self.server = server.as_object().cloned();
        self
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings.as_object().cloned();
        self
    }

    pub fn with_logs(mut self, logs: &str) -> Self {
        self.logs = logs.to_string();
        self
    }

    pub fn with_pattern(mut self, name: &str, pattern: &str) -> Self {
        self.config.patterns.push(LogPattern {
            name: name.to_string(),
            regex: Regex::new(pattern).unwrap(),
        });
        self
    }

    pub fn without_command(mut self) -> Self {
        self.config.command = None;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unavailable() -> PanelError {
    PanelError::Status {
        status: 502,
        reason: "Bad Gateway".to_string(),
        body: "panel unavailable".to_string(),
    }
}

#[async_trait]
impl Panel for MockPanel {
    fn config(&self) -> &ServerConfig {
        &self.config
    }

    async fn server(&self) -> Result<JsonMap, PanelError> {
        self.record("server".to_string());
        self.server.clone().ok_or_else(unavailable)
    }

    async fn settings(&self) -> Result<JsonMap, PanelError> {
        self.record("settings".to_string());
        self.settings.clone().ok_or_else(unavailable)
    }

    async fn send_command(&self, command: &str) -> Result<(), PanelError> {
        self.record(format!("command {command}"));
        Ok(())
    }

    async fn logs_since(&self, epoch: i64) -> Result<String, PanelError> {
        self.record(format!("logs {epoch}"));
        Ok(self.logs.clone())
    }
}
