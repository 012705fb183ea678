use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ChatError, Result};

pub const DEFAULT_SERVER: &str = "http://localhost:5000";
pub const DEFAULT_ENDPOINT: &str = "/api/chat";
pub const SERVER_ENV_VAR: &str = "CHATBUBBLE_SERVER";

const DEFAULT_GREETING: &str = "**👋 Hello!** I'm your Australia Visa Assistant. I can help you with:\n\
• Understanding visa requirements\n\
• Completing documents\n\
• Answering visa questions\n\n\
Ask me anything about Australian visas!";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WidgetConfig {
    /// Base URL of the chat server, without a trailing slash
    pub server: String,
    pub endpoint: String,
    pub title: String,
    pub subtitle: String,
    pub greeting: String,
    pub placeholder: String,
    /// Prefix for element identifiers, e.g. `chat` gives `chat-toggle`
    pub id_prefix: String,
    pub focus_delay_ms: u64,
    /// Extra JSON sent as `context` with every message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            title: "🧠 AI Visa Assistant".to_string(),
            subtitle: "Powered by real-time search".to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            placeholder: "Ask about visa requirements...".to_string(),
            id_prefix: "chat".to_string(),
            focus_delay_ms: 100,
            context: None,
        }
    }
}

impl WidgetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the default location, then apply the environment override.
    /// A missing file gives the defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: WidgetConfig = serde_json::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    /// `CHATBUBBLE_SERVER` replaces the configured server when set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(server) = std::env::var(SERVER_ENV_VAR) {
            if !server.trim().is_empty() {
                self.server = server;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id_prefix.is_empty() {
            return Err(ChatError::Config("id_prefix must not be empty".to_string()));
        }
        if !self.endpoint.starts_with('/') {
            return Err(ChatError::Config(format!(
                "endpoint must start with '/': {}",
                self.endpoint
            )));
        }
        Ok(())
    }

    /// Full URL of the chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}{}", self.server.trim_end_matches('/'), self.endpoint)
    }

    /// URL of the conversation reset endpoint, next to the chat endpoint
    pub fn clear_url(&self) -> String {
        format!("{}/clear", self.chat_url())
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }

    /// Element id for one of the widget's parts, e.g. `element_id("toggle")`
    pub fn element_id(&self, part: &str) -> String {
        format!("{}-{}", self.id_prefix, part)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ChatError::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("chatbubble").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = WidgetConfig::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, WidgetConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = WidgetConfig::new();
        config.server = "https://visa.example".to_string();
        config.context = Some(serde_json::json!({"page": "checklist"}));
        config.save_to(&path).unwrap();

        let loaded = WidgetConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"server": "http://10.0.0.2:8080/"}"#).unwrap();
        let config = WidgetConfig::load_from(&path).unwrap();
        assert_eq!(config.chat_url(), "http://10.0.0.2:8080/api/chat");
        assert_eq!(config.clear_url(), "http://10.0.0.2:8080/api/chat/clear");
        assert_eq!(config.focus_delay_ms, 100);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"id_prefix": ""}"#).unwrap();
        assert!(matches!(
            WidgetConfig::load_from(&path),
            Err(ChatError::Config(_))
        ));
    }

    #[test]
    fn test_element_ids() {
        let config = WidgetConfig::default();
        assert_eq!(config.element_id("toggle"), "chat-toggle");
        assert_eq!(config.element_id("messages"), "chat-messages");
    }
}
