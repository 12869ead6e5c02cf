use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Trends RSS feed polled by the refresh endpoint
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Bearer token required by the admin API
    pub admin_token: String,
    #[serde(default)]
    pub ai: AiConfig,
}

fn default_feed_url() -> String {
    "https://trends.google.com/trending/rss?geo=US".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AiConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            model: default_model(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `AI_API_KEY` and `ADMIN_TOKEN` if set, so secrets can stay out
    /// of the config file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("AI_API_KEY") {
            if !key.is_empty() {
                self.ai.api_key = key;
            }
        }
        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            if !token.is_empty() {
                self.admin_token = token;
            }
        }
        self
    }
}
