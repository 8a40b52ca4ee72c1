use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub reasoning: ReasoningConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningProvider {
    Ollama,
    Rules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReasoningConfig {
    pub provider: ReasoningProvider,
    pub model: String,
    pub endpoint: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// May be set in the file; `REASONING_API_KEY` overrides it.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RendererConfig {
    pub narration: bool,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            narration: false,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// Remote collaborator URLs; an absent URL selects the in-process stub.
#[derive(Debug, Deserialize, Clone)]
pub struct ToolsConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub note_maker_url: Option<String>,
    pub flashcard_generator_url: Option<String>,
    pub concept_explainer_url: Option<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            note_maker_url: None,
            flashcard_generator_url: None,
            concept_explainer_url: None,
        }
    }
}

impl ToolsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

fn default_top_p() -> f32 {
    0.9
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_toml(&content)?;

        // Override with environment variable if set
        if let Ok(key) = std::env::var("REASONING_API_KEY") {
            config.reasoning.api_key = Some(key);
        }

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }
}
