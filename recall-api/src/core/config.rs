use config::{Config, ConfigError, Environment, File};
use recall_core::CaptureMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub memory: MemoryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    Echo,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default)]
    pub system_prompt: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackendKind {
    InMemory,
    Rest,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MemoryConfig {
    pub backend: MemoryBackendKind,
    pub capture_mode: CaptureMode,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub memory_id: Option<String>,
    pub memory_name: String,
    pub session_window: usize,
    pub default_top_k: usize,
    pub retain_long_term: bool,
    pub timeout_seconds: u64,
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl MemoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        Self::builder()?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("RECALL").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8008)?
            .set_default("model.provider", "openai")?
            .set_default("model.base_url", "https://api.openai.com")?
            .set_default("model.model_id", "gpt-4o-mini")?
            .set_default("model.max_tokens", 1024)?
            .set_default("model.temperature", 0.3)?
            .set_default("model.timeout_seconds", 60)?
            .set_default("memory.backend", "in_memory")?
            .set_default("memory.capture_mode", "explicit")?
            .set_default("memory.memory_name", "RecallMemory")?
            .set_default("memory.session_window", 12)?
            .set_default("memory.default_top_k", 5)?
            .set_default("memory.retain_long_term", true)?
            .set_default("memory.timeout_seconds", 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::defaults().unwrap();
        assert_eq!(settings.server.port, 8008);
        assert_eq!(settings.model.provider, ModelProvider::OpenAi);
        assert_eq!(settings.memory.backend, MemoryBackendKind::InMemory);
        assert_eq!(settings.memory.capture_mode, CaptureMode::Explicit);
        assert_eq!(settings.memory.default_top_k, 5);
        assert!(settings.memory.retain_long_term);
        assert!(settings.memory.endpoint.is_none());
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut settings = Settings::defaults().unwrap();
        settings.model.api_key = Some("sk-secret".to_string());
        settings.memory.api_key = Some("mem-secret".to_string());

        let dumped = serde_json::to_string(&settings).unwrap();
        assert!(!dumped.contains("secret"));
    }
}
