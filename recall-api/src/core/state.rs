use anyhow::{Context, Result};
use recall_core::{
    AssistantOrchestrator, EchoModel, InMemoryBackend, InMemoryBackendConfig, MemoryBackend,
    MemoryFacade, MemorySearch, ModelClient, OpenAiClient, OpenAiConfig, OrchestratorConfig,
    RestBackendConfig, RestMemoryBackend, prompt::DEFAULT_SYSTEM_PROMPT,
};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::{MemoryBackendKind, MemoryConfig, ModelConfig, ModelProvider, Settings};

/// Shared handles built once at startup
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<MemoryFacade>,
    pub orchestrator: Arc<AssistantOrchestrator>,
    pub search: Arc<MemorySearch>,
}

impl AppState {
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = build_backend(&settings.memory)?;
        let facade = Arc::new(
            MemoryFacade::connect(backend)
                .await
                .context("memory backend failed to initialize")?,
        );
        let model = build_model(&settings.model)?;

        Ok(Self::new(facade, model, settings))
    }

    pub fn new(facade: Arc<MemoryFacade>, model: Arc<dyn ModelClient>, settings: &Settings) -> Self {
        let orchestrator = AssistantOrchestrator::new(
            facade.clone(),
            model,
            OrchestratorConfig {
                system_prompt: settings
                    .model
                    .system_prompt
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
                session_window: settings.memory.session_window,
                retain_long_term: settings.memory.retain_long_term,
            },
        );
        let search =
            MemorySearch::new(facade.clone()).with_default_top_k(settings.memory.default_top_k);

        Self {
            facade,
            orchestrator: Arc::new(orchestrator),
            search: Arc::new(search),
        }
    }
}

fn build_backend(config: &MemoryConfig) -> Result<Arc<dyn MemoryBackend>> {
    match config.backend {
        MemoryBackendKind::InMemory => {
            info!("Using in-memory memory backend");
            Ok(Arc::new(InMemoryBackend::new(InMemoryBackendConfig {
                memory_id: config.memory_id.clone(),
                capture_mode: config.capture_mode,
                ..Default::default()
            })))
        },
        MemoryBackendKind::Rest => {
            let endpoint = config
                .endpoint
                .clone()
                .context("memory.endpoint is required for the rest backend")?;
            info!("Using REST memory backend at {}", endpoint);
            let backend = RestMemoryBackend::new(RestBackendConfig {
                endpoint,
                api_key: config.api_key.clone(),
                memory_id: config.memory_id.clone(),
                memory_name: config.memory_name.clone(),
                capture_mode: config.capture_mode,
                request_timeout: config.timeout(),
                ..Default::default()
            })?;
            Ok(Arc::new(backend))
        },
    }
}

fn build_model(config: &ModelConfig) -> Result<Arc<dyn ModelClient>> {
    match config.provider {
        ModelProvider::Echo => {
            warn!("Using the echo model; responses will repeat the augmented prompt");
            Ok(Arc::new(EchoModel))
        },
        ModelProvider::OpenAi => {
            if config.api_key.is_none() {
                warn!("model.api_key is not set; requests to {} are unauthenticated", config.base_url);
            }
            let client = OpenAiClient::new(OpenAiConfig {
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                model_id: config.model_id.clone(),
                max_tokens: Some(config.max_tokens),
                temperature: Some(config.temperature),
                timeout: config.timeout(),
            })?;
            info!("Using model {} at {}", config.model_id, config.base_url);
            Ok(Arc::new(client))
        },
    }
}
