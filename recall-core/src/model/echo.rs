use async_trait::async_trait;

use super::ModelClient;
use crate::{errors::Result, prompt::AugmentedPrompt};

/// Offline model that answers with the prompt it was given.
///
/// Useful to inspect what context an invocation would inject without
/// calling a provider.
#[derive(Debug, Default, Clone)]
pub struct EchoModel;

#[async_trait]
impl ModelClient for EchoModel {
    async fn generate(&self, prompt: &AugmentedPrompt) -> Result<String> {
        Ok(prompt.render())
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}
