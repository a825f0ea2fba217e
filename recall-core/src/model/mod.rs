//! Language model collaborators
//!
//! The orchestrator only needs `generate(augmented_prompt) -> text`; the
//! provider behind it is chosen at startup.

mod echo;
mod openai;

pub use echo::EchoModel;
pub use openai::{OpenAiClient, OpenAiConfig};

use async_trait::async_trait;

use crate::{errors::Result, prompt::AugmentedPrompt};

/// Text generation backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a response for an augmented prompt.
    ///
    /// Failures are reported as `ModelInvocationError` and are not retried.
    async fn generate(&self, prompt: &AugmentedPrompt) -> Result<String>;

    /// Model identifier, for logs
    fn model_name(&self) -> &str;
}
