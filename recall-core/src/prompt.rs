//! Augmented prompt construction

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::planner::{ContextBundle, SnippetSource};

/// Base system prompt used when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful personal assistant. \
Use the remembered context below to personalize your answer and address the user by name when you know it. \
When recent conversation and long-term context disagree, prefer the recent conversation. \
Be concise and structured in your final response.";

const SESSION_HEADER: &str = "# Recent conversation (session)";
const LONG_TERM_HEADER: &str = "# Long-term user context (read-only)";

/// System context plus user prompt, as sent to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AugmentedPrompt {
    /// Base instructions, current time and remembered context
    pub system: String,
    /// The caller's prompt, unchanged
    pub user: String,
}

impl AugmentedPrompt {
    /// Single-text rendering for models without a system role
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Renders a [`ContextBundle`] into an [`AugmentedPrompt`]
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system_prompt: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    pub fn build(
        &self,
        bundle: &ContextBundle,
        user_prompt: &str,
        now: DateTime<Utc>,
    ) -> AugmentedPrompt {
        let mut system = format!(
            "{}\n\nHere's your current time: {}",
            self.system_prompt.trim(),
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        for (header, source) in [
            (SESSION_HEADER, SnippetSource::Session),
            (LONG_TERM_HEADER, SnippetSource::LongTerm),
        ] {
            let lines: Vec<String> = bundle
                .snippets_from(source)
                .map(|s| format!("- {}", s.text))
                .collect();
            if !lines.is_empty() {
                system.push_str("\n\n");
                system.push_str(header);
                system.push('\n');
                system.push_str(&lines.join("\n"));
            }
        }

        AugmentedPrompt {
            system,
            user: user_prompt.to_string(),
        }
    }
}
