//! # recall-core
//!
//! Memory-scoped conversation orchestration for assistants that remember
//! their users.
//!
//! ## Overview
//!
//! Every user owns two kinds of memory:
//!
//! - **Session memory**: the turns of one conversation, stored under
//!   `/summaries/{actor}/{session}`
//! - **Profile memory**: durable facts about the user, stored under the
//!   stable pseudo-session `/summaries/{actor}/profile-{actor}`
//!
//! An invocation resolves those namespaces, reads recent session turns and
//! searches the profile with the prompt, renders both into the system
//! context, calls the model and writes the new turn back. Memory faults
//! degrade the answer's context but never block it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use recall_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let backend = Arc::new(InMemoryBackend::default());
//!     let facade = Arc::new(MemoryFacade::connect(backend).await?);
//!     let orchestrator = AssistantOrchestrator::new(
//!         facade,
//!         Arc::new(EchoModel),
//!         OrchestratorConfig::default(),
//!     );
//!
//!     let result = orchestrator
//!         .invoke(InvocationRequest::new("alice", "What's my favorite color?"))
//!         .await?;
//!     println!("{} ({})", result.result_text, result.session_id);
//!     Ok(())
//! }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Memory backends and the backend trait
pub mod backend;
mod errors;
/// Memory facade used by the orchestrator and search
pub mod facade;
/// Model collaborators
pub mod model;
/// Namespace resolution
pub mod namespace;
mod orchestrator;
/// Retrieval planning and context merging
pub mod planner;
/// Augmented prompt rendering
pub mod prompt;
mod search;
mod types;

pub use backend::{
    CaptureMode, InMemoryBackend, InMemoryBackendConfig, MemoryBackend, ResourceStatus,
    RestBackendConfig, RestMemoryBackend,
};
pub use errors::{ErrorKind, RecallError, Result};
pub use facade::{CaptureOutcome, MemoryFacade};
pub use model::{EchoModel, ModelClient, OpenAiClient, OpenAiConfig};
pub use namespace::{Namespace, ResolvedNamespaces, SessionPolicy};
pub use orchestrator::{
    AssistantOrchestrator, LONG_TERM_WRITE_ERROR, OrchestratorConfig, RETRIEVAL_ERROR,
    SHORT_TERM_WRITE_ERROR,
};
pub use planner::{ContextBundle, ContextSnippet, RetrievalPlanner, SnippetSource};
pub use prompt::{AugmentedPrompt, PromptBuilder};
pub use search::{MemorySearch, SearchOutcome};
pub use types::{
    DEFAULT_TOP_K, DebugInfo, InvocationRequest, InvocationResult, InvocationState, MemoryQuery,
    MemoryRecord, MemoryScope, Role, TopK,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AssistantOrchestrator, CaptureMode, EchoModel, InMemoryBackend, InvocationRequest,
        InvocationResult, MemoryBackend, MemoryFacade, MemoryQuery, MemoryScope, MemorySearch,
        ModelClient, OrchestratorConfig, RecallError, Result,
    };
}
