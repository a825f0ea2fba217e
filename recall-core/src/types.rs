//! Type definitions for the orchestration core
//!
//! This module contains the records exchanged with the memory backend,
//! the invocation request/result pair and the strongly typed diagnostics
//! that are attached to every invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::{RecallError, Result};
use crate::namespace::Namespace;

/// Default bound on ranked long-term results
pub const DEFAULT_TOP_K: usize = 5;

/// Scope of a memory query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    /// Long-lived, per-user scope
    #[default]
    Profile,
    /// Short-lived, per-session scope
    Session,
}

impl std::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryScope::Profile => write!(f, "profile"),
            MemoryScope::Session => write!(f, "session"),
        }
    }
}

/// Positive bound on the number of ranked results requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TopK(usize);

impl TopK {
    /// Validate a caller-supplied bound
    pub fn new(value: i64) -> Result<Self> {
        if value <= 0 {
            return Err(RecallError::InvalidTopK { value });
        }
        Ok(Self(value as usize))
    }

    /// The bound as a count
    pub fn get(self) -> usize {
        self.0
    }
}

impl Default for TopK {
    fn default() -> Self {
        Self(DEFAULT_TOP_K)
    }
}

/// A unit of stored interaction, as seen through the memory backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Backend-assigned identifier
    pub id: String,
    /// Owning namespace
    pub namespace: Namespace,
    /// Textual content
    pub content: String,
    /// Optional structured metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// Relevance score, present on search hits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl MemoryRecord {
    /// Create a new record with a fresh id and the current time
    pub fn new(namespace: Namespace, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            namespace,
            content: content.into(),
            metadata: None,
            created_at: Utc::now(),
            score: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach a relevance score
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// A scoped memory search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Identity owning the memory
    pub user_id: String,
    /// Query text
    pub query: String,
    /// Which namespace to search
    #[serde(default)]
    pub scope: MemoryScope,
    /// Required iff `scope` is `session`
    #[serde(default)]
    pub session_id: Option<String>,
    /// Result bound; the configured default applies when absent
    #[serde(default)]
    pub top_k: Option<i64>,
}

impl MemoryQuery {
    /// Search the user's profile namespace
    pub fn profile(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            scope: MemoryScope::Profile,
            session_id: None,
            top_k: None,
        }
    }

    /// Search one session namespace
    pub fn session(
        user_id: impl Into<String>,
        query: impl Into<String>,
        session_id: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            query: query.into(),
            scope: MemoryScope::Session,
            session_id,
            top_k: None,
        }
    }

    /// Set the result bound
    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> i64 {
    DEFAULT_TOP_K as i64
}

/// A single assistant invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Caller identity
    pub user_id: String,
    /// User prompt
    pub prompt: String,
    /// Session to continue; a new one is generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
    /// Search the profile namespace for supplementary context
    #[serde(default = "default_true")]
    pub use_long_term: bool,
    /// Leave capture to the backend's hooks
    #[serde(default)]
    pub use_hooks: bool,
    /// Bound on long-term hits
    #[serde(default = "default_top_k")]
    pub long_term_top_k: i64,
}

impl InvocationRequest {
    /// Create a request with default flags
    pub fn new(user_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            prompt: prompt.into(),
            session_id: None,
            use_long_term: default_true(),
            use_hooks: false,
            long_term_top_k: default_top_k(),
        }
    }

    /// Continue an existing session
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Toggle hook-driven capture
    pub fn with_hooks(mut self, use_hooks: bool) -> Self {
        self.use_hooks = use_hooks;
        self
    }

    /// Configure long-term retrieval
    pub fn with_long_term(mut self, enabled: bool, top_k: i64) -> Self {
        self.use_long_term = enabled;
        self.long_term_top_k = top_k;
        self
    }
}

/// States of a single invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvocationState {
    /// Deriving namespaces
    Resolving,
    /// Fetching session memory and searching the profile
    Retrieving,
    /// Waiting on the model
    Generating,
    /// Persisting the new turn
    Capturing,
    /// Completed; the response reached the caller
    Done,
    /// Bad input; nothing was called
    Rejected,
    /// The model failed
    Failed,
}

impl InvocationState {
    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::Failed)
    }
}

/// Diagnostics attached to an invocation result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugInfo {
    /// Session namespace the turn was read from and written to
    pub namespace: String,
    /// Profile namespace searched for long-term context
    pub profile_namespace: String,
    /// Whether capture was left to backend hooks
    pub hooks_enabled: bool,
    /// Whether this invocation wrote the turn itself
    pub explicit_capture: bool,
    /// Whether long-term snippets made it into the prompt
    pub long_term_injected: bool,
    /// Whether any retrieval scope failed
    pub retrieval_degraded: bool,
    /// Session records used as context
    pub session_count: usize,
    /// Long-term hits returned by the backend
    pub long_term_count: usize,
    /// Ranked long-term hits
    pub hits: Vec<MemoryRecord>,
    /// Non-fatal memory-layer problems, keyed by stage
    pub warnings: BTreeMap<String, String>,
    /// State-machine trace
    pub states: Vec<InvocationState>,
}

impl DebugInfo {
    /// Record a non-fatal problem
    pub fn warn(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.warnings.insert(key.into(), message.into());
    }
}

/// Outcome of a successful invocation
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    /// Memory resource the invocation read from and wrote to
    pub memory_id: String,
    /// Resolved actor identity
    pub actor_id: String,
    /// Session used; newly generated when the request carried none
    pub session_id: String,
    /// Model output
    pub result_text: String,
    /// Diagnostics
    pub debug: DebugInfo,
}

/// Speaker of a captured message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// The user prompt
    User,
    /// The model reply
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}
