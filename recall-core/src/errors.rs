//! Error types for the memory orchestration core
//!
//! Client-input errors (`InvalidIdentity`, `MissingSessionScope`,
//! `InvalidTopK`) are raised before any backend or model call. Backend
//! faults are reported as `MemoryBackendUnavailable` and model faults as
//! `ModelInvocationError`; neither is retried here.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the orchestration core
#[derive(Error, Debug)]
pub enum RecallError {
    /// The user identity is empty or malformed
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// A session-scoped operation was requested without a session id
    #[error("session_id is required when scope='session'")]
    MissingSessionScope,

    /// The requested result bound is not a positive integer
    #[error("Invalid top_k: {value} (must be a positive integer)")]
    InvalidTopK {
        /// Value supplied by the caller
        value: i64,
    },

    /// The memory backend could not be reached or rejected the call
    #[error("Memory backend unavailable: {0}")]
    MemoryBackendUnavailable(String),

    /// The external model failed to produce a response
    #[error("Model invocation failed: {message}")]
    ModelInvocationError {
        /// Failure description
        message: String,
        /// Upstream HTTP status if available
        status: Option<u16>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, RecallError>;

/// Stable, serializable classification of a [`RecallError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty or malformed user identity
    InvalidIdentity,
    /// Session scope requested without a session id
    MissingSessionScope,
    /// Non-positive top-k
    InvalidTopK,
    /// Memory backend fault
    MemoryBackendUnavailable,
    /// Model collaborator fault
    ModelInvocationError,
    /// Configuration problem
    Configuration,
    /// Payload could not be encoded or decoded
    Serialization,
}

impl ErrorKind {
    /// Snake-case name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidIdentity => "invalid_identity",
            ErrorKind::MissingSessionScope => "missing_session_scope",
            ErrorKind::InvalidTopK => "invalid_top_k",
            ErrorKind::MemoryBackendUnavailable => "memory_backend_unavailable",
            ErrorKind::ModelInvocationError => "model_invocation_error",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RecallError {
    /// Create a new InvalidIdentity error
    pub fn invalid_identity(message: impl Into<String>) -> Self {
        Self::InvalidIdentity(message.into())
    }

    /// Create a new MemoryBackendUnavailable error
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::MemoryBackendUnavailable(message.into())
    }

    /// Create a new ModelInvocationError without an upstream status
    pub fn model(message: impl Into<String>) -> Self {
        Self::ModelInvocationError {
            message: message.into(),
            status: None,
        }
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentity(_) => ErrorKind::InvalidIdentity,
            Self::MissingSessionScope => ErrorKind::MissingSessionScope,
            Self::InvalidTopK { .. } => ErrorKind::InvalidTopK,
            Self::MemoryBackendUnavailable(_) => ErrorKind::MemoryBackendUnavailable,
            Self::ModelInvocationError { .. } => ErrorKind::ModelInvocationError,
            Self::ConfigError(_) => ErrorKind::Configuration,
            Self::JsonError(_) => ErrorKind::Serialization,
        }
    }

    /// Check if the error was caused by caller input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentity(_) | Self::MissingSessionScope | Self::InvalidTopK { .. }
        )
    }

    /// Check if the error belongs to the memory layer and may be degraded
    /// into a diagnostic instead of failing the invocation
    pub fn is_memory_fault(&self) -> bool {
        matches!(self, Self::MemoryBackendUnavailable(_))
    }
}
