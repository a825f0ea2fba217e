use recall_core::{InvocationResult, SearchOutcome};
use serde::{Deserialize, Serialize};

/// `/invoke` body; the core type owns the wire defaults
pub use recall_core::InvocationRequest as InvokeRequest;

/// `/memories/search` body
pub use recall_core::MemoryQuery as MemorySearchRequest;

/// `debug` is opaque to clients
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvokeResponse {
    pub memory_id: String,
    pub actor_id: String,
    pub session_id: String,
    pub result_text: String,
    pub debug: serde_json::Value,
}

impl TryFrom<InvocationResult> for InvokeResponse {
    type Error = serde_json::Error;

    fn try_from(result: InvocationResult) -> Result<Self, Self::Error> {
        Ok(InvokeResponse {
            debug: serde_json::to_value(&result.debug)?,
            memory_id: result.memory_id,
            actor_id: result.actor_id,
            session_id: result.session_id,
            result_text: result.result_text,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MemorySearchResponse {
    pub memory_id: String,
    pub actor_id: String,
    pub namespace: String,
    pub hits: serde_json::Value,
}

impl TryFrom<SearchOutcome> for MemorySearchResponse {
    type Error = serde_json::Error;

    fn try_from(outcome: SearchOutcome) -> Result<Self, Self::Error> {
        Ok(MemorySearchResponse {
            hits: serde_json::to_value(&outcome.hits)?,
            memory_id: outcome.memory_id,
            actor_id: outcome.actor_id,
            namespace: outcome.namespace.to_string(),
        })
    }
}
