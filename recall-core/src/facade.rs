//! Memory access facade
//!
//! Single entry point for get/search/put against the configured backend.
//! Owns the backend handle for the lifetime of the process: `connect` at
//! startup, `close` at shutdown.

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    backend::{CaptureMode, MemoryBackend},
    errors::{RecallError, Result},
    namespace::Namespace,
    types::{MemoryRecord, Role},
};

/// Result of a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The record was written by this call
    Written,
    /// Nothing was written; the backend records the turn through its hooks
    DelegatedToBackend,
}

/// Facade over the memory backend
pub struct MemoryFacade {
    backend: Arc<dyn MemoryBackend>,
    memory_id: String,
}

impl MemoryFacade {
    /// Initialize the backend and wrap it
    pub async fn connect(backend: Arc<dyn MemoryBackend>) -> Result<Self> {
        let memory_id = backend.init().await?;
        info!(
            "Memory facade connected to {} (capture mode: {:?})",
            memory_id,
            backend.capture_mode()
        );
        Ok(Self { backend, memory_id })
    }

    /// Wrap an already initialized backend
    pub fn new(backend: Arc<dyn MemoryBackend>, memory_id: impl Into<String>) -> Self {
        Self {
            backend,
            memory_id: memory_id.into(),
        }
    }

    /// Id of the memory resource in use
    pub fn memory_id(&self) -> &str {
        &self.memory_id
    }

    /// Capture mode that applies to a request.
    ///
    /// Hooks requested by the caller, or a backend that only records
    /// through hooks, both mean the orchestrator must not write.
    pub fn effective_mode(&self, use_hooks: bool) -> CaptureMode {
        if use_hooks || !self.backend.supports_explicit_capture() {
            CaptureMode::Auto
        } else {
            CaptureMode::Explicit
        }
    }

    /// Recent records of a namespace, in backend order
    pub async fn fetch(&self, namespace: &Namespace, limit: usize) -> Result<Vec<MemoryRecord>> {
        let records = self.backend.fetch(namespace, limit).await?;
        debug!("Fetched {} records from {}", records.len(), namespace);
        Ok(records)
    }

    /// Records of a namespace ranked by relevance, descending.
    ///
    /// Hits carrying a score are stably re-sorted so that ties and unscored
    /// hits keep the backend's order.
    pub async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let mut hits = self.backend.search(namespace, query, top_k).await?;
        if hits.iter().all(|h| h.score.is_some()) {
            hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        hits.truncate(top_k);
        debug!("Search in {} returned {} hits", namespace, hits.len());
        Ok(hits)
    }

    /// Persist one record unless `mode` delegates capture to the backend
    pub async fn capture(
        &self,
        mode: CaptureMode,
        namespace: &Namespace,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<CaptureOutcome> {
        if mode == CaptureMode::Auto {
            debug!("Capture into {} delegated to backend hooks", namespace);
            return Ok(CaptureOutcome::DelegatedToBackend);
        }
        self.backend.capture(namespace, content, metadata).await?;
        Ok(CaptureOutcome::Written)
    }

    /// Persist a prompt/response pair as two records, user first.
    ///
    /// A failure on the ASSISTANT record after the USER record landed says
    /// so in the error, since the namespace then holds half a turn.
    pub async fn capture_turn(
        &self,
        mode: CaptureMode,
        namespace: &Namespace,
        session_id: &str,
        prompt: &str,
        response: &str,
    ) -> Result<CaptureOutcome> {
        let metadata = |role: Role| {
            Some(serde_json::json!({
                "role": role.as_str(),
                "session_id": session_id,
            }))
        };

        if self
            .capture(mode, namespace, prompt, metadata(Role::User))
            .await?
            == CaptureOutcome::DelegatedToBackend
        {
            return Ok(CaptureOutcome::DelegatedToBackend);
        }
        self.capture(mode, namespace, response, metadata(Role::Assistant))
            .await
            .map_err(|e| {
                RecallError::backend_unavailable(format!(
                    "USER record written to {namespace}, ASSISTANT record failed: {e}"
                ))
            })
    }

    /// Release the backend
    pub async fn close(&self) -> Result<()> {
        info!("Closing memory facade for {}", self.memory_id);
        self.backend.close().await
    }
}
