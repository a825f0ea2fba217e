//! Memory backend abstractions
//!
//! This module defines the MemoryBackend trait and its implementations for
//! talking to the durable memory store.

use crate::{errors::Result, namespace::Namespace, types::MemoryRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod in_memory;
pub mod mock;
mod rest;

pub use in_memory::{InMemoryBackend, InMemoryBackendConfig};
pub use rest::{RestBackendConfig, RestMemoryBackend};

/// How new turns reach the memory store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// The orchestrator writes each turn itself
    #[default]
    Explicit,
    /// The store observes interactions through hooks; explicit writes
    /// would double-record them
    Auto,
}

/// Status of the memory resource backing a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    /// Being provisioned
    Creating,
    /// Ready for reads and writes
    Active,
    /// Provisioning failed
    Failed,
    /// Being torn down
    Deleting,
    /// Gone
    Deleted,
}

impl ResourceStatus {
    /// Whether polling should stop at this status
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Creating)
    }
}

/// Contract consumed from the durable memory store
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// Ensure the memory resource exists and is usable; returns its id
    async fn init(&self) -> Result<String>;

    /// Most recent records of a namespace, oldest first, at most `limit`.
    /// An unknown namespace yields an empty sequence.
    async fn fetch(&self, namespace: &Namespace, limit: usize) -> Result<Vec<MemoryRecord>>;

    /// Records of a namespace ranked by relevance to `query`, at most `top_k`.
    /// An unknown namespace yields an empty sequence.
    async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>>;

    /// Persist one record
    async fn capture(
        &self,
        namespace: &Namespace,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Capture mode this backend was configured with
    fn capture_mode(&self) -> CaptureMode;

    /// Whether the orchestrator should write turns itself
    fn supports_explicit_capture(&self) -> bool {
        self.capture_mode() == CaptureMode::Explicit
    }

    /// Release the backend (default: no-op)
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_mode_serde() {
        let mode: CaptureMode = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(mode, CaptureMode::Auto);
        assert_eq!(CaptureMode::default(), CaptureMode::Explicit);
    }

    #[test]
    fn test_resource_status() {
        let status: ResourceStatus = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(status, ResourceStatus::Active);
        assert!(status.is_settled());
        assert!(!ResourceStatus::Creating.is_settled());
    }
}
