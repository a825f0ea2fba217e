//! In-memory backend implementation
//!
//! Stores records in a map guarded by a RwLock. Data is lost when the
//! process exits; suitable for development and single-instance deployments.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CaptureMode, MemoryBackend};
use crate::{errors::Result, namespace::Namespace, types::MemoryRecord};

/// Configuration for the in-memory backend
#[derive(Debug, Clone)]
pub struct InMemoryBackendConfig {
    /// Resource id reported by `init`; generated when absent
    pub memory_id: Option<String>,
    /// Capture mode to advertise
    pub capture_mode: CaptureMode,
    /// Oldest records are dropped past this many per namespace
    pub max_records_per_namespace: usize,
}

impl Default for InMemoryBackendConfig {
    fn default() -> Self {
        Self {
            memory_id: None,
            capture_mode: CaptureMode::Explicit,
            max_records_per_namespace: 1000,
        }
    }
}

/// In-memory implementation of MemoryBackend
pub struct InMemoryBackend {
    records: RwLock<HashMap<Namespace, Vec<MemoryRecord>>>,
    memory_id: String,
    config: InMemoryBackendConfig,
}

impl InMemoryBackend {
    pub fn new(config: InMemoryBackendConfig) -> Self {
        let memory_id = config
            .memory_id
            .clone()
            .unwrap_or_else(|| format!("mem-{}", Uuid::new_v4().simple()));
        Self {
            records: RwLock::new(HashMap::new()),
            memory_id,
            config,
        }
    }

    /// Insert a record directly, bypassing the capture mode
    pub fn seed(&self, record: MemoryRecord) {
        let mut records = self.records.write();
        records
            .entry(record.namespace.clone())
            .or_default()
            .push(record);
    }

    /// Number of records stored under a namespace
    pub fn len(&self, namespace: &Namespace) -> usize {
        self.records.read().get(namespace).map_or(0, Vec::len)
    }

    /// Whether a namespace holds no records
    pub fn is_empty(&self, namespace: &Namespace) -> bool {
        self.len(namespace) == 0
    }

    /// Lowercased alphanumeric terms of a text
    fn terms(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
            .map(str::to_lowercase)
            .collect()
    }

    /// Fraction of query terms present in the content
    fn keyword_match_score(query_terms: &[String], content: &str) -> f64 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let content_terms = Self::terms(content);
        let matches = query_terms
            .iter()
            .filter(|term| content_terms.contains(term))
            .count();

        matches as f64 / query_terms.len() as f64
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(InMemoryBackendConfig::default())
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    async fn init(&self) -> Result<String> {
        info!("Using in-memory memory resource {}", self.memory_id);
        Ok(self.memory_id.clone())
    }

    async fn fetch(&self, namespace: &Namespace, limit: usize) -> Result<Vec<MemoryRecord>> {
        let records = self.records.read();
        let Some(stored) = records.get(namespace) else {
            return Ok(vec![]);
        };
        let start = stored.len().saturating_sub(limit);
        Ok(stored[start..].to_vec())
    }

    async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        let query_terms = Self::terms(query);
        let mut hits: Vec<MemoryRecord> = {
            let records = self.records.read();
            let Some(stored) = records.get(namespace) else {
                return Ok(vec![]);
            };
            stored
                .iter()
                .filter_map(|record| {
                    let score = Self::keyword_match_score(&query_terms, &record.content);
                    (score > 0.0).then(|| record.clone().with_score(score))
                })
                .collect()
        };

        hits.sort_by(|a, b| {
            b.score
                .unwrap_or_default()
                .partial_cmp(&a.score.unwrap_or_default())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        debug!("InMemoryBackend: {} hits in {}", hits.len(), namespace);

        Ok(hits)
    }

    async fn capture(
        &self,
        namespace: &Namespace,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut record = MemoryRecord::new(namespace.clone(), content);
        record.metadata = metadata;
        record.created_at = Utc::now();

        let mut records = self.records.write();
        let stored = records.entry(namespace.clone()).or_default();
        stored.push(record);

        if stored.len() > self.config.max_records_per_namespace {
            let remove_count = stored.len() - self.config.max_records_per_namespace;
            stored.drain(0..remove_count);
            debug!("Trimmed {} old records from {}", remove_count, namespace);
        }

        Ok(())
    }

    fn capture_mode(&self) -> CaptureMode {
        self.config.capture_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(path: &str) -> Namespace {
        Namespace::new(path)
    }

    #[tokio::test]
    async fn test_fetch_returns_recent_window() {
        let backend = InMemoryBackend::default();
        let session = ns("/summaries/u1/s1");
        for i in 0..5 {
            backend
                .capture(&session, &format!("message {i}"), None)
                .await
                .unwrap();
        }

        let window = backend.fetch(&session, 3).await.unwrap();
        let contents: Vec<_> = window.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_empty() {
        let backend = InMemoryBackend::default();
        assert!(backend.fetch(&ns("/nope"), 10).await.unwrap().is_empty());
        assert!(
            backend
                .search(&ns("/nope"), "anything", 5)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_search_ranks_by_keyword_overlap() {
        let backend = InMemoryBackend::default();
        let profile = ns("/summaries/u1/profile-u1");
        backend.seed(MemoryRecord::new(profile.clone(), "lives in Irvine"));
        backend.seed(MemoryRecord::new(profile.clone(), "favorite color is blue"));
        backend.seed(MemoryRecord::new(profile.clone(), "likes the color green a bit"));

        let hits = backend
            .search(&profile, "What's my favorite color?", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].content, "favorite color is blue");
        assert!(hits[0].score.unwrap() > hits[1].score.unwrap());
    }

    #[tokio::test]
    async fn test_search_respects_top_k() {
        let backend = InMemoryBackend::default();
        let profile = ns("/p");
        for i in 0..4 {
            backend.seed(MemoryRecord::new(profile.clone(), format!("coffee note {i}")));
        }
        assert_eq!(backend.search(&profile, "coffee", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_capture_trims_oldest() {
        let backend = InMemoryBackend::new(InMemoryBackendConfig {
            max_records_per_namespace: 2,
            ..Default::default()
        });
        let session = ns("/s");
        for content in ["a1", "b2", "c3"] {
            backend.capture(&session, content, None).await.unwrap();
        }
        let all = backend.fetch(&session, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "b2");
    }

    #[tokio::test]
    async fn test_init_reports_configured_id() {
        let backend = InMemoryBackend::new(InMemoryBackendConfig {
            memory_id: Some("mem-fixed".to_string()),
            capture_mode: CaptureMode::Auto,
            ..Default::default()
        });
        assert_eq!(backend.init().await.unwrap(), "mem-fixed");
        assert!(!backend.supports_explicit_capture());
    }
}
