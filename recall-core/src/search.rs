//! Scoped memory search
//!
//! Lets a caller inspect what the assistant would see for a user. Unlike
//! retrieval during an invocation, a backend failure here is returned to
//! the caller instead of being degraded away.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::{
    errors::Result,
    facade::MemoryFacade,
    namespace::{self, Namespace, SessionPolicy},
    types::{DEFAULT_TOP_K, MemoryQuery, MemoryRecord, MemoryScope, TopK},
};

/// Ranked hits for one scope
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub memory_id: String,
    pub actor_id: String,
    pub namespace: Namespace,
    pub hits: Vec<MemoryRecord>,
}

/// Search over a single memory scope
pub struct MemorySearch {
    facade: Arc<MemoryFacade>,
    default_top_k: usize,
}

impl MemorySearch {
    pub fn new(facade: Arc<MemoryFacade>) -> Self {
        Self {
            facade,
            default_top_k: DEFAULT_TOP_K,
        }
    }

    /// Bound used when a query does not set `top_k`
    pub fn with_default_top_k(mut self, default_top_k: usize) -> Self {
        self.default_top_k = default_top_k.max(1);
        self
    }

    pub async fn search(&self, query: MemoryQuery) -> Result<SearchOutcome> {
        let top_k = match query.top_k {
            Some(value) => TopK::new(value)?.get(),
            None => self.default_top_k,
        };
        // profile lookups never address a session
        let (session_id, policy) = match query.scope {
            MemoryScope::Profile => (None, SessionPolicy::Optional),
            MemoryScope::Session => (query.session_id.as_deref(), SessionPolicy::Require),
        };
        let resolved = namespace::resolve(&query.user_id, session_id, policy)?;
        let target = resolved.scope(query.scope)?.clone();

        let hits = self
            .facade
            .search(&target, &query.query, top_k)
            .await?;
        debug!(
            "Search '{}' in {} returned {} hits",
            query.query,
            target,
            hits.len()
        );

        Ok(SearchOutcome {
            memory_id: self.facade.memory_id().to_string(),
            actor_id: resolved.actor_id,
            namespace: target,
            hits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CaptureMode;
    use crate::backend::mock::{BackendCall, MockBackend};
    use crate::errors::RecallError;

    fn search_with(backend: Arc<MockBackend>) -> MemorySearch {
        MemorySearch::new(Arc::new(MemoryFacade::new(backend, "mem-test")))
    }

    #[tokio::test]
    async fn test_profile_scope_searches_profile_namespace() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.seed(MemoryRecord::new(
            Namespace::new("/summaries/u1/profile-u1"),
            "favorite color is blue",
        ));
        let search = search_with(backend.clone());

        let outcome = search
            .search(MemoryQuery::profile("u1", "favorite color"))
            .await
            .unwrap();
        assert_eq!(outcome.memory_id, "mem-test");
        assert_eq!(outcome.actor_id, "u1");
        assert_eq!(outcome.namespace.as_str(), "/summaries/u1/profile-u1");
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(
            backend.calls(),
            vec![BackendCall::Search {
                namespace: Namespace::new("/summaries/u1/profile-u1"),
                query: "favorite color".to_string(),
                top_k: DEFAULT_TOP_K,
            }]
        );
    }

    #[tokio::test]
    async fn test_profile_scope_ignores_session_id() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let search = search_with(backend);
        let mut query = MemoryQuery::profile("u1", "x");
        query.session_id = Some("a/b".to_string());

        let outcome = search.search(query).await.unwrap();
        assert_eq!(outcome.namespace.as_str(), "/summaries/u1/profile-u1");
    }

    #[tokio::test]
    async fn test_session_scope_requires_session() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let search = search_with(backend.clone());
        let err = search
            .search(MemoryQuery::session("u1", "x", None))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::MissingSessionScope));
        assert_eq!(backend.data_call_count(), 0);
    }

    #[tokio::test]
    async fn test_session_scope_and_custom_top_k() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let search = search_with(backend.clone()).with_default_top_k(8);

        let outcome = search
            .search(MemoryQuery::session("u1", "pizza", Some("s9".to_string())))
            .await
            .unwrap();
        assert_eq!(outcome.namespace.as_str(), "/summaries/u1/s9");
        assert!(matches!(
            backend.calls()[0],
            BackendCall::Search { top_k: 8, .. }
        ));

        search
            .search(MemoryQuery::session("u1", "pizza", Some("s9".to_string())).with_top_k(2))
            .await
            .unwrap();
        assert!(matches!(
            backend.calls()[1],
            BackendCall::Search { top_k: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_top_k_rejected_first() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let search = search_with(backend.clone());

        let err = search
            .search(MemoryQuery::profile("u1", "x").with_top_k(-3))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::InvalidTopK { value: -3 }));
        assert_eq!(backend.data_call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_outage_surfaces() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.set_reads_unavailable(true);
        let search = search_with(backend);

        let err = search
            .search(MemoryQuery::profile("u1", "x"))
            .await
            .unwrap_err();
        assert!(err.is_memory_fault());
    }
}
