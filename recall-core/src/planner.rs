//! Retrieval planning
//!
//! Decides which scopes to read for an invocation and merges what comes
//! back into a [`ContextBundle`]:
//!
//! - the session window is always fetched when a session is in use and is
//!   kept in backend order;
//! - the profile namespace is searched with the prompt when long-term
//!   context is requested, and its hits are appended in rank order;
//! - records with identical content appear once, first occurrence wins, so
//!   session memory takes precedence over long-term memory.

use futures::future::OptionFuture;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    errors::{RecallError, Result},
    facade::MemoryFacade,
    namespace::ResolvedNamespaces,
    types::{MemoryRecord, MemoryScope, TopK},
};

/// Default number of recent session records used as context
pub const DEFAULT_SESSION_WINDOW: usize = 12;

/// Where a context snippet came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnippetSource {
    /// Recent session memory
    Session,
    /// Profile search hit
    LongTerm,
}

/// One piece of merged context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnippet {
    /// Origin scope
    pub source: SnippetSource,
    /// Record the text was taken from
    pub record_id: String,
    /// Text to inject
    pub text: String,
}

/// A scope that could not be read
#[derive(Debug)]
pub struct RetrievalFailure {
    /// Scope that failed
    pub scope: MemoryScope,
    /// Backend error
    pub error: RecallError,
}

/// Merged, ordered context assembled before model invocation
#[derive(Debug, Default)]
pub struct ContextBundle {
    /// Session snippets first, then long-term snippets
    pub snippets: Vec<ContextSnippet>,
    /// Session records as fetched
    pub session_records: Vec<MemoryRecord>,
    /// Long-term hits as ranked
    pub hits: Vec<MemoryRecord>,
    /// Scopes that failed; their part of the context is empty
    pub failures: Vec<RetrievalFailure>,
}

impl ContextBundle {
    /// Whether any scope failed
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Snippets of one source, in order
    pub fn snippets_from(&self, source: SnippetSource) -> impl Iterator<Item = &ContextSnippet> {
        self.snippets.iter().filter(move |s| s.source == source)
    }
}

/// Merge session records and long-term hits, dropping exact-content
/// duplicates. Session records keep their order and come first.
pub fn merge(session: &[MemoryRecord], hits: &[MemoryRecord]) -> Vec<ContextSnippet> {
    let mut seen: HashSet<&str> = HashSet::new();
    let tagged = session
        .iter()
        .map(|r| (SnippetSource::Session, r))
        .chain(hits.iter().map(|r| (SnippetSource::LongTerm, r)));

    let mut merged = Vec::new();
    for (source, record) in tagged {
        let text = record.content.trim();
        if text.is_empty() || !seen.insert(text) {
            continue;
        }
        merged.push(ContextSnippet {
            source,
            record_id: record.id.clone(),
            text: text.to_string(),
        });
    }
    merged
}

/// Plans and runs the memory reads for an invocation
pub struct RetrievalPlanner {
    facade: Arc<MemoryFacade>,
    session_window: usize,
}

impl RetrievalPlanner {
    pub fn new(facade: Arc<MemoryFacade>) -> Self {
        Self {
            facade,
            session_window: DEFAULT_SESSION_WINDOW,
        }
    }

    /// Set the number of recent session records to fetch
    pub fn with_session_window(mut self, session_window: usize) -> Self {
        self.session_window = session_window;
        self
    }

    /// Build the context bundle for a prompt.
    ///
    /// Fails only on invalid input (`InvalidTopK`), before any backend call.
    /// Backend failures are recorded in [`ContextBundle::failures`] and the
    /// affected scope contributes nothing.
    pub async fn plan(
        &self,
        resolved: &ResolvedNamespaces,
        prompt: &str,
        use_long_term: bool,
        long_term_top_k: i64,
    ) -> Result<ContextBundle> {
        let top_k = TopK::new(long_term_top_k)?;

        let session_read: OptionFuture<_> = resolved
            .session
            .as_ref()
            .filter(|_| self.session_window > 0)
            .map(|ns| self.facade.fetch(ns, self.session_window))
            .into();
        let profile_read: OptionFuture<_> = use_long_term
            .then(|| self.facade.search(&resolved.profile, prompt, top_k.get()))
            .into();

        let (session_result, profile_result) = futures::join!(session_read, profile_read);

        let mut bundle = ContextBundle::default();
        for (scope, result) in [
            (MemoryScope::Session, session_result),
            (MemoryScope::Profile, profile_result),
        ] {
            match result {
                Some(Ok(records)) if scope == MemoryScope::Session => {
                    bundle.session_records = records
                },
                Some(Ok(records)) => bundle.hits = records,
                Some(Err(error)) => {
                    warn!("Retrieval from {} scope failed: {}", scope, error);
                    bundle.failures.push(RetrievalFailure { scope, error });
                },
                None => {},
            }
        }

        bundle.snippets = merge(&bundle.session_records, &bundle.hits);
        debug!(
            "Planned context for {}: {} session records, {} long-term hits, {} snippets",
            resolved.actor_id,
            bundle.session_records.len(),
            bundle.hits.len(),
            bundle.snippets.len()
        );

        Ok(bundle)
    }
}
