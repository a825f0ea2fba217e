//! Recording backend for tests and fault simulations
//!
//! Wraps an [`InMemoryBackend`], records every call it receives and can be
//! switched into failure modes to simulate an unavailable store. Reads fail
//! per operation, so a session outage and a profile outage can be told
//! apart; writes can be slowed down or fail after a number of successes.
use super::{CaptureMode, InMemoryBackend, InMemoryBackendConfig, MemoryBackend};
use crate::{
    errors::{RecallError, Result},
    namespace::Namespace,
    types::MemoryRecord,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A call observed by the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    /// `init`
    Init,
    /// `fetch(namespace, limit)`
    Fetch {
        /// Namespace read
        namespace: Namespace,
        /// Window size
        limit: usize,
    },
    /// `search(namespace, query, top_k)`
    Search {
        /// Namespace searched
        namespace: Namespace,
        /// Query text
        query: String,
        /// Result bound
        top_k: usize,
    },
    /// `capture(namespace, content, _)`
    Capture {
        /// Namespace written
        namespace: Namespace,
        /// Content written
        content: String,
    },
    /// `close`
    Close,
}

/// Spy implementing the `MemoryBackend` trait
pub struct MockBackend {
    inner: InMemoryBackend,
    calls: Mutex<Vec<BackendCall>>,
    fetch_unavailable: AtomicBool,
    search_unavailable: AtomicBool,
    captures_unavailable: AtomicBool,
    capture_budget: Mutex<Option<usize>>,
    capture_delay: Mutex<Option<Duration>>,
}

impl MockBackend {
    /// Create a mock advertising the given capture mode
    pub fn new(capture_mode: CaptureMode) -> Self {
        Self {
            inner: InMemoryBackend::new(InMemoryBackendConfig {
                memory_id: Some("mem-test".to_string()),
                capture_mode,
                ..Default::default()
            }),
            calls: Mutex::new(Vec::new()),
            fetch_unavailable: AtomicBool::new(false),
            search_unavailable: AtomicBool::new(false),
            captures_unavailable: AtomicBool::new(false),
            capture_budget: Mutex::new(None),
            capture_delay: Mutex::new(None),
        }
    }

    /// Insert a record without recording a call
    pub fn seed(&self, record: MemoryRecord) {
        self.inner.seed(record);
    }

    /// Make `fetch` and `search` fail with `MemoryBackendUnavailable`
    pub fn set_reads_unavailable(&self, unavailable: bool) {
        self.set_fetch_unavailable(unavailable);
        self.set_search_unavailable(unavailable);
    }

    /// Make `fetch` (the session window) fail
    pub fn set_fetch_unavailable(&self, unavailable: bool) {
        self.fetch_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `search` (profile lookups) fail
    pub fn set_search_unavailable(&self, unavailable: bool) {
        self.search_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make `capture` fail with `MemoryBackendUnavailable`
    pub fn set_captures_unavailable(&self, unavailable: bool) {
        self.captures_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Let `count` more captures succeed, then fail every later one
    pub fn fail_captures_after(&self, count: usize) {
        *self.capture_budget.lock() = Some(count);
    }

    /// Hold every `capture` for `delay` before writing
    pub fn set_capture_delay(&self, delay: Duration) {
        *self.capture_delay.lock() = Some(delay);
    }

    /// Every call observed so far
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    /// Capture calls observed so far
    pub fn captures(&self) -> Vec<BackendCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, BackendCall::Capture { .. }))
            .cloned()
            .collect()
    }

    /// Number of calls other than `init`/`close`
    pub fn data_call_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, BackendCall::Init | BackendCall::Close))
            .count()
    }

    /// Records stored under a namespace
    pub async fn stored(&self, namespace: &Namespace) -> Vec<MemoryRecord> {
        self.inner
            .fetch(namespace, usize::MAX)
            .await
            .unwrap_or_default()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().push(call);
    }

    fn spend_capture_budget(&self) -> Result<()> {
        match self.capture_budget.lock().as_mut() {
            Some(0) => Err(RecallError::backend_unavailable("simulated outage")),
            Some(left) => {
                *left -= 1;
                Ok(())
            },
            None => Ok(()),
        }
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(RecallError::backend_unavailable("simulated outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for MockBackend {
    async fn init(&self) -> Result<String> {
        self.record(BackendCall::Init);
        self.inner.init().await
    }

    async fn fetch(&self, namespace: &Namespace, limit: usize) -> Result<Vec<MemoryRecord>> {
        self.record(BackendCall::Fetch {
            namespace: namespace.clone(),
            limit,
        });
        Self::check(&self.fetch_unavailable)?;
        self.inner.fetch(namespace, limit).await
    }

    async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<MemoryRecord>> {
        self.record(BackendCall::Search {
            namespace: namespace.clone(),
            query: query.to_string(),
            top_k,
        });
        Self::check(&self.search_unavailable)?;
        self.inner.search(namespace, query, top_k).await
    }

    async fn capture(
        &self,
        namespace: &Namespace,
        content: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        self.record(BackendCall::Capture {
            namespace: namespace.clone(),
            content: content.to_string(),
        });
        let delay = *self.capture_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Self::check(&self.captures_unavailable)?;
        self.spend_capture_budget()?;
        self.inner.capture(namespace, content, metadata).await
    }

    fn capture_mode(&self) -> CaptureMode {
        self.inner.capture_mode()
    }

    async fn close(&self) -> Result<()> {
        self.record(BackendCall::Close);
        Ok(())
    }
}
