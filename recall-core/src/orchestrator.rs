//! Assistant orchestration
//!
//! One invocation walks a fixed sequence of states:
//!
//! ```text
//! RESOLVING -> RETRIEVING -> GENERATING -> CAPTURING -> DONE
//!     |                          |
//!  REJECTED                    FAILED
//! ```
//!
//! Bad input is rejected before the backend is touched. A retrieval
//! failure degrades to generation with whatever context survived. A model
//! failure ends the invocation. A capture failure is reported in the debug
//! warnings and never hides the response.
//!
//! Capture runs on its own task: once the model has answered, both records
//! of the turn are written even if the caller goes away mid-request.

use chrono::Utc;
use futures::future::OptionFuture;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    backend::CaptureMode,
    errors::{RecallError, Result},
    facade::{CaptureOutcome, MemoryFacade},
    model::ModelClient,
    namespace::{self, Namespace, SessionPolicy},
    planner::{DEFAULT_SESSION_WINDOW, RetrievalPlanner, SnippetSource},
    prompt::{DEFAULT_SYSTEM_PROMPT, PromptBuilder},
    types::{DebugInfo, InvocationRequest, InvocationResult, InvocationState, TopK},
};

/// Debug warning key for a failed read
pub const RETRIEVAL_ERROR: &str = "retrieval_error";
/// Debug warning key for a failed session write
pub const SHORT_TERM_WRITE_ERROR: &str = "short_term_write_error";
/// Debug warning key for a failed profile write
pub const LONG_TERM_WRITE_ERROR: &str = "long_term_write_error";

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Base system prompt
    pub system_prompt: String,
    /// Recent session records injected as context
    pub session_window: usize,
    /// Mirror explicitly captured turns into the profile namespace
    pub retain_long_term: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            session_window: DEFAULT_SESSION_WINDOW,
            retain_long_term: true,
        }
    }
}

/// Per-invocation state trace
struct Transitions {
    actor: String,
    states: Vec<InvocationState>,
}

impl Transitions {
    fn start(actor: &str) -> Self {
        let mut transitions = Self {
            actor: actor.to_string(),
            states: Vec::with_capacity(5),
        };
        transitions.enter(InvocationState::Resolving);
        transitions
    }

    fn enter(&mut self, state: InvocationState) {
        debug!("Invocation for '{}' -> {:?}", self.actor, state);
        self.states.push(state);
    }
}

/// Owned copy of one turn, written off the request task
struct TurnCapture {
    facade: Arc<MemoryFacade>,
    mode: CaptureMode,
    session: Namespace,
    profile: Option<Namespace>,
    session_id: String,
    prompt: String,
    response: String,
}

impl TurnCapture {
    async fn run(self) -> (Result<CaptureOutcome>, Option<Result<CaptureOutcome>>) {
        let session_write = self.facade.capture_turn(
            self.mode,
            &self.session,
            &self.session_id,
            &self.prompt,
            &self.response,
        );
        let profile_write: OptionFuture<_> = self
            .profile
            .as_ref()
            .map(|profile| {
                self.facade.capture_turn(
                    self.mode,
                    profile,
                    &self.session_id,
                    &self.prompt,
                    &self.response,
                )
            })
            .into();
        futures::join!(session_write, profile_write)
    }
}

/// Runs the retrieve / generate / capture cycle for one prompt
pub struct AssistantOrchestrator {
    facade: Arc<MemoryFacade>,
    planner: RetrievalPlanner,
    prompt: PromptBuilder,
    model: Arc<dyn ModelClient>,
    config: OrchestratorConfig,
}

impl AssistantOrchestrator {
    pub fn new(
        facade: Arc<MemoryFacade>,
        model: Arc<dyn ModelClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            planner: RetrievalPlanner::new(facade.clone())
                .with_session_window(config.session_window),
            prompt: PromptBuilder::new(config.system_prompt.clone()),
            facade,
            model,
            config,
        }
    }

    /// Memory facade in use
    pub fn facade(&self) -> &Arc<MemoryFacade> {
        &self.facade
    }

    /// Answer a prompt with memory context.
    ///
    /// Returns an error only for rejected input or a model failure; memory
    /// faults are reported through `debug`.
    pub async fn invoke(&self, request: InvocationRequest) -> Result<InvocationResult> {
        let mut trace = Transitions::start(request.user_id.trim());

        // RESOLVING
        let resolved = match namespace::resolve(
            &request.user_id,
            request.session_id.as_deref(),
            SessionPolicy::Generate,
        )
        .and_then(|resolved| TopK::new(request.long_term_top_k).map(|_| resolved))
        {
            Ok(resolved) => resolved,
            Err(e) => {
                trace.enter(InvocationState::Rejected);
                warn!("Rejected invocation: {}", e);
                return Err(e);
            },
        };
        let session_ns = resolved.session_namespace()?.clone();
        let session_id = resolved.session_id.clone().unwrap_or_default();
        let mode = self.facade.effective_mode(request.use_hooks);

        let mut debug_info = DebugInfo {
            namespace: session_ns.to_string(),
            profile_namespace: resolved.profile.to_string(),
            hooks_enabled: request.use_hooks,
            explicit_capture: mode == CaptureMode::Explicit,
            ..Default::default()
        };

        // RETRIEVING
        trace.enter(InvocationState::Retrieving);
        let bundle = match self
            .planner
            .plan(
                &resolved,
                &request.prompt,
                request.use_long_term,
                request.long_term_top_k,
            )
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => {
                trace.enter(InvocationState::Rejected);
                return Err(e);
            },
        };
        if bundle.is_degraded() {
            let message = bundle
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.scope, f.error))
                .collect::<Vec<_>>()
                .join("; ");
            debug_info.retrieval_degraded = true;
            debug_info.warn(RETRIEVAL_ERROR, message);
        }
        debug_info.session_count = bundle.session_records.len();
        debug_info.long_term_count = bundle.hits.len();
        debug_info.long_term_injected = bundle
            .snippets_from(SnippetSource::LongTerm)
            .next()
            .is_some();

        // GENERATING
        trace.enter(InvocationState::Generating);
        let augmented = self.prompt.build(&bundle, &request.prompt, Utc::now());
        let result_text = match self.model.generate(&augmented).await {
            Ok(text) => text,
            Err(e) => {
                trace.enter(InvocationState::Failed);
                error!(
                    "Model {} failed for '{}': {}",
                    self.model.model_name(),
                    resolved.actor_id,
                    e
                );
                return Err(e);
            },
        };
        debug_info.hits = bundle.hits;

        // CAPTURING
        trace.enter(InvocationState::Capturing);
        let mirror = self.config.retain_long_term && mode == CaptureMode::Explicit;
        let turn = TurnCapture {
            facade: self.facade.clone(),
            mode,
            session: session_ns.clone(),
            profile: mirror.then(|| resolved.profile.clone()),
            session_id: session_id.clone(),
            prompt: request.prompt.clone(),
            response: result_text.clone(),
        };
        let (session_result, profile_result) = match tokio::spawn(turn.run()).await {
            Ok(results) => results,
            Err(e) => (
                Err(RecallError::backend_unavailable(format!(
                    "capture task aborted: {e}"
                ))),
                None,
            ),
        };

        match session_result {
            Ok(CaptureOutcome::DelegatedToBackend) => {
                debug!("Turn capture for {} left to backend hooks", session_ns)
            },
            Ok(CaptureOutcome::Written) => {},
            Err(e) => {
                warn!("Session capture failed for {}: {}", session_ns, e);
                debug_info.warn(SHORT_TERM_WRITE_ERROR, e.to_string());
            },
        }
        if let Some(Err(e)) = profile_result {
            warn!("Profile capture failed for {}: {}", resolved.profile, e);
            debug_info.warn(LONG_TERM_WRITE_ERROR, e.to_string());
        }

        trace.enter(InvocationState::Done);
        debug_info.states = trace.states;

        info!(
            "Invocation done for '{}' in session {} ({} session, {} long-term)",
            resolved.actor_id, session_id, debug_info.session_count, debug_info.long_term_count
        );

        Ok(InvocationResult {
            memory_id: self.facade.memory_id().to_string(),
            actor_id: resolved.actor_id,
            session_id,
            result_text,
            debug: debug_info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{BackendCall, MockBackend};
    use crate::errors::RecallError;
    use crate::model::MockModelClient;
    use crate::namespace::Namespace;
    use crate::types::MemoryRecord;

    fn orchestrator(backend: Arc<MockBackend>, model: MockModelClient) -> AssistantOrchestrator {
        let facade = Arc::new(MemoryFacade::new(backend, "mem-test"));
        AssistantOrchestrator::new(facade, Arc::new(model), OrchestratorConfig::default())
    }

    fn answering(text: &'static str) -> MockModelClient {
        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .returning(move |_| Ok(text.to_string()));
        model.expect_model_name().return_const("mock".to_string());
        model
    }

    #[tokio::test]
    async fn test_happy_path_states_and_capture() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let orchestrator = orchestrator(backend.clone(), answering("Hello Ada"));

        let result = orchestrator
            .invoke(InvocationRequest::new("ada", "My name is Ada").with_session("s1"))
            .await
            .unwrap();

        assert_eq!(result.memory_id, "mem-test");
        assert_eq!(result.session_id, "s1");
        assert_eq!(result.result_text, "Hello Ada");
        assert_eq!(
            result.debug.states,
            vec![
                InvocationState::Resolving,
                InvocationState::Retrieving,
                InvocationState::Generating,
                InvocationState::Capturing,
                InvocationState::Done,
            ]
        );
        assert!(result.debug.explicit_capture);
        assert!(result.debug.warnings.is_empty());

        let session = backend.stored(&Namespace::new("/summaries/ada/s1")).await;
        let profile = backend
            .stored(&Namespace::new("/summaries/ada/profile-ada"))
            .await;
        assert_eq!(session.len(), 2);
        assert_eq!(profile.len(), 2);
    }

    #[tokio::test]
    async fn test_generated_session_is_returned() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let orchestrator = orchestrator(backend, answering("ok"));

        let result = orchestrator
            .invoke(InvocationRequest::new("u1", "hi"))
            .await
            .unwrap();
        assert!(result.session_id.starts_with("session-"));
        assert_eq!(
            result.debug.namespace,
            format!("/summaries/u1/{}", result.session_id)
        );
    }

    #[tokio::test]
    async fn test_rejected_input_touches_nothing() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let mut model = MockModelClient::new();
        model.expect_generate().never();
        let orchestrator = orchestrator(backend.clone(), model);

        let err = orchestrator
            .invoke(InvocationRequest::new("  ", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::InvalidIdentity(_)));

        let err = orchestrator
            .invoke(InvocationRequest::new("u1", "hi").with_long_term(true, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::InvalidTopK { value: 0 }));
        assert_eq!(backend.data_call_count(), 0);
    }

    #[tokio::test]
    async fn test_hooks_disable_explicit_writes() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let orchestrator = orchestrator(backend.clone(), answering("ok"));

        let result = orchestrator
            .invoke(InvocationRequest::new("u1", "hi").with_hooks(true))
            .await
            .unwrap();
        assert!(result.debug.hooks_enabled);
        assert!(!result.debug.explicit_capture);
        assert!(backend.captures().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_outage_degrades() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.set_reads_unavailable(true);
        let orchestrator = orchestrator(backend, answering("still here"));

        let result = orchestrator
            .invoke(InvocationRequest::new("u1", "hi"))
            .await
            .unwrap();
        assert_eq!(result.result_text, "still here");
        assert!(result.debug.retrieval_degraded);
        assert!(result.debug.warnings.contains_key(RETRIEVAL_ERROR));
        assert_eq!(result.debug.states.last(), Some(&InvocationState::Done));
    }

    #[tokio::test]
    async fn test_capture_outage_is_a_warning() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.set_captures_unavailable(true);
        let orchestrator = orchestrator(backend, answering("answer"));

        let result = orchestrator
            .invoke(InvocationRequest::new("u1", "hi"))
            .await
            .unwrap();
        assert_eq!(result.result_text, "answer");
        assert!(result.debug.warnings.contains_key(SHORT_TERM_WRITE_ERROR));
        assert!(result.debug.warnings.contains_key(LONG_TERM_WRITE_ERROR));
    }

    #[tokio::test]
    async fn test_model_failure_is_fatal() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .returning(|_| Err(RecallError::model("provider down")));
        model.expect_model_name().return_const("mock".to_string());
        let orchestrator = orchestrator(backend.clone(), model);

        let err = orchestrator
            .invoke(InvocationRequest::new("u1", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecallError::ModelInvocationError { .. }));
        assert!(backend.captures().is_empty());
    }

    #[tokio::test]
    async fn test_profile_hits_reach_the_model() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.seed(MemoryRecord::new(
            Namespace::new("/summaries/u1/profile-u1"),
            "favorite color is blue",
        ));
        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .withf(|prompt| prompt.system.contains("- favorite color is blue"))
            .returning(|_| Ok("Your favorite color is blue.".to_string()));
        model.expect_model_name().return_const("mock".to_string());
        let orchestrator = orchestrator(backend.clone(), model);

        let result = orchestrator
            .invoke(InvocationRequest::new("u1", "What is my favorite color?"))
            .await
            .unwrap();
        assert!(result.debug.long_term_injected);
        assert_eq!(result.debug.hits[0].content, "favorite color is blue");
        assert!(backend.calls().iter().any(|c| matches!(c, BackendCall::Search { .. })));
    }

    #[tokio::test]
    async fn test_retention_off_skips_profile_mirror() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        let facade = Arc::new(MemoryFacade::new(backend.clone(), "mem-test"));
        let orchestrator = AssistantOrchestrator::new(
            facade,
            Arc::new(answering("ok")),
            OrchestratorConfig {
                retain_long_term: false,
                ..Default::default()
            },
        );

        orchestrator
            .invoke(InvocationRequest::new("u1", "hi").with_session("s1"))
            .await
            .unwrap();
        assert!(
            backend
                .captures()
                .iter()
                .all(|c| matches!(c, BackendCall::Capture { namespace, .. } if namespace.as_str() == "/summaries/u1/s1"))
        );
    }

    #[tokio::test]
    async fn test_profile_outage_keeps_session_context() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.seed(MemoryRecord::new(
            Namespace::new("/summaries/u1/s1"),
            "training for a marathon",
        ));
        backend.seed(MemoryRecord::new(
            Namespace::new("/summaries/u1/profile-u1"),
            "lives in Lyon",
        ));
        backend.set_search_unavailable(true);
        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .withf(|prompt| {
                prompt.system.contains("- training for a marathon")
                    && !prompt.system.contains("lives in Lyon")
            })
            .returning(|_| Ok("Keep running".to_string()));
        model.expect_model_name().return_const("mock".to_string());
        let orchestrator = orchestrator(backend, model);

        let result = orchestrator
            .invoke(InvocationRequest::new("u1", "How is my training?").with_session("s1"))
            .await
            .unwrap();

        assert!(result.debug.retrieval_degraded);
        assert_eq!(result.debug.session_count, 1);
        assert!(!result.debug.long_term_injected);
        let warning = &result.debug.warnings[RETRIEVAL_ERROR];
        assert!(warning.contains("profile:"));
        assert!(!warning.contains("session:"));
    }

    #[tokio::test]
    async fn test_session_outage_keeps_profile_context() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.seed(MemoryRecord::new(
            Namespace::new("/summaries/u1/s1"),
            "training for a marathon",
        ));
        backend.seed(MemoryRecord::new(
            Namespace::new("/summaries/u1/profile-u1"),
            "lives in Lyon",
        ));
        backend.set_fetch_unavailable(true);
        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .withf(|prompt| {
                prompt.system.contains("- lives in Lyon")
                    && !prompt.system.contains("training for a marathon")
            })
            .returning(|_| Ok("Lyon it is".to_string()));
        model.expect_model_name().return_const("mock".to_string());
        let orchestrator = orchestrator(backend, model);

        let result = orchestrator
            .invoke(InvocationRequest::new("u1", "Do I still live in Lyon?").with_session("s1"))
            .await
            .unwrap();

        assert!(result.debug.retrieval_degraded);
        assert_eq!(result.debug.session_count, 0);
        assert!(result.debug.long_term_injected);
        let warning = &result.debug.warnings[RETRIEVAL_ERROR];
        assert!(warning.contains("session:"));
        assert!(!warning.contains("profile:"));
    }

    #[tokio::test]
    async fn test_dropped_invocation_still_captures_whole_turn() {
        let backend = Arc::new(MockBackend::new(CaptureMode::Explicit));
        backend.set_capture_delay(std::time::Duration::from_millis(50));
        let orchestrator = orchestrator(backend.clone(), answering("hi there"));

        // The caller gives up while the USER record is still in flight
        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(75),
            orchestrator.invoke(InvocationRequest::new("u1", "hello").with_session("s1")),
        )
        .await;
        assert!(outcome.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let session = backend.stored(&Namespace::new("/summaries/u1/s1")).await;
        let contents: Vec<_> = session.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "hi there"]);
    }
}
