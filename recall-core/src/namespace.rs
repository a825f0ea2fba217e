//! Namespace resolution
//!
//! Derives the addressing scheme used against the memory backend:
//!
//! - profile namespace: `/summaries/{actor_id}/profile-{actor_id}`
//! - session namespace: `/summaries/{actor_id}/{session_id}`
//!
//! Both live under the actor's path, so a session can never address
//! another user's profile.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{RecallError, Result};
use crate::types::MemoryScope;

const NAMESPACE_ROOT: &str = "/summaries";
const SESSION_PREFIX: &str = "session-";
const PROFILE_PREFIX: &str = "profile-";

/// Addressable scope within the memory backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Wrap a raw namespace path
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Namespace path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How to treat an absent session id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Generate a fresh session id (invocations)
    Generate,
    /// Fail with `MissingSessionScope` (session-scoped search)
    Require,
    /// Leave the session unresolved (profile-scoped search)
    Optional,
}

/// Namespaces derived for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNamespaces {
    /// Actor identity derived from the user id
    pub actor_id: String,
    /// Session id in use, if any
    pub session_id: Option<String>,
    /// True when `session_id` was generated for this request
    pub session_generated: bool,
    /// Long-lived per-user namespace
    pub profile: Namespace,
    /// Per-session namespace, if a session is in use
    pub session: Option<Namespace>,
}

impl ResolvedNamespaces {
    /// Session namespace, or `MissingSessionScope`
    pub fn session_namespace(&self) -> Result<&Namespace> {
        self.session.as_ref().ok_or(RecallError::MissingSessionScope)
    }

    /// Namespace addressed by a scope
    pub fn scope(&self, scope: MemoryScope) -> Result<&Namespace> {
        match scope {
            MemoryScope::Profile => Ok(&self.profile),
            MemoryScope::Session => self.session_namespace(),
        }
    }
}

/// Map a user id onto an actor id
pub fn actor_id_for_user(user_id: &str) -> Result<String> {
    let actor_id = user_id.trim();
    if actor_id.is_empty() {
        return Err(RecallError::invalid_identity("user_id must not be empty"));
    }
    if actor_id.contains('/') {
        return Err(RecallError::invalid_identity(format!(
            "user_id must not contain '/': {actor_id}"
        )));
    }
    Ok(actor_id.to_string())
}

/// Generate a new session id
pub fn generate_session_id() -> String {
    let token = Uuid::new_v4().simple().to_string();
    format!("{SESSION_PREFIX}{}", &token[..8])
}

/// Stable pseudo-session that accumulates the user's long-term memory
pub fn profile_session_id(actor_id: &str) -> String {
    format!("{PROFILE_PREFIX}{actor_id}")
}

/// Namespace path for an actor's session
pub fn summary_namespace(actor_id: &str, session_id: &str) -> Namespace {
    Namespace(format!("{NAMESPACE_ROOT}/{actor_id}/{session_id}"))
}

/// Profile namespace for an actor
pub fn profile_namespace(actor_id: &str) -> Namespace {
    summary_namespace(actor_id, &profile_session_id(actor_id))
}

fn validate_session_id(actor_id: &str, session_id: &str) -> Result<()> {
    if session_id.contains('/') {
        return Err(RecallError::invalid_identity(format!(
            "session_id must not contain '/': {session_id}"
        )));
    }
    if session_id == profile_session_id(actor_id) {
        return Err(RecallError::invalid_identity(
            "session_id must not address the profile namespace",
        ));
    }
    Ok(())
}

/// Resolve the profile namespace and, depending on `policy`, the session
/// namespace for a request.
///
/// A blank `session_id` is treated as absent.
pub fn resolve(
    user_id: &str,
    session_id: Option<&str>,
    policy: SessionPolicy,
) -> Result<ResolvedNamespaces> {
    let actor_id = actor_id_for_user(user_id)?;
    let supplied = session_id.map(str::trim).filter(|s| !s.is_empty());

    let (session_id, session_generated) = match (supplied, policy) {
        (Some(id), _) => {
            validate_session_id(&actor_id, id)?;
            (Some(id.to_string()), false)
        },
        (None, SessionPolicy::Generate) => {
            let id = generate_session_id();
            debug!("Generated session {} for actor {}", id, actor_id);
            (Some(id), true)
        },
        (None, SessionPolicy::Require) => return Err(RecallError::MissingSessionScope),
        (None, SessionPolicy::Optional) => (None, false),
    };

    let session = session_id
        .as_deref()
        .map(|id| summary_namespace(&actor_id, id));

    Ok(ResolvedNamespaces {
        profile: profile_namespace(&actor_id),
        actor_id,
        session_id,
        session_generated,
        session,
    })
}
