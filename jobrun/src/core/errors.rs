//! Error taxonomy for the job engine.
//!
//! Two families live here:
//!
//! - **Usage errors** ([`ValueError`], [`ContextError`], [`RunError`]) are returned
//!   to whoever made the call. The runner never swallows them.
//! - **Recorded errors** ([`RecordedError`]) are job-domain failures (an action,
//!   a teardown action or a condition failed). They are captured by the runner and
//!   appended to the context's error log instead of unwinding the traversal.

use std::fmt;

use crate::core::scope::ScopeId;

/// A raw value could not be coerced to the requested type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot interpret {found} as {expected}")]
pub struct CoercionError {
    /// Human-readable target type (`"a boolean"`, `"an integer"`, ...).
    pub expected: &'static str,
    /// The offending value, rendered as JSON.
    pub found: String,
}

/// Failures resolving a dotted key against the value store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("no value for key '{key}' (segment '{segment}' not found)")]
    KeyNotFound { key: String, segment: String },

    #[error("no value for key '{key}' ('{segment}' is not a mapping)")]
    TypeMismatch { key: String, segment: String },

    #[error("value for key '{key}' is invalid: {source}")]
    Coercion {
        key: String,
        #[source]
        source: CoercionError,
    },
}

impl ValueError {
    pub fn key(&self) -> &str {
        match self {
            ValueError::KeyNotFound { key, .. }
            | ValueError::TypeMismatch { key, .. }
            | ValueError::Coercion { key, .. } => key,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ValueError::KeyNotFound { .. })
    }
}

/// Misuse of the job context's scope stack or teardown registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// Dynamic teardown registered after the scope already finished tearing down.
    #[error("scope {scope} has already completed its teardown")]
    LateTeardown { scope: ScopeId },

    /// `parent_scope()` (or `get_scope(n)`) reached past the bottom of the stack.
    #[error("no scope {generation} level(s) above the current scope (stack depth {depth})")]
    NoParentScope { generation: usize, depth: usize },

    /// A current-scope query was made while no scope is active.
    #[error("no scope is active")]
    NoScope,

    /// The scope being exited is not the innermost one.
    #[error("scope mismatch on exit: expected {expected}, found {found:?}")]
    ScopeMismatch {
        expected: ScopeId,
        found: Option<ScopeId>,
    },
}

/// Reasons `JobRunner::run` refuses to start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("invalid scope tree:\n- {}", .0.join("\n- "))]
    InvalidTree(Vec<String>),

    #[error("context is already running scope {0}")]
    ContextInUse(ScopeId),

    #[error("context already holds a finished run; use a fresh context")]
    ContextSpent,
}

/// Where a recorded failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Action,
    Teardown,
    Condition,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Action => "action failed",
            FailureKind::Teardown => "teardown failed",
            FailureKind::Condition => "condition evaluation failed",
        };
        f.write_str(label)
    }
}

/// A job-domain failure captured into the context's error log.
#[derive(Debug)]
pub struct RecordedError {
    /// Scope the failure is recorded against.
    pub scope: ScopeId,
    /// `/`-joined scope names at the time of recording.
    pub path: String,
    /// Ancestor chain of `scope`, outermost first, ending with `scope` itself.
    pub lineage: Vec<ScopeId>,
    pub kind: FailureKind,
    pub error: anyhow::Error,
}

impl RecordedError {
    /// True if the failure was recorded against `scope` or one of its descendants.
    pub fn concerns(&self, scope: ScopeId) -> bool {
        self.lineage.contains(&scope)
    }
}

impl fmt::Display for RecordedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {:#}", self.path, self.kind, self.error)
    }
}
