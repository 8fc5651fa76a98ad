//! Mutable state shared by everything that runs during one job invocation.
//!
//! A [`JobContext`] is created before the run, threaded by `&mut` through the
//! whole traversal, and read afterwards for the outcome and recorded errors.
//! It owns:
//!
//! - the value store and scoped lookups over it,
//! - the active scope stack (pushed on entry, popped on exit),
//! - the append-only error log,
//! - dynamic teardown actions registered while the run is in progress,
//! - per-scope status and the listeners that observe progress.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::{Deref, DerefMut};

use serde_json::Value;
use tracing::{debug, error, info};

use crate::core::action::Action;
use crate::core::errors::{CoercionError, ContextError, FailureKind, RecordedError, ValueError};
use crate::core::scope::{Scope, ScopeId, ScopeKind};
use crate::core::status::{ScopeStatus, StatusListener};
use crate::core::values::Values;

/// Snapshot of an entered scope, independent of the tree's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFrame {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub name: String,
    /// `/`-joined names from the outermost active scope, e.g. `verify/lint/clippy`.
    pub path: String,
    /// Ancestor chain, outermost first, ending with `id`.
    pub lineage: Vec<ScopeId>,
}

pub struct JobContext {
    values: Values,
    stack: Vec<ScopeId>,
    frames: HashMap<ScopeId, ScopeFrame>,
    statuses: HashMap<ScopeId, ScopeStatus>,
    gated: HashSet<ScopeId>,
    errors: Vec<RecordedError>,
    dynamic_teardown: HashMap<ScopeId, Vec<Box<dyn Action>>>,
    closed: HashSet<ScopeId>,
    listeners: Vec<Box<dyn StatusListener>>,
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new(Values::default())
    }
}

impl JobContext {
    pub fn new(values: Values) -> Self {
        Self {
            values,
            stack: Vec::new(),
            frames: HashMap::new(),
            statuses: HashMap::new(),
            gated: HashSet::new(),
            errors: Vec::new(),
            dynamic_teardown: HashMap::new(),
            closed: HashSet::new(),
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: impl StatusListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }

    pub fn add_listener(&mut self, listener: Box<dyn StatusListener>) {
        self.listeners.push(listener);
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    pub fn values(&self) -> &Values {
        &self.values
    }

    /// Resolve `key`, preferring values qualified by the active scope names.
    ///
    /// With active scopes `[verify, lint]` the lookup order for `timeout` is
    /// `verify.lint.timeout`, `verify.timeout`, then `timeout`.
    pub fn value(&self, key: &str) -> Result<&Value, ValueError> {
        let names: Vec<&str> = self
            .stack
            .iter()
            .filter_map(|id| self.frames.get(id))
            .map(|frame| frame.name.as_str())
            .collect();
        for depth in (1..=names.len()).rev() {
            let qualified = format!("{}.{}", names[..depth].join("."), key);
            if let Ok(value) = self.values.get(&qualified) {
                return Ok(value);
            }
        }
        self.values.get(key)
    }

    pub fn value_as<T, F>(&self, key: &str, coerce: F) -> Result<T, ValueError>
    where
        F: FnOnce(&Value) -> Result<T, CoercionError>,
    {
        let raw = self.value(key)?;
        coerce(raw).map_err(|source| ValueError::Coercion {
            key: key.to_string(),
            source,
        })
    }

    // ---------------------------------------------------------------------
    // Scope stack
    // ---------------------------------------------------------------------

    /// Push `scope` and return a guard that pops it when dropped.
    pub fn enter(&mut self, scope: &Scope) -> ScopeGuard<'_> {
        self.push_scope(scope);
        ScopeGuard {
            id: scope.id(),
            ctx: self,
        }
    }

    pub fn push_scope(&mut self, scope: &Scope) {
        let (path, mut lineage) = match self.current_frame() {
            Some(parent) => (
                format!("{}/{}", parent.path, scope.name()),
                parent.lineage.clone(),
            ),
            None => (scope.name().to_string(), Vec::new()),
        };
        lineage.push(scope.id());
        let frame = ScopeFrame {
            id: scope.id(),
            kind: scope.kind(),
            name: scope.name().to_string(),
            path,
            lineage,
        };
        debug!(scope = %frame.path, kind = %frame.kind, "enter scope");
        for listener in &mut self.listeners {
            listener.scope_started(&frame);
        }
        self.frames.insert(frame.id, frame);
        self.statuses.insert(scope.id(), ScopeStatus::Running);
        self.gated.remove(&scope.id());
        self.stack.push(scope.id());
    }

    /// Pop the innermost scope.
    pub fn pop_scope(&mut self) -> Result<ScopeId, ContextError> {
        let id = *self.stack.last().ok_or(ContextError::NoScope)?;
        self.finish_scope(id);
        Ok(id)
    }

    /// Pop `id`, which must be the innermost scope.
    pub fn exit_scope(&mut self, id: ScopeId) -> Result<(), ContextError> {
        match self.stack.last() {
            Some(top) if *top == id => {
                self.finish_scope(id);
                Ok(())
            }
            found => Err(ContextError::ScopeMismatch {
                expected: id,
                found: found.copied(),
            }),
        }
    }

    fn finish_scope(&mut self, id: ScopeId) {
        self.stack.pop();
        let status = if self.is_scope_failing(id) {
            ScopeStatus::Failed
        } else if self.gated.contains(&id) {
            ScopeStatus::Skipped
        } else {
            ScopeStatus::Passed
        };
        self.statuses.insert(id, status);
        if let Some(frame) = self.frames.get(&id) {
            debug!(scope = %frame.path, %status, "exit scope");
            for listener in &mut self.listeners {
                listener.scope_finished(frame, status);
            }
        }
    }

    fn current_frame(&self) -> Option<&ScopeFrame> {
        self.stack.last().and_then(|id| self.frames.get(id))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// True once any scope has been entered or torn down in this context.
    pub fn has_run(&self) -> bool {
        !self.frames.is_empty() || !self.closed.is_empty()
    }

    pub fn current_scope(&self) -> Result<&ScopeFrame, ContextError> {
        self.current_frame().ok_or(ContextError::NoScope)
    }

    /// Enclosing scope of whatever is currently executing.
    pub fn parent_scope(&self) -> Result<&ScopeFrame, ContextError> {
        self.get_scope(1)
    }

    /// Scope `generation` levels above the current one (0 = current, 1 = parent, ...).
    pub fn get_scope(&self, generation: usize) -> Result<&ScopeFrame, ContextError> {
        let depth = self.stack.len();
        if depth == 0 && generation == 0 {
            return Err(ContextError::NoScope);
        }
        let index = depth
            .checked_sub(generation + 1)
            .ok_or(ContextError::NoParentScope { generation, depth })?;
        self.frames
            .get(&self.stack[index])
            .ok_or(ContextError::NoScope)
    }

    /// Outermost active scope.
    pub fn root_scope(&self) -> Result<&ScopeFrame, ContextError> {
        self.stack
            .first()
            .and_then(|id| self.frames.get(id))
            .ok_or(ContextError::NoScope)
    }

    /// Active scopes, outermost first.
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeFrame> {
        self.stack.iter().filter_map(|id| self.frames.get(id))
    }

    /// Frame of any scope entered during this run.
    pub fn frame(&self, id: ScopeId) -> Option<&ScopeFrame> {
        self.frames.get(&id)
    }

    pub fn scope_by_path(&self, path: &str) -> Option<&ScopeFrame> {
        self.frames.values().find(|frame| frame.path == path)
    }

    pub fn scope_status(&self, id: ScopeId) -> ScopeStatus {
        self.statuses
            .get(&id)
            .copied()
            .unwrap_or(ScopeStatus::Unknown)
    }

    /// Mark the scope's body as gated off (not executed).
    pub(crate) fn mark_skipped(&mut self, id: ScopeId, reason: Option<&str>) {
        self.gated.insert(id);
        if let Some(frame) = self.frames.get(&id) {
            info!(scope = %frame.path, reason = reason.unwrap_or(""), "scope skipped");
            for listener in &mut self.listeners {
                listener.scope_skipped(frame, reason);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Errors
    // ---------------------------------------------------------------------

    /// Append a failure to the error log against `scope`.
    pub fn record_error(&mut self, scope: ScopeId, kind: FailureKind, error: anyhow::Error) {
        let (path, lineage) = match self.frames.get(&scope) {
            Some(frame) => (frame.path.clone(), frame.lineage.clone()),
            None => (scope.to_string(), vec![scope]),
        };
        info!(scope = %path, %kind, error = %format!("{error:#}"), "error recorded");
        for id in &lineage {
            if let Some(status) = self.statuses.get_mut(id)
                && *status == ScopeStatus::Running
            {
                *status = ScopeStatus::Failing;
            }
        }
        let record = RecordedError {
            scope,
            path,
            lineage,
            kind,
            error,
        };
        for listener in &mut self.listeners {
            listener.error_recorded(&record);
        }
        self.errors.push(record);
    }

    /// Record a failure against the current scope without aborting the caller.
    pub fn error(&mut self, error: impl Into<anyhow::Error>) -> Result<(), ContextError> {
        let id = self.current_scope()?.id;
        self.record_error(id, FailureKind::Action, error.into());
        Ok(())
    }

    /// Errors recorded against `scope` or any of its descendants, in record order.
    pub fn errors(&self, scope: ScopeId) -> Vec<&RecordedError> {
        self.errors.iter().filter(|e| e.concerns(scope)).collect()
    }

    /// Errors recorded directly against `scope`.
    pub fn own_errors(&self, scope: ScopeId) -> Vec<&RecordedError> {
        self.errors.iter().filter(|e| e.scope == scope).collect()
    }

    /// Errors recorded directly against the current scope.
    pub fn current_errors(&self) -> Result<Vec<&RecordedError>, ContextError> {
        let id = self.current_scope()?.id;
        Ok(self.own_errors(id))
    }

    /// Every error recorded during the run.
    pub fn all_errors(&self) -> &[RecordedError] {
        &self.errors
    }

    pub fn is_failing(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_scope_failing(&self, scope: ScopeId) -> bool {
        self.errors.iter().any(|e| e.concerns(scope))
    }

    // ---------------------------------------------------------------------
    // Dynamic teardown
    // ---------------------------------------------------------------------

    /// Register `action` to run (LIFO) when `scope` tears down.
    pub fn add_teardown(
        &mut self,
        scope: ScopeId,
        action: impl Action + 'static,
    ) -> Result<(), ContextError> {
        self.add_teardown_boxed(scope, Box::new(action))
    }

    pub fn add_teardown_boxed(
        &mut self,
        scope: ScopeId,
        action: Box<dyn Action>,
    ) -> Result<(), ContextError> {
        if self.closed.contains(&scope) {
            return Err(ContextError::LateTeardown { scope });
        }
        debug!(%scope, action = %action.describe(), "teardown registered");
        self.dynamic_teardown.entry(scope).or_default().push(action);
        Ok(())
    }

    /// Register teardown on the enclosing scope of the current one.
    pub fn add_parent_teardown(
        &mut self,
        action: impl Action + 'static,
    ) -> Result<ScopeId, ContextError> {
        let parent = self.parent_scope()?.id;
        self.add_teardown(parent, action)?;
        Ok(parent)
    }

    pub fn add_current_teardown(
        &mut self,
        action: impl Action + 'static,
    ) -> Result<ScopeId, ContextError> {
        let current = self.current_scope()?.id;
        self.add_teardown(current, action)?;
        Ok(current)
    }

    /// Number of dynamic teardown actions still waiting for `scope`.
    pub fn pending_teardown(&self, scope: ScopeId) -> usize {
        self.dynamic_teardown.get(&scope).map_or(0, Vec::len)
    }

    /// True once `scope` has completed its teardown phase.
    pub fn is_torn_down(&self, scope: ScopeId) -> bool {
        self.closed.contains(&scope)
    }

    pub(crate) fn begin_teardown(&mut self, scope: ScopeId) {
        if let Some(frame) = self.frames.get(&scope) {
            debug!(scope = %frame.path, "teardown started");
            for listener in &mut self.listeners {
                listener.teardown_started(frame);
            }
        }
    }

    /// Most recently registered pending teardown for `scope`.
    pub(crate) fn pop_dynamic_teardown(&mut self, scope: ScopeId) -> Option<Box<dyn Action>> {
        self.dynamic_teardown.get_mut(&scope)?.pop()
    }

    pub(crate) fn close_teardown(&mut self, scope: ScopeId) {
        self.dynamic_teardown.remove(&scope);
        self.closed.insert(scope);
    }

    // ---------------------------------------------------------------------
    // Output
    // ---------------------------------------------------------------------

    /// Forward captured output to listeners, attributed to the current scope.
    pub fn output(&mut self, label: &str, text: &str) {
        let frame = self.stack.last().and_then(|id| self.frames.get(id));
        for listener in &mut self.listeners {
            listener.output(frame, label, text);
        }
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("values", &self.values)
            .field("stack", &self.stack)
            .field("errors", &self.errors.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Keeps a scope on the context's stack for its lifetime.
///
/// Dereferences to the context so the guarded region can keep using it.
pub struct ScopeGuard<'a> {
    ctx: &'a mut JobContext,
    id: ScopeId,
}

impl Deref for ScopeGuard<'_> {
    type Target = JobContext;

    fn deref(&self) -> &JobContext {
        self.ctx
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut JobContext {
        self.ctx
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.ctx.exit_scope(self.id) {
            error!(%err, "unbalanced scope stack");
        }
    }
}
