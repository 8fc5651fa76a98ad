//! Depth-first execution of a scope tree.
//!
//! For every scope the runner:
//!
//! 1. pushes the scope onto the context stack,
//! 2. evaluates `run_if`, then `skip_if` (only if `run_if` passed),
//! 3. runs the body when both allow it: the step's action, or each child in
//!    declaration order,
//! 4. runs teardown (dynamic LIFO, then static FIFO),
//! 5. pops the scope.
//!
//! Action, teardown and condition failures are recorded in the context and never
//! unwind the traversal. Teardown runs for every scope that was pushed, whether
//! or not its body ran.

use tracing::{debug, info, instrument};

use crate::core::action::Action;
use crate::core::condition::{Condition, Outcome};
use crate::core::context::JobContext;
use crate::core::errors::{FailureKind, RunError};
use crate::core::invariants::validate_invariants;
use crate::core::scope::{Scope, ScopeId, ScopeKind};

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    /// `errors` is the size of the job's aggregated error list.
    Failed { errors: usize },
}

impl RunOutcome {
    pub fn is_failing(self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobRunner;

impl JobRunner {
    pub fn new() -> Self {
        Self
    }

    /// Execute `job` against `ctx`.
    ///
    /// Returns `Err` only when the run cannot start. Failures inside the job are
    /// reported through the outcome and `ctx`'s error log.
    #[instrument(skip_all, fields(job = %job.name()))]
    pub fn run(&self, ctx: &mut JobContext, job: &Scope) -> Result<RunOutcome, RunError> {
        if let Ok(frame) = ctx.current_scope() {
            return Err(RunError::ContextInUse(frame.id));
        }
        if ctx.has_run() {
            return Err(RunError::ContextSpent);
        }
        let problems = validate_invariants(job);
        if !problems.is_empty() {
            return Err(RunError::InvalidTree(problems));
        }

        info!("job started");
        self.execute(ctx, job);

        let errors = ctx.errors(job.id()).len();
        let outcome = if errors == 0 {
            RunOutcome::Passed
        } else {
            RunOutcome::Failed { errors }
        };
        info!(?outcome, "job finished");
        Ok(outcome)
    }

    fn execute(&self, ctx: &mut JobContext, scope: &Scope) {
        let mut guard = ctx.enter(scope);
        let ctx: &mut JobContext = &mut guard;

        if gate(ctx, scope) {
            match scope.kind() {
                ScopeKind::Step => {
                    if let Some(action) = scope.action() {
                        invoke_recording(ctx, scope.id(), FailureKind::Action, action);
                    }
                }
                ScopeKind::Job | ScopeKind::Stage => {
                    for child in scope.children() {
                        self.execute(ctx, child);
                    }
                }
            }
        }

        run_teardown(ctx, scope);
    }
}

/// Convenience for `JobRunner::new().run(ctx, job)`.
pub fn run(ctx: &mut JobContext, job: &Scope) -> Result<RunOutcome, RunError> {
    JobRunner::new().run(ctx, job)
}

/// Decide whether the body of `scope` runs.
///
/// Each condition is evaluated at most once. Evaluation errors are recorded
/// against `scope` and close the gate.
fn gate(ctx: &mut JobContext, scope: &Scope) -> bool {
    let id = scope.id();
    if let Some(condition) = scope.run_if() {
        let Some(outcome) = check(ctx, id, condition, "run_if") else {
            ctx.mark_skipped(id, Some("run_if could not be evaluated"));
            return false;
        };
        if !outcome.value {
            let reason = format!("run_if not met: {}", explain(outcome, condition));
            ctx.mark_skipped(id, Some(&reason));
            return false;
        }
    }
    if let Some(condition) = scope.skip_if() {
        let Some(outcome) = check(ctx, id, condition, "skip_if") else {
            ctx.mark_skipped(id, Some("skip_if could not be evaluated"));
            return false;
        };
        if outcome.value {
            let reason = format!("skip_if: {}", explain(outcome, condition));
            ctx.mark_skipped(id, Some(&reason));
            return false;
        }
    }
    true
}

/// `None` means the condition errored; the error is already recorded.
fn check(ctx: &mut JobContext, id: ScopeId, condition: &Condition, label: &str) -> Option<Outcome> {
    match condition.evaluate(ctx) {
        Ok(outcome) => {
            debug!(
                %id,
                condition = label,
                value = outcome.value,
                reason = outcome.reason.as_deref().unwrap_or(""),
                "condition evaluated"
            );
            Some(outcome)
        }
        Err(err) => {
            ctx.record_error(id, FailureKind::Condition, err.context(format!("{label} failed")));
            None
        }
    }
}

fn explain(outcome: Outcome, condition: &Condition) -> String {
    outcome.reason.unwrap_or_else(|| condition.describe())
}

/// Drain dynamic teardown (LIFO), run static teardown (FIFO), then drain
/// anything static teardown registered before closing the scope.
fn run_teardown(ctx: &mut JobContext, scope: &Scope) {
    let id = scope.id();
    ctx.begin_teardown(id);
    drain_dynamic(ctx, id);
    for action in scope.teardown() {
        invoke_recording(ctx, id, FailureKind::Teardown, action.as_ref());
    }
    drain_dynamic(ctx, id);
    ctx.close_teardown(id);
}

fn drain_dynamic(ctx: &mut JobContext, id: ScopeId) {
    while let Some(action) = ctx.pop_dynamic_teardown(id) {
        invoke_recording(ctx, id, FailureKind::Teardown, action.as_ref());
    }
}

fn invoke_recording(ctx: &mut JobContext, id: ScopeId, kind: FailureKind, action: &dyn Action) {
    debug!(%id, action = %action.describe(), "invoking");
    if let Err(err) = action.invoke(ctx) {
        ctx.record_error(id, kind, err);
    }
}
