//! Run/skip conditions and their evaluation.
//!
//! Every accepted representation (a plain `bool`, a `bool` with an explanation,
//! a context predicate) is normalized into [`Condition`] when the tree is built,
//! so evaluation never branches on how the condition was written.

use std::fmt;

use anyhow::Result;

use crate::core::context::JobContext;
use crate::core::scope::ScopeId;
use crate::core::values::as_bool;

type PredicateFn = dyn Fn(&JobContext) -> Result<bool>;

pub enum Condition {
    Static {
        value: bool,
        reason: Option<String>,
    },
    Predicate {
        func: Box<PredicateFn>,
        reason: Option<String>,
    },
}

/// Result of evaluating a condition once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub value: bool,
    pub reason: Option<String>,
}

impl Condition {
    pub fn predicate<F>(func: F) -> Self
    where
        F: Fn(&JobContext) -> Result<bool> + 'static,
    {
        Condition::Predicate {
            func: Box::new(func),
            reason: None,
        }
    }

    /// Predicate carrying an explanation that is reported alongside its result.
    pub fn predicate_with_reason<F>(reason: impl Into<String>, func: F) -> Self
    where
        F: Fn(&JobContext) -> Result<bool> + 'static,
    {
        Condition::Predicate {
            func: Box::new(func),
            reason: Some(reason.into()),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Condition::Static { reason, .. } | Condition::Predicate { reason, .. } => {
                reason.as_deref()
            }
        }
    }

    /// Evaluate against the current context state.
    ///
    /// Predicates may observe state mutated by earlier scopes, so callers must
    /// evaluate once per gating decision and reuse the outcome.
    pub fn evaluate(&self, ctx: &JobContext) -> Result<Outcome> {
        match self {
            Condition::Static { value, reason } => Ok(Outcome {
                value: *value,
                reason: reason.clone(),
            }),
            Condition::Predicate { func, reason } => Ok(Outcome {
                value: func(ctx)?,
                reason: reason.clone(),
            }),
        }
    }

    pub fn describe(&self) -> String {
        match (self, self.reason()) {
            (_, Some(reason)) => reason.to_string(),
            (Condition::Static { value, .. }, None) => value.to_string(),
            (Condition::Predicate { .. }, None) => "<predicate>".to_string(),
        }
    }
}

/// Free-function form of [`Condition::evaluate`].
pub fn evaluate(condition: &Condition, ctx: &JobContext) -> Result<Outcome> {
    condition.evaluate(ctx)
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Condition::Static {
            value,
            reason: None,
        }
    }
}

impl From<(bool, &str)> for Condition {
    fn from((value, reason): (bool, &str)) -> Self {
        Condition::Static {
            value,
            reason: Some(reason.to_string()),
        }
    }
}

impl From<(bool, String)> for Condition {
    fn from((value, reason): (bool, String)) -> Self {
        Condition::Static {
            value,
            reason: Some(reason),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Static { value, reason } => f
                .debug_struct("Static")
                .field("value", value)
                .field("reason", reason)
                .finish(),
            Condition::Predicate { reason, .. } => f
                .debug_struct("Predicate")
                .field("reason", reason)
                .finish_non_exhaustive(),
        }
    }
}

pub fn always() -> Condition {
    Condition::predicate_with_reason("always", |_| Ok(true))
}

pub fn never() -> Condition {
    Condition::predicate_with_reason("never", |_| Ok(false))
}

/// True once any error has been recorded anywhere in the run.
pub fn job_failing() -> Condition {
    Condition::predicate_with_reason("job has failures", |ctx| Ok(ctx.is_failing()))
}

pub fn job_succeeding() -> Condition {
    Condition::predicate_with_reason("job is succeeding", |ctx| Ok(!ctx.is_failing()))
}

/// True once an error has been recorded against `scope` or any descendant.
pub fn scope_failing(scope: ScopeId) -> Condition {
    Condition::predicate_with_reason(format!("scope {scope} has failures"), move |ctx| {
        Ok(ctx.is_scope_failing(scope))
    })
}

pub fn scope_succeeding(scope: ScopeId) -> Condition {
    Condition::predicate_with_reason(format!("scope {scope} is succeeding"), move |ctx| {
        Ok(!ctx.is_scope_failing(scope))
    })
}

/// Like [`scope_failing`], naming the scope by its full path (`job/stage/step`).
///
/// A scope that has not been entered yet has no errors.
pub fn path_failing(path: impl Into<String>) -> Condition {
    let path = path.into();
    Condition::predicate_with_reason(format!("{path} has failures"), move |ctx| {
        Ok(ctx
            .scope_by_path(&path)
            .is_some_and(|frame| ctx.is_scope_failing(frame.id)))
    })
}

pub fn path_succeeding(path: impl Into<String>) -> Condition {
    let path = path.into();
    Condition::predicate_with_reason(format!("{path} is succeeding"), move |ctx| {
        Ok(!ctx
            .scope_by_path(&path)
            .is_some_and(|frame| ctx.is_scope_failing(frame.id)))
    })
}

/// True if the (scoped) value under `key` coerces to `true`.
///
/// Missing keys and unparseable values are evaluation errors.
pub fn value_true(key: impl Into<String>) -> Condition {
    let key = key.into();
    Condition::predicate_with_reason(format!("value {key} is true"), move |ctx| {
        Ok(ctx.value_as(&key, as_bool)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn static_condition_returns_stored_outcome() {
        let ctx = JobContext::default();
        let outcome = Condition::from((true, "disabled")).evaluate(&ctx).expect("eval");
        assert_eq!(
            outcome,
            Outcome {
                value: true,
                reason: Some("disabled".to_string()),
            }
        );
        let plain = evaluate(&false.into(), &ctx).expect("eval");
        assert!(!plain.value);
        assert_eq!(plain.reason, None);
    }

    #[test]
    fn predicate_errors_propagate() {
        let ctx = JobContext::default();
        let cond = Condition::predicate(|_| Err(anyhow!("boom")));
        let err = cond.evaluate(&ctx).expect_err("error");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn builtins_on_clean_context() {
        let ctx = JobContext::default();
        assert!(always().evaluate(&ctx).expect("always").value);
        assert!(!never().evaluate(&ctx).expect("never").value);
        assert!(!job_failing().evaluate(&ctx).expect("failing").value);
        assert!(job_succeeding().evaluate(&ctx).expect("succeeding").value);
        assert!(!path_failing("job/stage").evaluate(&ctx).expect("path").value);
    }

    #[test]
    fn value_true_fails_on_missing_key() {
        let ctx = JobContext::default();
        assert!(value_true("dry_run").evaluate(&ctx).is_err());
    }

    #[test]
    fn describe_prefers_reason() {
        assert_eq!(job_failing().describe(), "job has failures");
        assert_eq!(Condition::from(false).describe(), "false");
        assert_eq!(Condition::predicate(|_| Ok(true)).describe(), "<predicate>");
    }
}
