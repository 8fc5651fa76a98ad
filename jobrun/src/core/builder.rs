//! Fluent construction of scope trees.
//!
//! ```
//! use jobrun::core::builder::{ConfigureScope, JobBuilder};
//! use jobrun::core::condition::path_failing;
//!
//! let mut job = JobBuilder::new("verify");
//! job.stage("test", |stage| {
//!     stage.step("unit", |step| {
//!         step.run(|_ctx| Ok(()));
//!     });
//!     stage.step("report", |step| {
//!         step.run_if(path_failing("verify/test")).run(|_ctx| Ok(()));
//!     });
//! });
//! let tree = job.build();
//! assert_eq!(tree.children()[0].children().len(), 2);
//! ```

use anyhow::Result;

use crate::core::action::{Action, FnAction};
use crate::core::condition::Condition;
use crate::core::context::JobContext;
use crate::core::scope::{Scope, ScopeId, ScopeKind};

/// Settings every scope kind accepts.
pub trait ConfigureScope {
    fn scope(&self) -> &Scope;

    fn scope_mut(&mut self) -> &mut Scope;

    fn id(&self) -> ScopeId {
        self.scope().id
    }

    /// Body runs only if this evaluates true.
    fn run_if(&mut self, condition: impl Into<Condition>) -> &mut Self {
        self.scope_mut().run_if = Some(condition.into());
        self
    }

    /// Body is skipped if this evaluates true.
    fn skip_if(&mut self, condition: impl Into<Condition>) -> &mut Self {
        self.scope_mut().skip_if = Some(condition.into());
        self
    }

    /// Append a static teardown action (run in declaration order).
    fn teardown(&mut self, action: impl Action + 'static) -> &mut Self {
        self.scope_mut().teardown.push(Box::new(action));
        self
    }

    fn teardown_fn<F>(&mut self, func: F) -> &mut Self
    where
        F: Fn(&mut JobContext) -> Result<()> + 'static,
    {
        let label = format!("{} teardown", self.scope().name);
        self.teardown(FnAction::new(label, func))
    }
}

pub struct JobBuilder {
    scope: Scope,
}

impl JobBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scope: Scope::new(ScopeId::next(), ScopeKind::Job, name.into(), None),
        }
    }

    /// Append a stage configured by `configure`.
    pub fn stage(
        &mut self,
        name: impl Into<String>,
        configure: impl FnOnce(&mut StageBuilder),
    ) -> ScopeId {
        let mut stage = StageBuilder {
            scope: Scope::new(ScopeId::next(), ScopeKind::Stage, name.into(), Some(self.scope.id)),
        };
        configure(&mut stage);
        let id = stage.scope.id;
        self.scope.children.push(stage.scope);
        id
    }

    pub fn build(self) -> Scope {
        self.scope
    }
}

impl ConfigureScope for JobBuilder {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}

pub struct StageBuilder {
    scope: Scope,
}

impl StageBuilder {
    /// Append a step configured by `configure`.
    pub fn step(
        &mut self,
        name: impl Into<String>,
        configure: impl FnOnce(&mut StepBuilder),
    ) -> ScopeId {
        let mut step = StepBuilder {
            scope: Scope::new(ScopeId::next(), ScopeKind::Step, name.into(), Some(self.scope.id)),
        };
        configure(&mut step);
        let id = step.scope.id;
        self.scope.children.push(step.scope);
        id
    }
}

impl ConfigureScope for StageBuilder {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}

pub struct StepBuilder {
    scope: Scope,
}

impl StepBuilder {
    /// Set the step's action, replacing any earlier one.
    pub fn action(&mut self, action: impl Action + 'static) -> &mut Self {
        self.scope.action = Some(Box::new(action));
        self
    }

    pub fn action_boxed(&mut self, action: Box<dyn Action>) -> &mut Self {
        self.scope.action = Some(action);
        self
    }

    /// Closure action labelled with the step name.
    pub fn run<F>(&mut self, func: F) -> &mut Self
    where
        F: Fn(&mut JobContext) -> Result<()> + 'static,
    {
        let label = self.scope.name.clone();
        self.action(FnAction::new(label, func))
    }
}

impl ConfigureScope for StepBuilder {
    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::always;
    use crate::core::invariants::validate_invariants;

    #[test]
    fn builder_sets_parent_links_and_order() {
        let mut job = JobBuilder::new("ci");
        let build = job.stage("build", |stage| {
            stage.step("compile", |step| {
                step.run(|_| Ok(()));
            });
            stage.step("package", |_| {});
        });
        job.stage("deploy", |_| {});
        let tree = job.build();

        assert!(validate_invariants(&tree).is_empty());
        let names: Vec<&str> = tree.walk().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["ci", "build", "compile", "package", "deploy"]);
        let stage = tree.find(build).expect("stage");
        assert_eq!(stage.parent(), Some(tree.id()));
        assert_eq!(stage.children()[0].parent(), Some(build));
        assert_eq!(
            stage.children()[0].action().map(|a| a.describe()),
            Some("compile".to_string())
        );
    }

    #[test]
    fn conditions_are_normalized_at_build_time() {
        let mut job = JobBuilder::new("ci");
        job.run_if(always()).skip_if((true, "disabled"));
        job.teardown_fn(|_| Ok(()));
        let tree = job.build();
        assert_eq!(tree.run_if().map(Condition::describe), Some("always".to_string()));
        assert_eq!(tree.skip_if().map(Condition::describe), Some("disabled".to_string()));
        assert_eq!(tree.teardown()[0].describe(), "ci teardown");
        assert_eq!(
            tree.outline(),
            "Job ci [run_if: always] [skip_if: disabled] [teardown: 1]\n"
        );
    }

    #[test]
    fn id_reads_through_a_shared_reference() {
        let job = JobBuilder::new("ci");
        let id = job.id();
        assert_eq!(job.scope().name(), "ci");
        assert_eq!(job.build().id(), id);
    }
}
