//! The static scope tree: a Job owns Stages, a Stage owns Steps.
//!
//! Trees are assembled by [`crate::core::builder`] and are immutable afterwards.
//! Children keep declaration order, which is also execution order.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::action::Action;
use crate::core::condition::Condition;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Job,
    Stage,
    Step,
}

impl ScopeKind {
    /// Kind every child of this kind must have, or `None` for leaves.
    pub fn child_kind(self) -> Option<ScopeKind> {
        match self {
            ScopeKind::Job => Some(ScopeKind::Stage),
            ScopeKind::Stage => Some(ScopeKind::Step),
            ScopeKind::Step => None,
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScopeKind::Job => "Job",
            ScopeKind::Stage => "Stage",
            ScopeKind::Step => "Step",
        };
        f.write_str(label)
    }
}

/// A node of the job tree.
pub struct Scope {
    pub(crate) id: ScopeId,
    pub(crate) kind: ScopeKind,
    pub(crate) name: String,
    pub(crate) parent: Option<ScopeId>,
    pub(crate) run_if: Option<Condition>,
    pub(crate) skip_if: Option<Condition>,
    pub(crate) teardown: Vec<Box<dyn Action>>,
    pub(crate) action: Option<Box<dyn Action>>,
    pub(crate) children: Vec<Scope>,
}

impl Scope {
    pub(crate) fn new(id: ScopeId, kind: ScopeKind, name: String, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            kind,
            name,
            parent,
            run_if: None,
            skip_if: None,
            teardown: Vec::new(),
            action: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enclosing scope, `None` for the root.
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn run_if(&self) -> Option<&Condition> {
        self.run_if.as_ref()
    }

    pub fn skip_if(&self) -> Option<&Condition> {
        self.skip_if.as_ref()
    }

    /// Build-time teardown actions, in execution (declaration) order.
    pub fn teardown(&self) -> &[Box<dyn Action>] {
        &self.teardown
    }

    /// The step's action. Always `None` for jobs and stages.
    pub fn action(&self) -> Option<&dyn Action> {
        self.action.as_deref()
    }

    pub fn children(&self) -> &[Scope] {
        &self.children
    }

    /// Find a scope by id anywhere in this subtree (including `self`).
    pub fn find(&self, id: ScopeId) -> Option<&Scope> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Find a descendant by `/`-separated names relative to this scope.
    ///
    /// An empty path resolves to `self`.
    pub fn find_path(&self, path: &str) -> Option<&Scope> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.children.iter().find(|c| c.name == segment)?;
        }
        Some(current)
    }

    /// Depth-first, pre-order walk of this subtree.
    pub fn walk(&self) -> Vec<&Scope> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// Indented, human-readable rendering of the subtree (one scope per line).
    pub fn outline(&self) -> String {
        let mut buf = String::new();
        self.write_outline(&mut buf, 0);
        buf
    }

    fn write_outline(&self, buf: &mut String, depth: usize) {
        buf.push_str(&"  ".repeat(depth));
        buf.push_str(&self.to_string());
        if let Some(action) = &self.action {
            buf.push_str(&format!(": {}", action.describe()));
        }
        if let Some(cond) = &self.run_if {
            buf.push_str(&format!(" [run_if: {}]", cond.describe()));
        }
        if let Some(cond) = &self.skip_if {
            buf.push_str(&format!(" [skip_if: {}]", cond.describe()));
        }
        if !self.teardown.is_empty() {
            buf.push_str(&format!(" [teardown: {}]", self.teardown.len()));
        }
        buf.push('\n');
        for child in &self.children {
            child.write_outline(buf, depth + 1);
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("run_if", &self.run_if)
            .field("skip_if", &self.skip_if)
            .field("teardown", &self.teardown.len())
            .field("action", &self.action.as_ref().map(|a| a.describe()))
            .field("children", &self.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Scope {
        let job_id = ScopeId::next();
        let stage_id = ScopeId::next();
        let mut job = Scope::new(job_id, ScopeKind::Job, "job".to_string(), None);
        let mut stage = Scope::new(stage_id, ScopeKind::Stage, "build".to_string(), Some(job_id));
        stage.children.push(Scope::new(
            ScopeId::next(),
            ScopeKind::Step,
            "compile".to_string(),
            Some(stage_id),
        ));
        job.children.push(stage);
        job
    }

    #[test]
    fn scope_ids_are_unique() {
        let a = ScopeId::next();
        let b = ScopeId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn find_path_walks_names() {
        let job = tree();
        let step = job.find_path("build/compile").expect("step");
        assert_eq!(step.kind(), ScopeKind::Step);
        assert_eq!(job.find_path("").map(Scope::name), Some("job"));
        assert!(job.find_path("build/missing").is_none());
        assert_eq!(job.find(step.id()).map(Scope::name), Some("compile"));
    }

    #[test]
    fn walk_is_preorder() {
        let job = tree();
        let names: Vec<&str> = job.walk().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["job", "build", "compile"]);
    }

    #[test]
    fn outline_indents_children() {
        let outline = tree().outline();
        assert_eq!(outline, "Job job\n  Stage build\n    Step compile\n");
    }
}
