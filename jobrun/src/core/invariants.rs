//! Structural invariants of a scope tree.

use std::collections::HashSet;

use crate::core::scope::{Scope, ScopeKind};

/// Check the tree rooted at `root`:
/// - The root is a Job
/// - Jobs contain only Stages, Stages only Steps, Steps nothing
/// - Only Steps carry an action
/// - Names are non-empty, contain no `/`, and are unique among siblings
/// - Every child's parent link points at its container
/// - No scope id appears twice
pub fn validate_invariants(root: &Scope) -> Vec<String> {
    let mut errors = Vec::new();
    if root.kind() != ScopeKind::Job {
        errors.push(format!("{}: root scope must be a Job", root.name()));
    }
    if root.parent().is_some() {
        errors.push(format!("{}: root scope must not have a parent", root.name()));
    }
    let mut seen = HashSet::new();
    validate_scope(root, &mut seen, &mut errors, root.name());
    errors
}

fn validate_scope(
    scope: &Scope,
    seen: &mut HashSet<u64>,
    errors: &mut Vec<String>,
    path: &str,
) {
    if !seen.insert(scope.id().as_u64()) {
        errors.push(format!("{path}: duplicate scope id {}", scope.id()));
    }

    if let Some(problem) = name_problem(scope.name()) {
        errors.push(format!("{path}: {problem}"));
    }

    if scope.action().is_some() && scope.kind() != ScopeKind::Step {
        errors.push(format!("{path}: only steps may carry an action"));
    }

    match scope.kind().child_kind() {
        None if !scope.children().is_empty() => {
            errors.push(format!("{path}: steps cannot contain children"));
        }
        Some(expected) => {
            for child in scope.children() {
                if child.kind() != expected {
                    errors.push(format!(
                        "{path}/{}: a {} may only contain {}s, found {}",
                        child.name(),
                        scope.kind(),
                        expected,
                        child.kind()
                    ));
                }
            }
        }
        None => {}
    }

    let mut names = HashSet::new();
    for child in scope.children() {
        if !names.insert(child.name()) {
            errors.push(format!("{path}: duplicate child name '{}'", child.name()));
        }
        if child.parent() != Some(scope.id()) {
            errors.push(format!(
                "{path}/{}: parent link does not point at its container",
                child.name()
            ));
        }
    }

    for child in scope.children() {
        let child_path = format!("{path}/{}", child.name());
        validate_scope(child, seen, errors, &child_path);
    }
}

/// Reason `name` is unusable as a scope name, if any.
pub fn name_problem(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        Some("scope name must not be empty")
    } else if name.contains('/') {
        Some("scope name must not contain '/'")
    } else {
        None
    }
}
