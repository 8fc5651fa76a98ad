//! Test-only helpers for building jobs and observing what ran.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::action::{Action, FnAction};
use crate::core::context::JobContext;
use crate::core::values::Values;

/// Shared, ordered log of labels pushed by recording actions.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, label: impl Into<String>) {
        self.events.borrow_mut().push(label.into());
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events.borrow().iter().filter(|e| *e == label).count()
    }

    /// Action that records `label` and succeeds.
    pub fn action(&self, label: &str) -> Box<dyn Action> {
        let events = self.events.clone();
        let label = label.to_string();
        Box::new(FnAction::new(label.clone(), move |_ctx: &mut JobContext| {
            events.borrow_mut().push(label.clone());
            Ok(())
        }))
    }

    /// Action that records `label` and then fails with `message`.
    pub fn failing(&self, label: &str, message: &str) -> Box<dyn Action> {
        let events = self.events.clone();
        let label = label.to_string();
        let message = message.to_string();
        Box::new(FnAction::new(label.clone(), move |_ctx: &mut JobContext| {
            events.borrow_mut().push(label.clone());
            Err(anyhow!(message.clone()))
        }))
    }
}

/// Build [`Values`] from a JSON object literal.
pub fn values(value: serde_json::Value) -> Values {
    match value {
        serde_json::Value::Object(map) => Values::new(map),
        _ => Values::default(),
    }
}

/// Write `contents` to `name` inside a fresh temp dir.
///
/// The returned [`TempDir`] must outlive the path.
pub fn write_temp_file(name: &str, contents: &str) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join(name);
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok((dir, path))
}
