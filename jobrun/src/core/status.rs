//! Per-scope status and the listener hook used for progress reporting.

use std::fmt;

use crate::core::context::ScopeFrame;
use crate::core::errors::RecordedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeStatus {
    /// Never entered during this run.
    Unknown,
    Running,
    /// Running, with at least one error recorded against it.
    Failing,
    /// Body was gated off by `run_if`/`skip_if`; teardown still ran.
    Skipped,
    Passed,
    Failed,
}

impl fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScopeStatus::Unknown => "unknown",
            ScopeStatus::Running => "running",
            ScopeStatus::Failing => "failing",
            ScopeStatus::Skipped => "skipped",
            ScopeStatus::Passed => "passed",
            ScopeStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Receives run progress from the job context.
///
/// All methods default to no-ops so implementations only pick the events they
/// care about.
pub trait StatusListener {
    fn scope_started(&mut self, _frame: &ScopeFrame) {}

    fn scope_skipped(&mut self, _frame: &ScopeFrame, _reason: Option<&str>) {}

    fn teardown_started(&mut self, _frame: &ScopeFrame) {}

    fn scope_finished(&mut self, _frame: &ScopeFrame, _status: ScopeStatus) {}

    fn error_recorded(&mut self, _error: &RecordedError) {}

    /// Captured output (e.g. a shell action's stdout) attributed to `frame`.
    fn output(&mut self, _frame: Option<&ScopeFrame>, _label: &str, _text: &str) {}
}
