//! Console progress output for `jobrun run`.

use std::io::Write;

use tracing::warn;

use crate::core::context::ScopeFrame;
use crate::core::errors::RecordedError;
use crate::core::status::{ScopeStatus, StatusListener};
use crate::io::config::ReporterKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Indented lines, one per event.
    Plain,
    /// GitHub Actions workflow commands.
    Github,
}

/// Writes run progress to `out`.
pub struct ConsoleReporter<W: Write> {
    out: W,
    style: Style,
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, style: Style) -> Self {
        Self { out, style }
    }

    fn emit(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}") {
            warn!(%err, "failed to write progress");
        }
    }
}

/// Reporter for `kind`, or `None` when progress output is disabled.
pub fn reporter_for<W: Write + 'static>(
    kind: ReporterKind,
    out: W,
) -> Option<Box<dyn StatusListener>> {
    match kind.resolve() {
        ReporterKind::Quiet => None,
        ReporterKind::Github => Some(Box::new(ConsoleReporter::new(out, Style::Github))),
        ReporterKind::Plain | ReporterKind::Auto => {
            Some(Box::new(ConsoleReporter::new(out, Style::Plain)))
        }
    }
}

fn indent(frame: &ScopeFrame) -> String {
    "  ".repeat(frame.lineage.len().saturating_sub(1))
}

impl<W: Write> StatusListener for ConsoleReporter<W> {
    fn scope_started(&mut self, frame: &ScopeFrame) {
        let line = match self.style {
            Style::Plain => format!("{}{} {}", indent(frame), frame.kind, frame.name),
            Style::Github => format!("::group::{} {}", frame.kind, frame.path),
        };
        self.emit(&line);
    }

    fn scope_skipped(&mut self, frame: &ScopeFrame, reason: Option<&str>) {
        let reason = reason.map(|r| format!(" ({r})")).unwrap_or_default();
        let line = match self.style {
            Style::Plain => format!("{}  skipped{reason}", indent(frame)),
            Style::Github => format!("{} skipped{reason}", frame.path),
        };
        self.emit(&line);
    }

    fn scope_finished(&mut self, frame: &ScopeFrame, status: ScopeStatus) {
        match self.style {
            Style::Plain => {
                let line = format!("{}{} {}: {status}", indent(frame), frame.kind, frame.name);
                self.emit(&line);
            }
            Style::Github => {
                self.emit("::endgroup::");
                let line = format!("{} {}: {status}", frame.kind, frame.path);
                self.emit(&line);
            }
        }
    }

    fn error_recorded(&mut self, error: &RecordedError) {
        let message = format!("{}: {:#}", error.kind, error.error);
        match self.style {
            Style::Plain => {
                let indent = "  ".repeat(error.lineage.len().saturating_sub(1));
                let mut lines = message.lines();
                let first = lines.next().unwrap_or_default();
                self.emit(&format!("{indent}  error: {first}"));
                for line in lines {
                    self.emit(&format!("{indent}    {line}"));
                }
            }
            Style::Github => {
                let line = format!(
                    "::error title={}::{}",
                    escape_property(&error.path),
                    escape_data(&message)
                );
                self.emit(&line);
            }
        }
    }

    fn output(&mut self, frame: Option<&ScopeFrame>, label: &str, text: &str) {
        let prefix = match (self.style, frame) {
            (Style::Plain, Some(frame)) => format!("{}    ", indent(frame)),
            _ => "    ".to_string(),
        };
        self.emit(&format!("{prefix}[{label}]"));
        for line in text.lines() {
            self.emit(&format!("{prefix}{line}"));
        }
    }
}

/// Escape a workflow command message.
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a workflow command property value.
pub fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use anyhow::anyhow;

    use super::*;
    use crate::core::builder::{ConfigureScope, JobBuilder};
    use crate::core::context::JobContext;
    use crate::core::runner::run;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.borrow()).into_owned()
        }
    }

    fn run_with(style: Style) -> String {
        let buf = SharedBuf::default();
        let mut job = JobBuilder::new("ci");
        job.stage("build", |stage| {
            stage.step("compile", |step| {
                step.run(|ctx| {
                    ctx.output("stdout", "ok\n");
                    Err(anyhow!("exit 1\nsee log"))
                });
            });
            stage.step("docs", |step| {
                step.skip_if((true, "disabled"));
            });
        });
        let tree = job.build();
        let mut ctx = JobContext::default().with_listener(ConsoleReporter::new(buf.clone(), style));
        run(&mut ctx, &tree).expect("run");
        buf.text()
    }

    #[test]
    fn plain_output_is_indented() {
        assert_eq!(
            run_with(Style::Plain),
            "Job ci\n\
             \x20 Stage build\n\
             \x20   Step compile\n\
             \x20       [stdout]\n\
             \x20       ok\n\
             \x20     error: action failed: exit 1\n\
             \x20       see log\n\
             \x20   Step compile: failed\n\
             \x20   Step docs\n\
             \x20     skipped (skip_if: disabled)\n\
             \x20   Step docs: skipped\n\
             \x20 Stage build: failed\n\
             Job ci: failed\n"
        );
    }

    #[test]
    fn github_output_uses_workflow_commands() {
        let text = run_with(Style::Github);
        assert!(text.starts_with("::group::Job ci\n::group::Stage ci/build\n"));
        assert!(text.contains("::error title=ci/build/compile::action failed: exit 1%0Asee log\n"));
        assert!(text.contains("ci/build/docs skipped (skip_if: disabled)\n"));
        assert!(text.ends_with("::endgroup::\nJob ci: failed\n"));
    }

    #[test]
    fn escapes_workflow_values() {
        assert_eq!(escape_data("50%\r\ndone"), "50%25%0D%0Adone");
        assert_eq!(escape_property("a:b,c"), "a%3Ab%2Cc");
    }

    #[test]
    fn quiet_has_no_reporter() {
        assert!(reporter_for(ReporterKind::Quiet, SharedBuf::default()).is_none());
        assert!(reporter_for(ReporterKind::Plain, SharedBuf::default()).is_some());
    }
}
