//! Orchestration for `jobrun run`: build a context, execute, summarize.

use std::io::Write;

use anyhow::Result;
use tracing::info;

use crate::core::context::JobContext;
use crate::core::runner::{JobRunner, RunOutcome};
use crate::exit_codes;
use crate::io::reporter::reporter_for;
use crate::validate::LoadedJob;

/// What happened during a run, detached from the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub job: String,
    pub outcome: RunOutcome,
    /// Rendered recorded errors, in record order.
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn exit_code(&self) -> i32 {
        if self.outcome.is_failing() {
            exit_codes::FAILED
        } else {
            exit_codes::OK
        }
    }

    /// One-line summary for the end of a run.
    pub fn summary(&self) -> String {
        match self.outcome {
            RunOutcome::Passed => format!("job {} passed", self.job),
            RunOutcome::Failed { errors } => {
                let noun = if errors == 1 { "error" } else { "errors" };
                format!("job {} failed with {errors} {noun}", self.job)
            }
        }
    }
}

/// Run `loaded`, sending progress to `progress` per the configured reporter.
pub fn run_job<W: Write + 'static>(loaded: LoadedJob, progress: W) -> Result<RunReport> {
    let LoadedJob {
        config,
        job,
        values,
    } = loaded;

    let mut ctx = JobContext::new(values);
    if let Some(reporter) = reporter_for(config.reporter, progress) {
        ctx.add_listener(reporter);
    }

    let outcome = JobRunner::new().run(&mut ctx, &job)?;
    let errors = ctx
        .errors(job.id())
        .iter()
        .map(|err| err.to_string())
        .collect();
    info!(job = job.name(), ?outcome, "run complete");
    Ok(RunReport {
        job: job.name().to_string(),
        outcome,
        errors,
    })
}
