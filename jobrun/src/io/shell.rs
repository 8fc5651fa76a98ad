//! Actions that run external commands.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::info;

use crate::core::action::Action;
use crate::core::context::JobContext;
use crate::io::config::RunnerConfig;
use crate::io::process::{ProcessRequest, run_process};

/// Environment variable carrying the running scope's path (`job/stage/step`).
pub const SCOPE_ENV: &str = "JOBRUN_SCOPE";

/// Runs a command, forwarding its output to the context's listeners.
///
/// Fails when the command cannot be spawned, times out or exits non-zero.
#[derive(Debug, Clone)]
pub struct ShellAction {
    label: String,
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl ShellAction {
    /// Run `argv` directly, without a shell.
    pub fn command(argv: Vec<String>, cfg: &RunnerConfig) -> Self {
        Self {
            label: argv.join(" "),
            argv,
            cwd: None,
            env: Vec::new(),
            timeout: cfg.command_timeout(),
            output_limit_bytes: cfg.output_limit_bytes,
        }
    }

    /// Run `script` through the configured shell (`sh -c <script>` by default).
    pub fn script(script: &str, cfg: &RunnerConfig) -> Self {
        let mut argv = cfg.shell.clone();
        argv.push(script.to_string());
        Self {
            label: script.to_string(),
            ..Self::command(argv, cfg)
        }
    }

    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl Action for ShellAction {
    fn invoke(&self, ctx: &mut JobContext) -> Result<()> {
        let mut request = ProcessRequest::new(self.argv.clone(), self.timeout, self.output_limit_bytes);
        request.cwd = self.cwd.clone();
        request.env = self.env.clone();
        if let Ok(frame) = ctx.current_scope() {
            request.env.push((SCOPE_ENV.to_string(), frame.path.clone()));
        }

        info!(command = %self.label, "running command");
        let output = run_process(&request)?;

        let stdout = output.stdout_text();
        if !stdout.is_empty() {
            ctx.output("stdout", &stdout);
        }
        let stderr = output.stderr_text();
        if !stderr.is_empty() {
            ctx.output("stderr", &stderr);
        }

        if output.success() {
            return Ok(());
        }
        if output.timed_out {
            bail!(
                "`{}` timed out after {}s",
                self.label,
                self.timeout.as_secs()
            );
        }
        match output.status.code() {
            Some(code) => bail!("`{}` exited with status {code}", self.label),
            None => bail!("`{}` was terminated by a signal", self.label),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
