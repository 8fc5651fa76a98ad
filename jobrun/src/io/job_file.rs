//! Job definitions stored as TOML, validated against the embedded schema.
//!
//! ```toml
//! name = "verify"
//!
//! [[stages]]
//! name = "test"
//!
//! [[stages.steps]]
//! name = "unit"
//! run = "cargo test"
//!
//! [[stages.steps]]
//! name = "report"
//! run_if = "failing(test/unit)"
//! command = ["cat", "target/report.txt"]
//! ```
//!
//! Condition expressions: `true`, `false`, `"always"`, `"never"`, `"failing"`,
//! `"succeeding"`, `"failing(<path>)"`, `"succeeding(<path>)"` and
//! `"value(<key>)"`. Paths are relative to the job (`stage` or `stage/step`).

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::core::builder::{ConfigureScope, JobBuilder};
use crate::core::condition::{
    Condition, always, job_failing, job_succeeding, never, path_failing, path_succeeding,
    value_true,
};
use crate::core::invariants::validate_invariants;
use crate::core::scope::Scope;
use crate::io::config::RunnerConfig;
use crate::io::shell::ShellAction;

const JOB_SCHEMA: &str = include_str!("../../schemas/job.v1.schema.json");

static CALL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(failing|succeeding|value)\(\s*([^()\s]+)\s*\)$").ok());

#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    pub name: String,
    #[serde(flatten)]
    pub gates: GateSpec,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageSpec {
    pub name: String,
    #[serde(flatten)]
    pub gates: GateSpec,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepSpec {
    pub name: String,
    #[serde(flatten)]
    pub gates: GateSpec,
    pub run: Option<String>,
    pub command: Option<Vec<String>>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Settings shared by every scope kind.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateSpec {
    pub run_if: Option<ConditionSpec>,
    pub skip_if: Option<ConditionSpec>,
    #[serde(default)]
    pub teardown: Vec<CommandSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ConditionSpec {
    Flag(bool),
    Expr(String),
}

/// A teardown entry: a script string or an argv array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Script(String),
    Argv(Vec<String>),
}

/// Parsed condition expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionExpr {
    Const(bool),
    Always,
    Never,
    JobFailing,
    JobSucceeding,
    PathFailing(String),
    PathSucceeding(String),
    Value(String),
}

pub fn parse_condition(spec: &ConditionSpec) -> Result<ConditionExpr> {
    let expr = match spec {
        ConditionSpec::Flag(value) => return Ok(ConditionExpr::Const(*value)),
        ConditionSpec::Expr(expr) => expr.trim(),
    };
    match expr {
        "true" => return Ok(ConditionExpr::Const(true)),
        "false" => return Ok(ConditionExpr::Const(false)),
        "always" => return Ok(ConditionExpr::Always),
        "never" => return Ok(ConditionExpr::Never),
        "failing" => return Ok(ConditionExpr::JobFailing),
        "succeeding" => return Ok(ConditionExpr::JobSucceeding),
        _ => {}
    }
    let re = CALL_RE
        .as_ref()
        .ok_or_else(|| anyhow!("condition pattern failed to compile"))?;
    let caps = re
        .captures(expr)
        .ok_or_else(|| anyhow!("unknown condition '{expr}'"))?;
    let arg = caps[2].to_string();
    match &caps[1] {
        "failing" => Ok(ConditionExpr::PathFailing(arg)),
        "succeeding" => Ok(ConditionExpr::PathSucceeding(arg)),
        _ => Ok(ConditionExpr::Value(arg)),
    }
}

/// Load, validate and build the job at `path`.
pub fn load_job(path: &Path, cfg: &RunnerConfig) -> Result<Scope> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read job {}", path.display()))?;
    let spec = parse_job_spec(&contents).with_context(|| format!("load job {}", path.display()))?;
    build_job(&spec, cfg).with_context(|| format!("invalid job {}", path.display()))
}

/// Parse TOML and check it against the job schema.
pub fn parse_job_spec(contents: &str) -> Result<JobSpec> {
    let value: Value = toml::from_str(contents).context("parse job toml")?;
    validate_schema(&value)?;
    serde_json::from_value(value).context("deserialize job")
}

fn validate_schema(job: &Value) -> Result<()> {
    let schema_value: Value = serde_json::from_str(JOB_SCHEMA).context("parse job schema")?;
    let compiled = validator_for(&schema_value).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(job) {
        let messages = compiled
            .iter_errors(job)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!("job schema validation failed: {}", messages.join("; ")));
    }
    Ok(())
}

/// Turn a validated spec into a scope tree.
///
/// Every problem found (bad condition, unknown path, tree invariant) is
/// reported at once.
pub fn build_job(spec: &JobSpec, cfg: &RunnerConfig) -> Result<Scope> {
    let known = known_paths(spec);
    let mut problems = Vec::new();
    let mut job = JobBuilder::new(&spec.name);
    apply_gates(&mut job, &spec.gates, &spec.name, &spec.name, &known, cfg, &mut problems);

    for stage_spec in &spec.stages {
        let stage_path = format!("{}/{}", spec.name, stage_spec.name);
        job.stage(&stage_spec.name, |stage| {
            apply_gates(stage, &stage_spec.gates, &stage_path, &spec.name, &known, cfg, &mut problems);
            for step_spec in &stage_spec.steps {
                let step_path = format!("{stage_path}/{}", step_spec.name);
                stage.step(&step_spec.name, |step| {
                    apply_gates(step, &step_spec.gates, &step_path, &spec.name, &known, cfg, &mut problems);
                    if let Some(action) = step_action(step_spec, cfg) {
                        step.action(action);
                    }
                });
            }
        });
    }

    let tree = job.build();
    problems.extend(validate_invariants(&tree));
    if !problems.is_empty() {
        return Err(anyhow!("{}", problems.join("; ")));
    }
    debug!(job = %spec.name, scopes = tree.walk().len(), "job built");
    Ok(tree)
}

fn known_paths(spec: &JobSpec) -> HashSet<String> {
    let mut known = HashSet::new();
    for stage in &spec.stages {
        known.insert(stage.name.clone());
        for step in &stage.steps {
            known.insert(format!("{}/{}", stage.name, step.name));
        }
    }
    known
}

fn apply_gates<B: ConfigureScope>(
    builder: &mut B,
    gates: &GateSpec,
    scope_path: &str,
    job_name: &str,
    known: &HashSet<String>,
    cfg: &RunnerConfig,
    problems: &mut Vec<String>,
) {
    if let Some(spec) = &gates.run_if {
        match resolve_condition(spec, job_name, known) {
            Ok(condition) => {
                builder.run_if(condition);
            }
            Err(err) => problems.push(format!("{scope_path}: run_if: {err}")),
        }
    }
    if let Some(spec) = &gates.skip_if {
        match resolve_condition(spec, job_name, known) {
            Ok(condition) => {
                builder.skip_if(condition);
            }
            Err(err) => problems.push(format!("{scope_path}: skip_if: {err}")),
        }
    }
    for entry in &gates.teardown {
        let action = match entry {
            CommandSpec::Script(script) => ShellAction::script(script, cfg),
            CommandSpec::Argv(argv) => ShellAction::command(argv.clone(), cfg),
        };
        builder.teardown(action);
    }
}

fn resolve_condition(
    spec: &ConditionSpec,
    job_name: &str,
    known: &HashSet<String>,
) -> Result<Condition> {
    let condition = match parse_condition(spec)? {
        ConditionExpr::Const(value) => Condition::from(value),
        ConditionExpr::Always => always(),
        ConditionExpr::Never => never(),
        ConditionExpr::JobFailing => job_failing(),
        ConditionExpr::JobSucceeding => job_succeeding(),
        ConditionExpr::PathFailing(path) => {
            check_path(&path, known)?;
            path_failing(format!("{job_name}/{path}"))
        }
        ConditionExpr::PathSucceeding(path) => {
            check_path(&path, known)?;
            path_succeeding(format!("{job_name}/{path}"))
        }
        ConditionExpr::Value(key) => value_true(key),
    };
    Ok(condition)
}

fn check_path(path: &str, known: &HashSet<String>) -> Result<()> {
    if known.contains(path) {
        Ok(())
    } else {
        Err(anyhow!("unknown scope path '{path}'"))
    }
}

fn step_action(spec: &StepSpec, cfg: &RunnerConfig) -> Option<ShellAction> {
    let mut action = match (&spec.run, &spec.command) {
        (Some(script), _) => ShellAction::script(script, cfg),
        (None, Some(argv)) => ShellAction::command(argv.clone(), cfg),
        (None, None) => return None,
    };
    for (key, value) in &spec.env {
        action = action.env(key, value);
    }
    if let Some(cwd) = &spec.cwd {
        action = action.in_dir(cwd);
    }
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name = "verify"
teardown = ["echo done"]

[[stages]]
name = "test"
skip_if = "value(skip_tests)"

[[stages.steps]]
name = "unit"
run = "cargo test"

[[stages.steps]]
name = "report"
run_if = "failing(test/unit)"
command = ["cat", "report.txt"]
env = { VERBOSE = "1" }
"#;

    fn build(contents: &str) -> Result<Scope> {
        build_job(&parse_job_spec(contents)?, &RunnerConfig::default())
    }

    #[test]
    fn sample_job_builds() {
        let tree = build(SAMPLE).expect("build");
        assert_eq!(
            tree.outline(),
            "Job verify [teardown: 1]\n\
             \x20 Stage test [skip_if: value skip_tests is true]\n\
             \x20   Step unit: cargo test\n\
             \x20   Step report: cat report.txt [run_if: verify/test/unit has failures]\n"
        );
    }

    #[test]
    fn parses_every_condition_form() {
        let expr = |s: &str| parse_condition(&ConditionSpec::Expr(s.to_string())).expect(s);
        assert_eq!(
            parse_condition(&ConditionSpec::Flag(false)).expect("flag"),
            ConditionExpr::Const(false)
        );
        assert_eq!(expr("true"), ConditionExpr::Const(true));
        assert_eq!(expr("always"), ConditionExpr::Always);
        assert_eq!(expr("never"), ConditionExpr::Never);
        assert_eq!(expr("failing"), ConditionExpr::JobFailing);
        assert_eq!(expr(" succeeding "), ConditionExpr::JobSucceeding);
        assert_eq!(
            expr("failing(build/compile)"),
            ConditionExpr::PathFailing("build/compile".to_string())
        );
        assert_eq!(
            expr("succeeding( build )"),
            ConditionExpr::PathSucceeding("build".to_string())
        );
        assert_eq!(expr("value(docker.push)"), ConditionExpr::Value("docker.push".to_string()));
        assert!(parse_condition(&ConditionSpec::Expr("sometimes".to_string())).is_err());
        assert!(parse_condition(&ConditionSpec::Expr("failing()".to_string())).is_err());
    }

    #[test]
    fn schema_rejects_run_and_command_together() {
        let err = parse_job_spec(
            r#"
name = "ci"
[[stages]]
name = "build"
[[stages.steps]]
name = "both"
run = "make"
command = ["make"]
"#,
        )
        .expect_err("schema");
        assert!(err.to_string().contains("job schema validation failed"));
    }

    #[test]
    fn schema_rejects_unknown_fields() {
        let err = parse_job_spec("name = \"ci\"\nretries = 3\n").expect_err("schema");
        assert!(err.to_string().contains("job schema validation failed"));
    }

    #[test]
    fn unknown_paths_and_duplicates_are_reported_together() {
        let err = build(
            r#"
name = "ci"
[[stages]]
name = "build"
run_if = "failing(deploy)"
[[stages.steps]]
name = "x"
[[stages.steps]]
name = "x"
"#,
        )
        .expect_err("invalid");
        let message = err.to_string();
        assert!(message.contains("ci/build: run_if: unknown scope path 'deploy'"));
        assert!(message.contains("ci/build: duplicate child name 'x'"));
    }

    #[test]
    fn load_job_reads_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("job.toml");
        fs::write(&path, SAMPLE).expect("write");
        let tree = load_job(&path, &RunnerConfig::default()).expect("load");
        assert_eq!(tree.name(), "verify");
        assert!(load_job(&temp.path().join("missing.toml"), &RunnerConfig::default()).is_err());
    }
}
