//! CLI tests for `jobrun run`, `validate` and `show`.
//!
//! Spawns the binary against temp job files and checks exit codes and output.

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output};

use jobrun::exit_codes;
use jobrun::test_support::write_temp_file;

const JOB: &str = r#"
name = "ci"
teardown = ["echo job-teardown"]

[[stages]]
name = "build"

[[stages.steps]]
name = "compile"
run = "echo compiling"

[[stages.steps]]
name = "check"
skip_if = "value(skip_check)"
command = ["false"]
"#;

fn jobrun(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jobrun"))
        .current_dir(dir)
        .env_remove("GITHUB_ACTIONS")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("spawn jobrun")
}

#[test]
fn failing_step_exits_with_failed_code() {
    let (dir, _job) = write_temp_file("job.toml", JOB).expect("job");
    let output = jobrun(
        dir.path(),
        &["run", "--job", "job.toml", "--value", "skip_check=no"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ci/build/check: action failed: `false` exited with status 1"));
    assert!(stderr.contains("job ci failed with 1 error"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("compiling"));
    assert!(stdout.contains("job-teardown"));
}

#[test]
fn value_flag_skips_the_failing_step() {
    let (dir, _job) = write_temp_file("job.toml", JOB).expect("job");
    let output = jobrun(
        dir.path(),
        &["run", "--job", "job.toml", "--value", "skip_check=yes"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skipped (skip_if: value skip_check is true)"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("job ci passed"));
}

#[test]
fn values_file_and_quiet_config_are_honored() {
    let (dir, _job) = write_temp_file("job.toml", JOB).expect("job");
    std::fs::write(dir.path().join("values.yaml"), "skip_check: true\n").expect("values");
    std::fs::write(dir.path().join(".jobrun.toml"), "reporter = \"quiet\"\n").expect("config");
    let output = jobrun(
        dir.path(),
        &["run", "--job", "job.toml", "--values-from", "values.yaml"],
    );

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(output.stdout.is_empty());
}

#[test]
fn github_reporter_groups_scopes() {
    let (dir, _job) = write_temp_file("job.toml", JOB).expect("job");
    let output = Command::new(env!("CARGO_BIN_EXE_jobrun"))
        .current_dir(dir.path())
        .env("GITHUB_ACTIONS", "true")
        .args(["run", "--job", "job.toml"])
        .output()
        .expect("spawn jobrun");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("::group::Step ci/build/compile"));
    assert!(stdout.contains("::error title=ci/build/check::"));
}

#[test]
fn invalid_job_exits_with_invalid_code() {
    let (dir, _job) = write_temp_file("job.toml", "name = \"ci\"\nstages = 3\n").expect("job");
    let output = jobrun(dir.path(), &["run", "--job", "job.toml"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));

    let missing = jobrun(dir.path(), &["validate", "--job", "nope.toml"]);
    assert_eq!(missing.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn validate_and_show_describe_the_tree() {
    let (dir, _job) = write_temp_file("job.toml", JOB).expect("job");

    let validate = jobrun(dir.path(), &["validate", "--job", "job.toml"]);
    assert_eq!(validate.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&validate.stdout).contains("ok (4 scopes)"));

    let show = jobrun(dir.path(), &["show", "--job", "job.toml"]);
    assert_eq!(show.status.code(), Some(exit_codes::OK));
    assert_eq!(
        String::from_utf8_lossy(&show.stdout),
        "Job ci [teardown: 1]\n  Stage build\n    Step compile: echo compiling\n    Step check: false [skip_if: value skip_check is true]\n"
    );
}
