//! `jobrun` command line.
//!
//! Loads a TOML job definition, runs it against values given on the command
//! line or in values files, and exits non-zero iff the run recorded errors.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use jobrun::exit_codes;
use jobrun::io::config::DEFAULT_CONFIG_PATH;
use jobrun::logging;
use jobrun::run::run_job;
use jobrun::validate::{JobInputs, load_inputs, validate_job};

#[derive(Parser)]
#[command(
    name = "jobrun",
    version,
    about = "Run hierarchical CI jobs with conditions and guaranteed teardown"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a job and report its outcome.
    Run {
        #[command(flatten)]
        job: JobArgs,

        /// Set a value (`docker.tag=release`). Repeatable; wins over files.
        #[arg(long = "value", value_name = "KEY=VALUE")]
        values: Vec<String>,

        /// Read values from a YAML, JSON or TOML file. Repeatable.
        #[arg(long = "values-from", value_name = "FILE")]
        values_from: Vec<PathBuf>,
    },
    /// Check a job file against the schema and tree invariants.
    Validate {
        #[command(flatten)]
        job: JobArgs,
    },
    /// Print the job's scope tree with its conditions.
    Show {
        #[command(flatten)]
        job: JobArgs,
    },
}

#[derive(Args)]
struct JobArgs {
    /// Job definition file.
    #[arg(long, value_name = "FILE")]
    job: PathBuf,

    /// Runner config file.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            exit_code(exit_codes::INVALID)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run {
            job,
            values,
            values_from,
        } => cmd_run(job, values, values_from),
        Command::Validate { job } => cmd_validate(&job),
        Command::Show { job } => cmd_show(&job),
    }
}

fn cmd_run(job: JobArgs, values: Vec<String>, values_from: Vec<PathBuf>) -> Result<i32> {
    let loaded = load_inputs(&JobInputs {
        job_path: job.job,
        config_path: job.config,
        values_files: values_from,
        value_pairs: values,
    })?;
    let report = run_job(loaded, std::io::stdout())?;
    for error in &report.errors {
        eprintln!("  {error}");
    }
    eprintln!("{}", report.summary());
    Ok(report.exit_code())
}

fn cmd_validate(job: &JobArgs) -> Result<i32> {
    let tree = validate_job(&job.job, &job.config)?;
    println!("{}: ok ({} scopes)", job.job.display(), tree.walk().len());
    Ok(exit_codes::OK)
}

fn cmd_show(job: &JobArgs) -> Result<i32> {
    let tree = validate_job(&job.job, &job.config)?;
    print!("{}", tree.outline());
    Ok(exit_codes::OK)
}
