//! Loading and checking everything a run needs: config, job file and values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Map;

use crate::core::scope::Scope;
use crate::core::values::Values;
use crate::io::config::{RunnerConfig, load_config};
use crate::io::job_file::load_job;
use crate::io::values_file::{load_values_file, merge_values, parse_value_pairs};

/// Where to load a run's inputs from.
#[derive(Debug, Clone, Default)]
pub struct JobInputs {
    pub job_path: PathBuf,
    pub config_path: PathBuf,
    /// Structured values files, merged in order.
    pub values_files: Vec<PathBuf>,
    /// `key=value` pairs, applied after (and winning over) the files.
    pub value_pairs: Vec<String>,
}

/// A job ready to run.
#[derive(Debug)]
pub struct LoadedJob {
    pub config: RunnerConfig,
    pub job: Scope,
    pub values: Values,
}

/// Load config, values and the job tree. Any failure here is an invalid invocation.
pub fn load_inputs(inputs: &JobInputs) -> Result<LoadedJob> {
    let config = load_config(&inputs.config_path).context("load config")?;
    let values = load_values(&inputs.values_files, &inputs.value_pairs)?;
    let job = load_job(&inputs.job_path, &config)?;
    Ok(LoadedJob {
        config,
        job,
        values,
    })
}

/// Merge values files in order, then `key=value` pairs on top.
pub fn load_values(files: &[PathBuf], pairs: &[String]) -> Result<Values> {
    let mut merged = Map::new();
    for file in files {
        merge_values(&mut merged, load_values_file(file)?);
    }
    let overrides = parse_value_pairs(pairs).context("parse --value")?;
    merge_values(&mut merged, overrides);
    Ok(Values::new(merged))
}

/// Check a job file without running it.
pub fn validate_job(job_path: &Path, config_path: &Path) -> Result<Scope> {
    let config = load_config(config_path).context("load config")?;
    load_job(job_path, &config)
}
