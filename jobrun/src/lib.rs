//! Hierarchical job runner for CI pipelines.
//!
//! A job is a tree of scopes (Job → Stage → Step). Each scope can be gated by
//! `run_if`/`skip_if` conditions and carries teardown actions that run no
//! matter how its body went. Failures are recorded in the run's context
//! instead of aborting the traversal, and later scopes can read them through
//! conditions. The crate is split the usual way:
//!
//! - **[`core`]**: the engine (values, conditions, context, scope tree, runner).
//!   No filesystem or process I/O.
//! - **[`io`]**: config, job files, value files, shell actions, reporters.
//!
//! Orchestration modules ([`run`], [`validate`]) glue the two together for the
//! CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
