//! Side-effecting collaborators of the engine: files, processes and the console.

pub mod config;
pub mod job_file;
pub mod process;
pub mod reporter;
pub mod shell;
pub mod values_file;
