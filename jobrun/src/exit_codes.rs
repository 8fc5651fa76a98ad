//! Stable exit codes for `jobrun` commands.

/// The job passed, or the command succeeded.
pub const OK: i32 = 0;
/// The job ran and recorded at least one error.
pub const FAILED: i32 = 1;
/// The job, config or values could not be loaded, or the command was misused.
pub const INVALID: i32 = 2;
