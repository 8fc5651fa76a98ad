//! The job engine.
//!
//! Core modules are free of filesystem and process I/O. Side effects happen
//! only inside [`action::Action`] implementations supplied by the caller (see
//! [`crate::io::shell`] for the shell-backed one).

pub mod action;
pub mod builder;
pub mod condition;
pub mod context;
pub mod errors;
pub mod invariants;
pub mod runner;
pub mod scope;
pub mod status;
pub mod values;
