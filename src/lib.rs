//! Playweave - include directive resolution for declarative task playbooks
//!
//! This crate parses `include:` directives, compiles the task files they
//! reference into flattened task lists, resolves variable and conditional
//! scope along the include ancestry, and turns compiled entities into
//! transfer records that workers can rebuild.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod playbook;
pub mod templating;

pub use error::{PlaybookError, Result};
