//! I/O helpers for builder commands.

pub mod config;
pub mod process;
pub mod root;
pub mod scan;
pub mod step_log;
pub mod step_runner;
