//! Deterministic, pure logic shared by the builder.
//!
//! Core modules must be free of I/O side effects. They turn configuration and
//! already-resolved paths into plans and decisions suitable for tests.

pub mod freshness;
pub mod plan;
pub mod types;
