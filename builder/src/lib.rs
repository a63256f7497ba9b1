//! Frontend build orchestrator.
//!
//! Compiles the frontend crate to WebAssembly with `wasm-pack`, then bundles
//! the JS entry module with `rollup`, writing both into the output directory
//! the backend serves. The layout mirrors a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (invocation plans, freshness).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (root resolution, config, child
//!   processes, filesystem scans, step logs).
//!
//! [`pipeline`] coordinates the two to implement `builder build`.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
