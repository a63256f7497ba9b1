//! Stable exit codes for builder CLI commands.

/// Build succeeded, was skipped as fresh, or the plan was printed.
pub const OK: i32 = 0;
/// Invalid configuration or any error outside the build steps.
pub const INVALID: i32 = 1;
/// The project root could not be resolved or is not usable.
pub const ROOT_UNRESOLVED: i32 = 2;
/// The WebAssembly compile step failed; the bundle step did not run.
pub const COMPILE_FAILED: i32 = 3;
/// The bundle step failed.
pub const BUNDLE_FAILED: i32 = 4;
