//! Typed failures for the build pipeline.
//!
//! Only failures that decide the process exit code are typed here; everything
//! else travels as `anyhow::Error` with context.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::exit_codes;

/// Fatal build failure, one variant per pipeline stage.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot resolve project root from {}: {reason}", orchestrator_dir.display())]
    PathResolution {
        orchestrator_dir: PathBuf,
        reason: String,
    },

    #[error("compile step failed")]
    Compile(#[source] StepFailure),

    #[error("bundle step failed")]
    Bundle(#[source] StepFailure),
}

impl BuildError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildError::PathResolution { .. } => exit_codes::ROOT_UNRESOLVED,
            BuildError::Compile(_) => exit_codes::COMPILE_FAILED,
            BuildError::Bundle(_) => exit_codes::BUNDLE_FAILED,
        }
    }
}

/// Why a single external step did not succeed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepFailure {
    #[error("`{program}` could not be started: {message}")]
    Spawn { program: String, message: String },

    /// The child started but could not be waited on or read from.
    #[error("`{program}` could not be supervised: {message}")]
    Supervision { program: String, message: String },

    #[error("`{program}` exited with status {code}")]
    Exit { program: String, code: i32 },

    #[error("`{program}` was terminated by a signal")]
    Signal { program: String },

    #[error("`{program}` timed out after {}s", after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("no .wasm module was written to {}", dir.display())]
    MissingModule { dir: PathBuf },

    #[error("expected output {} was not produced", path.display())]
    MissingArtifact { path: PathBuf },
}

/// Map an error chain to the process exit code.
///
/// The first [`BuildError`] in the chain decides; anything else is
/// [`exit_codes::INVALID`].
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BuildError>())
        .map(BuildError::exit_code)
        .unwrap_or(exit_codes::INVALID)
}
