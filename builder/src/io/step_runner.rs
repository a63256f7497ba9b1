//! Step runner abstraction for external build tools.
//!
//! The [`StepRunner`] trait decouples pipeline orchestration from actually
//! spawning `wasm-pack`/`rollup`. Tests use scripted runners that record
//! invocations and fake artifacts without spawning processes.

use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::types::{Invocation, StepOutput};
use crate::io::process::{Forward, run_command};

/// Limits applied to a single step.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest {
    /// Maximum time to wait for the tool to complete.
    pub timeout: Duration,
    /// Keep at most this many bytes of stdout/stderr in memory.
    pub output_limit_bytes: usize,
}

/// Abstraction over how build steps are executed.
pub trait StepRunner {
    /// Run `invocation`. `Err` means the tool could not be run at all; a tool
    /// that ran and failed is reported through [`StepOutput::success`].
    fn run(&self, invocation: &Invocation, request: &StepRequest) -> Result<StepOutput>;
}

/// Runner that spawns the real tool as a child process.
pub struct ProcessStepRunner {
    pub forward: Forward,
}

impl Default for ProcessStepRunner {
    fn default() -> Self {
        Self {
            forward: Forward::Terminal,
        }
    }
}

impl StepRunner for ProcessStepRunner {
    #[instrument(skip_all, fields(step = %invocation.step, program = %invocation.program))]
    fn run(&self, invocation: &Invocation, request: &StepRequest) -> Result<StepOutput> {
        info!(cwd = %invocation.cwd.display(), command = %invocation.command_line(), "starting step");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).current_dir(&invocation.cwd);

        let started = Instant::now();
        let output = run_command(
            cmd,
            request.timeout,
            request.output_limit_bytes,
            self.forward,
        )
        .with_context(|| format!("run {}", invocation.program))?;
        let elapsed = started.elapsed();

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "step timed out");
        } else if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "step failed");
        } else {
            debug!(elapsed_ms = elapsed.as_millis() as u64, "step completed");
        }

        Ok(StepOutput {
            code: output.status.code(),
            success: output.status.success() && !output.timed_out,
            timed_out: output.timed_out,
            elapsed,
            stdout: output.stdout,
            stderr: output.stderr,
            stdout_truncated: output.stdout_truncated,
            stderr_truncated: output.stderr_truncated,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::types::StepKind;

    fn invocation(cwd: &std::path::Path, script: &str) -> Invocation {
        Invocation {
            step: StepKind::Compile,
            program: "sh".to_string(),
            args: vec!["-c".into(), script.into()],
            cwd: cwd.to_path_buf(),
        }
    }

    fn request() -> StepRequest {
        StepRequest {
            timeout: Duration::from_secs(10),
            output_limit_bytes: 1000,
        }
    }

    #[test]
    fn runs_in_invocation_cwd() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ProcessStepRunner {
            forward: Forward::Quiet,
        };
        let output = runner
            .run(&invocation(temp.path(), "touch marker"), &request())
            .expect("run");
        assert!(output.success);
        assert!(temp.path().join("marker").is_file());
    }

    #[test]
    fn non_zero_exit_is_not_success() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ProcessStepRunner {
            forward: Forward::Quiet,
        };
        let output = runner
            .run(&invocation(temp.path(), "exit 2"), &request())
            .expect("run");
        assert!(!output.success);
        assert_eq!(output.code, Some(2));
    }
}
