//! Shared value types for build steps.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// The two external steps of a build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Crate → `.wasm` module + JS bindings.
    Compile,
    /// Entry module + bindings → single IIFE script.
    Bundle,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Compile => "compile",
            StepKind::Bundle => "bundle",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single external command, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub step: StepKind,
    pub program: String,
    pub args: Vec<OsString>,
    /// Working directory the command runs in (always the project root).
    pub cwd: PathBuf,
}

impl Invocation {
    /// Arguments rendered lossily, for logs and `builder plan`.
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// One-line shell-like rendering: `program arg1 arg2 ...`.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in self.args_lossy() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// What a finished child process reported.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub timed_out: bool,
    pub elapsed: Duration,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

/// Completed step, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: StepKind,
    pub elapsed: Duration,
}

/// Result of a whole build invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Outputs were newer than every watched source; nothing ran.
    Skipped { bundle_file: PathBuf },
    Built {
        steps: Vec<StepReport>,
        /// Entries in the output directory after the bundle step, sorted.
        artifacts: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_program_and_args() {
        let invocation = Invocation {
            step: StepKind::Bundle,
            program: "rollup".to_string(),
            args: vec!["main.js".into(), "--format".into(), "iife".into()],
            cwd: PathBuf::from("/project"),
        };
        assert_eq!(invocation.command_line(), "rollup main.js --format iife");
    }

    #[test]
    fn step_kind_displays_lowercase() {
        assert_eq!(StepKind::Compile.to_string(), "compile");
        assert_eq!(StepKind::Bundle.to_string(), "bundle");
    }
}
