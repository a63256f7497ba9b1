//! Test-only helpers: a scripted step runner and a throwaway project tree.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::{Invocation, StepOutput};
use crate::io::process::SpawnError;
use crate::io::step_runner::{StepRequest, StepRunner};

/// One canned response from [`ScriptedStepRunner`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedStep {
    /// Exit code to report; `None` means killed by a signal.
    pub code: Option<i32>,
    pub timed_out: bool,
    /// Files to create (empty) before reporting, simulating tool output.
    pub writes: Vec<PathBuf>,
    /// When set, the step fails to start with this message.
    pub spawn_error: Option<String>,
    /// When set, the step started but the runner failed afterwards.
    pub runner_error: Option<String>,
    pub stderr: String,
}

impl ScriptedStep {
    /// Successful step that writes `writes`.
    pub fn ok(writes: Vec<PathBuf>) -> Self {
        Self {
            code: Some(0),
            writes,
            ..Self::default()
        }
    }

    /// Step that exits with `code` and prints `stderr`.
    pub fn exit(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.to_string(),
            ..Self::default()
        }
    }

    pub fn timed_out() -> Self {
        Self {
            code: None,
            timed_out: true,
            ..Self::default()
        }
    }

    pub fn spawn_error(message: &str) -> Self {
        Self {
            spawn_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn runner_error(message: &str) -> Self {
        Self {
            runner_error: Some(message.to_string()),
            ..Self::default()
        }
    }
}

/// Step runner that replays [`ScriptedStep`]s in order and records every call.
pub struct ScriptedStepRunner {
    steps: RefCell<VecDeque<ScriptedStep>>,
    calls: RefCell<Vec<Invocation>>,
}

impl ScriptedStepRunner {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: RefCell::new(steps.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Invocations received so far, in call order.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Scripted steps that were never consumed.
    pub fn remaining(&self) -> usize {
        self.steps.borrow().len()
    }
}

impl StepRunner for ScriptedStepRunner {
    fn run(&self, invocation: &Invocation, _request: &StepRequest) -> Result<StepOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        let step = self
            .steps
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted step left for {}", invocation.step))?;

        if let Some(message) = step.spawn_error {
            return Err(SpawnError {
                program: invocation.program.clone(),
                source: io::Error::new(io::ErrorKind::NotFound, message),
            }
            .into());
        }
        if let Some(message) = step.runner_error {
            return Err(anyhow!(message));
        }
        for path in &step.writes {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::write(path, "").with_context(|| format!("write {}", path.display()))?;
        }
        Ok(StepOutput {
            code: step.code,
            success: step.code == Some(0) && !step.timed_out,
            timed_out: step.timed_out,
            elapsed: Duration::from_millis(5),
            stderr: step.stderr.into_bytes(),
            ..StepOutput::default()
        })
    }
}

/// A temporary `frontend/` + `backend/` layout mirroring a real project.
pub struct TestProject {
    _temp: TempDir,
    /// Canonical `frontend/` directory (the project root).
    pub root: PathBuf,
    /// Canonical `backend/public`, the default output directory.
    pub out_dir: PathBuf,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let base = fs::canonicalize(temp.path()).context("canonicalize tempdir")?;
        let root = base.join("frontend");
        write_file(&root.join("Cargo.toml"), "[package]\nname = \"app\"\n")?;
        write_file(&root.join("src").join("lib.rs"), "")?;
        write_file(&root.join("main.js"), "import init from './backend/public/app.js';\n")?;
        fs::create_dir_all(root.join("builder")).context("create builder dir")?;
        fs::create_dir_all(base.join("backend")).context("create backend dir")?;
        Ok(Self {
            _temp: temp,
            out_dir: base.join("backend").join("public"),
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// What a successful `wasm-pack` run leaves behind.
    pub fn module_artifacts(&self) -> Vec<PathBuf> {
        vec![self.out_dir.join("app.js"), self.out_dir.join("app_bg.wasm")]
    }

    pub fn bundle_file(&self) -> PathBuf {
        self.out_dir.join("bundle.js")
    }

    /// Scripted pair of successful steps producing the usual artifacts.
    pub fn successful_steps(&self) -> Vec<ScriptedStep> {
        vec![
            ScriptedStep::ok(self.module_artifacts()),
            ScriptedStep::ok(vec![self.bundle_file()]),
        ]
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
