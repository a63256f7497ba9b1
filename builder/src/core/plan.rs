//! Turns configuration plus a resolved project root into exact invocations.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::core::types::{Invocation, StepKind};
use crate::io::config::BuildConfig;

/// The ordered pair of external commands for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub root: PathBuf,
    pub out_dir: PathBuf,
    pub bundle_file: PathBuf,
    pub compile: Invocation,
    pub bundle: Invocation,
}

impl BuildPlan {
    /// Invocations in the order they must run.
    pub fn steps(&self) -> [&Invocation; 2] {
        [&self.compile, &self.bundle]
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            root: self.root.display().to_string(),
            out_dir: self.out_dir.display().to_string(),
            steps: self
                .steps()
                .iter()
                .map(|invocation| StepSummary {
                    step: invocation.step,
                    cwd: invocation.cwd.display().to_string(),
                    program: invocation.program.clone(),
                    args: invocation.args_lossy(),
                })
                .collect(),
        }
    }
}

/// Serializable view of a plan for `builder plan --json`.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub root: String,
    pub out_dir: String,
    pub steps: Vec<StepSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub step: StepKind,
    pub cwd: String,
    pub program: String,
    pub args: Vec<String>,
}

/// Join `out_dir` onto `root` and fold away `.`/`..` without touching the filesystem.
pub fn resolve_out_dir(root: &Path, out_dir: &Path) -> PathBuf {
    normalize_lexically(&root.join(out_dir))
}

/// Build the compile and bundle invocations.
///
/// `out_dir` must already be resolved (see [`resolve_out_dir`]). The result does
/// not depend on the process working directory: every path is absolute when
/// `root` is.
pub fn build_plan(root: &Path, out_dir: &Path, config: &BuildConfig) -> Result<BuildPlan> {
    let bundle_file = out_dir.join(&config.bundle.file_name);

    let (compile_program, compile_lead) = config
        .compile
        .command
        .split_first()
        .ok_or_else(|| anyhow!("compile.command must be a non-empty array"))?;
    let mut compile_args: Vec<OsString> = compile_lead.iter().map(OsString::from).collect();
    compile_args.extend([
        OsString::from("build"),
        OsString::from("--target"),
        OsString::from(&config.compile.target),
        OsString::from("--out-dir"),
        out_dir.as_os_str().to_owned(),
    ]);
    compile_args.extend(config.compile.extra_args.iter().map(OsString::from));

    let (bundle_program, bundle_lead) = config
        .bundle
        .command
        .split_first()
        .ok_or_else(|| anyhow!("bundle.command must be a non-empty array"))?;
    let mut bundle_args: Vec<OsString> = bundle_lead.iter().map(OsString::from).collect();
    bundle_args.extend([
        root.join(&config.bundle.entry).into_os_string(),
        OsString::from("--format"),
        OsString::from(&config.bundle.format),
        OsString::from("--file"),
        bundle_file.as_os_str().to_owned(),
    ]);
    bundle_args.extend(config.bundle.extra_args.iter().map(OsString::from));

    Ok(BuildPlan {
        root: root.to_path_buf(),
        out_dir: out_dir.to_path_buf(),
        bundle_file,
        compile: Invocation {
            step: StepKind::Compile,
            program: compile_program.clone(),
            args: compile_args,
            cwd: root.to_path_buf(),
        },
        bundle: Invocation {
            step: StepKind::Bundle,
            program: bundle_program.clone(),
            args: bundle_args,
            cwd: root.to_path_buf(),
        },
    })
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
