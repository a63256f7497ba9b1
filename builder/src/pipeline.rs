//! Orchestration for a single `builder build`.
//!
//! Resolve the plan, optionally skip when outputs are fresh, then run the
//! compile step and the bundle step in order, stopping at the first failure.

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::freshness::{Freshness, assess, oldest_output};
use crate::core::plan::{BuildPlan, build_plan, resolve_out_dir};
use crate::core::types::{BuildOutcome, Invocation, StepKind, StepOutput, StepReport};
use crate::error::{BuildError, StepFailure};
use crate::io::config::BuildConfig;
use crate::io::process::SpawnError;
use crate::io::scan::{file_mtime, list_artifacts, newest_source_mtime, newest_wasm_mtime};
use crate::io::step_log::{step_log_path, write_step_log};
use crate::io::step_runner::{StepRequest, StepRunner};

/// Artifacts must be at least this recent relative to their step's start.
/// Covers filesystems with coarse timestamps.
const MTIME_SLACK: Duration = Duration::from_secs(2);

/// Per-invocation switches from the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Build even when outputs look fresh.
    pub force: bool,
    /// Check freshness before building (also enabled by `incremental` in config).
    pub incremental: bool,
}

/// Resolve the output directory and build the invocation plan for `root`.
pub fn plan_for(root: &Path, config: &BuildConfig) -> Result<BuildPlan> {
    let out_dir = resolve_out_dir(root, &config.out_dir);
    build_plan(root, &out_dir, config)
}

/// Run the whole build for the project at `root`.
///
/// `root` must already be resolved. The bundle step only runs after the compile
/// step succeeded and wrote a `.wasm` module into the output directory. Outputs
/// left over from an earlier build do not count.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_build<R: StepRunner>(
    root: &Path,
    config: &BuildConfig,
    runner: &R,
    options: &BuildOptions,
) -> Result<BuildOutcome> {
    let plan = plan_for(root, config)?;

    if (options.incremental || config.incremental) && !options.force {
        let freshness = check_freshness(root, config, &plan)?;
        if freshness.is_fresh() {
            info!(bundle = %plan.bundle_file.display(), "outputs are up to date, skipping build");
            return Ok(BuildOutcome::Skipped {
                bundle_file: plan.bundle_file,
            });
        }
        info!(?freshness, "outputs are stale, building");
    }

    fs::create_dir_all(&plan.out_dir)
        .with_context(|| format!("create output directory {}", plan.out_dir.display()))?;

    let request = StepRequest {
        timeout: Duration::from_secs(config.step_timeout_secs),
        output_limit_bytes: config.output_limit_bytes,
    };

    let mut steps = Vec::with_capacity(2);
    for invocation in plan.steps() {
        let started = SystemTime::now();
        let output = run_step(root, config, runner, invocation, &request)?;
        verify_step_outputs(&plan, invocation.step, started)?;
        steps.push(StepReport {
            step: invocation.step,
            elapsed: output.elapsed,
        });
    }

    let artifacts = list_artifacts(&plan.out_dir)?;
    info!(artifacts = artifacts.len(), "build finished");
    Ok(BuildOutcome::Built { steps, artifacts })
}

fn check_freshness(root: &Path, config: &BuildConfig, plan: &BuildPlan) -> Result<Freshness> {
    let newest_source = newest_source_mtime(root, &config.watch)?;
    let bundle = file_mtime(&plan.bundle_file)?;
    let module = newest_wasm_mtime(&plan.out_dir)?;
    Ok(assess(newest_source, oldest_output(&[bundle, module])))
}

fn run_step<R: StepRunner>(
    root: &Path,
    config: &BuildConfig,
    runner: &R,
    invocation: &Invocation,
    request: &StepRequest,
) -> Result<StepOutput> {
    let output = runner.run(invocation, request).map_err(|err| {
        let program = invocation.program.clone();
        let message = format!("{err:#}");
        let failure = if err.chain().any(|cause| cause.is::<SpawnError>()) {
            StepFailure::Spawn { program, message }
        } else {
            StepFailure::Supervision { program, message }
        };
        step_error(invocation.step, failure)
    })?;

    // A log that cannot be written must not mask the step's own result.
    if let Some(log_dir) = &config.log_dir {
        let path = step_log_path(&root.join(log_dir), invocation.step);
        if let Err(err) = write_step_log(&path, invocation.step, &output, config.output_limit_bytes)
        {
            warn!(step = %invocation.step, path = %path.display(), "failed to write step log: {err:#}");
        }
    }

    if output.success {
        return Ok(output);
    }
    let program = invocation.program.clone();
    let failure = if output.timed_out {
        StepFailure::TimedOut {
            program,
            after: request.timeout,
        }
    } else {
        match output.code {
            Some(code) => StepFailure::Exit { program, code },
            None => StepFailure::Signal { program },
        }
    };
    Err(step_error(invocation.step, failure).into())
}

fn verify_step_outputs(plan: &BuildPlan, step: StepKind, started: SystemTime) -> Result<()> {
    let fresh_since = started.checked_sub(MTIME_SLACK).unwrap_or(started);
    let written_by_step = |mtime: Option<SystemTime>| mtime.is_some_and(|at| at >= fresh_since);
    match step {
        StepKind::Compile => {
            if !written_by_step(newest_wasm_mtime(&plan.out_dir)?) {
                return Err(step_error(
                    step,
                    StepFailure::MissingModule {
                        dir: plan.out_dir.clone(),
                    },
                )
                .into());
            }
        }
        StepKind::Bundle => {
            if !plan.bundle_file.is_file() || !written_by_step(file_mtime(&plan.bundle_file)?) {
                return Err(step_error(
                    step,
                    StepFailure::MissingArtifact {
                        path: plan.bundle_file.clone(),
                    },
                )
                .into());
            }
        }
    }
    Ok(())
}

fn step_error(step: StepKind, failure: StepFailure) -> BuildError {
    match step {
        StepKind::Compile => BuildError::Compile(failure),
        StepKind::Bundle => BuildError::Bundle(failure),
    }
}
