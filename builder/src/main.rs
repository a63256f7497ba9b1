//! `builder`: produce the deployable frontend bundle.
//!
//! Resolves the project root from this crate's own location, then runs the
//! WebAssembly compile step and the JS bundle step, stopping at the first
//! failure with a step-specific exit code.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use builder::core::types::BuildOutcome;
use builder::error::{BuildError, exit_code_for};
use builder::io::config::{BuildConfig, CONFIG_FILE_NAME, init_config, load_config};
use builder::io::root::{explicit_project_root, orchestrator_dir, resolve_project_root};
use builder::io::step_runner::ProcessStepRunner;
use builder::logging;
use builder::pipeline::{BuildOptions, plan_for, run_build};
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "builder",
    version,
    about = "Build the WebAssembly frontend and its JS bundle"
)]
struct Cli {
    /// Project root (defaults to the parent of the builder crate).
    #[arg(long, global = true, value_name = "DIR")]
    project_root: Option<PathBuf>,

    /// Config file (defaults to `build.toml` in the project root).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Compile to WebAssembly, then bundle (the default).
    Build {
        /// Build even if outputs are newer than the sources.
        #[arg(short, long)]
        force: bool,
        /// Skip the build when outputs are newer than the sources.
        #[arg(long)]
        incremental: bool,
    },
    /// Write a `build.toml` with the default settings.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the commands a build would run, without running them.
    Plan {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Build {
            force: false,
            incremental: false,
        }
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("error: {:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Resolve a relative --config against the caller's directory before chdir.
    let config_override = cli
        .config
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .context("resolve --config path")?;

    let root = match cli.project_root.as_deref() {
        Some(dir) => explicit_project_root(dir)?,
        None => resolve_project_root(orchestrator_dir())?,
    };
    enter_root(&root)?;

    let config_path = config_override.unwrap_or_else(|| root.join(CONFIG_FILE_NAME));
    match cli.command.unwrap_or_default() {
        Command::Init { force } => cmd_init(&config_path, force),
        Command::Build { force, incremental } => {
            let config = load_project_config(&root, &config_path)?;
            cmd_build(&root, &config, force, incremental)
        }
        Command::Plan { json } => {
            let config = load_project_config(&root, &config_path)?;
            cmd_plan(&root, &config, json)
        }
    }
}

fn load_project_config(root: &Path, config_path: &Path) -> Result<BuildConfig> {
    let config = load_config(config_path)?;
    debug!(root = %root.display(), config = %config_path.display(), "configuration loaded");
    Ok(config)
}

fn enter_root(root: &Path) -> Result<()> {
    std::env::set_current_dir(root).map_err(|err| BuildError::PathResolution {
        orchestrator_dir: root.to_path_buf(),
        reason: format!("cannot enter {}: {err}", root.display()),
    })?;
    Ok(())
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    init_config(config_path, force)?;
    println!("init: wrote {}", config_path.display());
    Ok(())
}

fn cmd_build(
    root: &Path,
    config: &BuildConfig,
    force: bool,
    incremental: bool,
) -> Result<()> {
    let outcome = run_build(
        root,
        config,
        &ProcessStepRunner::default(),
        &BuildOptions { force, incremental },
    )?;
    match outcome {
        BuildOutcome::Skipped { bundle_file } => {
            println!("build: up to date ({})", bundle_file.display());
        }
        BuildOutcome::Built { steps, artifacts } => {
            for step in steps {
                println!(
                    "build: {} ok in {:.2}s",
                    step.step,
                    step.elapsed.as_secs_f64()
                );
            }
            for artifact in artifacts {
                println!("artifact: {}", artifact.display());
            }
        }
    }
    Ok(())
}

fn cmd_plan(root: &Path, config: &BuildConfig, json: bool) -> Result<()> {
    let plan = plan_for(root, config)?;
    if json {
        let payload =
            serde_json::to_string_pretty(&plan.summary()).context("serialize plan json")?;
        println!("{payload}");
        return Ok(());
    }
    println!("root: {}", plan.root.display());
    println!("out_dir: {}", plan.out_dir.display());
    for invocation in plan.steps() {
        println!("{}: {}", invocation.step, invocation.command_line());
    }
    Ok(())
}
