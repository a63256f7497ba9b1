//! Builder configuration stored at `<project root>/build.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "build.toml";

/// Builder configuration (TOML).
///
/// Every field is optional in the file. Defaults give the stock frontend build:
/// `wasm-pack build --target web --out-dir ../backend/public` followed by
/// `rollup main.js --format iife --file ../backend/public/bundle.js`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildConfig {
    /// Shared output directory, relative to the project root.
    pub out_dir: PathBuf,

    /// Wall-clock budget for each external step, in seconds.
    pub step_timeout_secs: u64,

    /// Keep at most this many bytes of each step's stdout/stderr for logs.
    pub output_limit_bytes: usize,

    /// Skip the build when `bundle.js` is newer than every watched source.
    pub incremental: bool,

    /// Paths (relative to the project root) that feed the build.
    pub watch: Vec<PathBuf>,

    /// Where to write `<step>.log` files, relative to the project root.
    pub log_dir: Option<PathBuf>,

    pub compile: CompileConfig,
    pub bundle: BundleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompileConfig {
    /// Program plus any leading arguments (e.g. `["wasm-pack"]`).
    pub command: Vec<String>,
    /// Value for `--target`.
    pub target: String,
    /// Appended after the fixed arguments.
    pub extra_args: Vec<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            command: vec!["wasm-pack".to_string()],
            target: "web".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BundleConfig {
    /// Program plus any leading arguments (e.g. `["npx", "rollup"]`).
    pub command: Vec<String>,
    /// Entry module, relative to the project root.
    pub entry: PathBuf,
    /// Value for `--format`.
    pub format: String,
    /// Bundle file name inside `out_dir`.
    pub file_name: String,
    /// Appended after the fixed arguments.
    pub extra_args: Vec<String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            command: vec!["rollup".to_string()],
            entry: PathBuf::from("main.js"),
            format: "iife".to_string(),
            file_name: "bundle.js".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("../backend/public"),
            step_timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
            incremental: false,
            watch: vec![
                PathBuf::from("src"),
                PathBuf::from("Cargo.toml"),
                PathBuf::from("main.js"),
            ],
            log_dir: None,
            compile: CompileConfig::default(),
            bundle: BundleConfig::default(),
        }
    }
}

impl BuildConfig {
    pub fn validate(&self) -> Result<()> {
        if self.step_timeout_secs == 0 {
            return Err(anyhow!("step_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(anyhow!("out_dir must not be empty"));
        }
        validate_command("compile.command", &self.compile.command)?;
        validate_command("bundle.command", &self.bundle.command)?;
        if self.compile.target.trim().is_empty() {
            return Err(anyhow!("compile.target must not be empty"));
        }
        if self.bundle.format.trim().is_empty() {
            return Err(anyhow!("bundle.format must not be empty"));
        }
        if self.bundle.entry.as_os_str().is_empty() {
            return Err(anyhow!("bundle.entry must not be empty"));
        }
        let file_name = Path::new(&self.bundle.file_name);
        if self.bundle.file_name.trim().is_empty()
            || file_name.file_name() != Some(file_name.as_os_str())
        {
            return Err(anyhow!(
                "bundle.file_name must be a bare file name, got {:?}",
                self.bundle.file_name
            ));
        }
        Ok(())
    }
}

fn validate_command(label: &str, command: &[String]) -> Result<()> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(anyhow!("{label} must be a non-empty array")),
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BuildConfig::default()`.
pub fn load_config(path: &Path) -> Result<BuildConfig> {
    if !path.exists() {
        let cfg = BuildConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BuildConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Write config as pretty TOML.
pub fn write_config(path: &Path, cfg: &BuildConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

/// Write the default config to `path` for `builder init`.
///
/// Fails if `path` already exists unless `force` is set.
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!(
            "builder init: {} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    write_config(path, &BuildConfig::default())
}
