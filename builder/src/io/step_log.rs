//! Per-step output logs (`<log_dir>/<step>.log`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::types::{StepKind, StepOutput};
use crate::io::process::truncated_notice;

/// Path of the log file for `step` inside `log_dir`.
pub fn step_log_path(log_dir: &Path, step: StepKind) -> PathBuf {
    log_dir.join(format!("{step}.log"))
}

/// Write captured output for one step, truncated to `output_limit` bytes.
pub fn write_step_log(
    path: &Path,
    step: StepKind,
    output: &StepOutput,
    output_limit: usize,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create step log dir {}", parent.display()))?;
    }
    let label = step.as_str();
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&truncated_notice(label, "stdout", output.stdout_truncated));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&truncated_notice(label, "stderr", output.stderr_truncated));
    if output.timed_out {
        buf.push_str(&format!("\n[{label} timed out]\n"));
    }

    if buf.len() > output_limit {
        let cut = floor_char_boundary(&buf, output_limit);
        let truncated = format!("{}\n[truncated {} bytes]\n", &buf[..cut], buf.len() - cut);
        fs::write(path, truncated)
            .with_context(|| format!("write step log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write step log {}", path.display()))
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut cut = index.min(s.len());
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, stderr: &str) -> StepOutput {
        StepOutput {
            code: Some(0),
            success: true,
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            ..StepOutput::default()
        }
    }

    #[test]
    fn log_has_both_sections() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = step_log_path(&temp.path().join("logs"), StepKind::Compile);
        write_step_log(&path, StepKind::Compile, &output("built", "warning"), 1000)
            .expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents, "=== stdout ===\nbuilt\n=== stderr ===\nwarning");
        assert!(path.ends_with("logs/compile.log"));
    }

    #[test]
    fn long_log_is_truncated_on_char_boundary() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bundle.log");
        let noisy = "é".repeat(100);
        write_step_log(&path, StepKind::Bundle, &output(&noisy, ""), 20).expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.contains("[truncated"));
        assert!(contents.starts_with("=== stdout ===\n"));
    }

    #[test]
    fn timeout_is_marked() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("compile.log");
        let mut out = output("", "");
        out.timed_out = true;
        write_step_log(&path, StepKind::Compile, &out, 1000).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.contains("[compile timed out]"));
    }
}
