//! Helpers for running child processes with timeouts and bounded output.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How long reader threads may keep draining after the process group was killed.
const READER_GRACE: Duration = Duration::from_secs(2);

/// The program could not be started at all (missing binary, permissions, ...).
#[derive(Debug, Error)]
#[error("spawn {program}")]
pub struct SpawnError {
    pub program: String,
    #[source]
    pub source: io::Error,
}

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

/// Marker appended to logs when `truncated` bytes of `stream` were dropped.
pub(crate) fn truncated_notice(label: &str, stream: &str, truncated: usize) -> String {
    if truncated > 0 {
        format!("\n[{label} {stream} truncated {truncated} bytes]\n")
    } else {
        String::new()
    }
}

type Sink = Option<Box<dyn Write + Send>>;

/// Where the child's output goes while it runs, besides the in-memory capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// Copy each line to this process's stdout/stderr as it arrives.
    Terminal,
    /// Capture only.
    Quiet,
}

/// Run a command with a timeout and capture stdout/stderr without risking pipe deadlocks.
///
/// Stdin is closed. On Unix the child leads its own process group, so a timeout
/// kills everything it started (e.g. `cargo` under `wasm-pack`), not just the
/// direct child. Output is read concurrently while the child runs, line by line,
/// and forwarded unmodified when `forward` is [`Forward::Terminal`].
/// `output_limit_bytes` bounds the amount of stdout/stderr kept in memory (bytes
/// beyond this are discarded while still draining and forwarding the pipe).
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
    forward: Forward,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    own_process_group(&mut cmd);

    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(SpawnError { program, source: e }.into());
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let (stdout_sink, stderr_sink): (Sink, Sink) = match forward {
        Forward::Terminal => (
            Some(Box::new(std::io::stdout())),
            Some(Box::new(std::io::stderr())),
        ),
        Forward::Quiet => (None, None),
    };

    let stdout_handle =
        thread::spawn(move || read_stream_limited(stdout, output_limit_bytes, stdout_sink));
    let stderr_handle =
        thread::spawn(move || read_stream_limited(stderr, output_limit_bytes, stderr_sink));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_process_group(&mut child).context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    // Anything that escaped the process group may still hold the pipes open.
    let grace = if timed_out { Some(READER_GRACE) } else { None };
    let (stdout, stdout_truncated) =
        join_output(stdout_handle, grace).context("join stdout")?;
    let (stderr, stderr_truncated) =
        join_output(stderr_handle, grace).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// SIGKILL the child's whole process group, falling back to the child alone.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return child.kill();
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => {
            warn!(err = %errno, "killpg failed, killing direct child only");
            child.kill()
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> io::Result<()> {
    child.kill()
}

type ReaderHandle = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

/// Join a reader thread, giving up after `grace` when one is set.
fn join_output(handle: ReaderHandle, grace: Option<Duration>) -> Result<(Vec<u8>, usize)> {
    if let Some(grace) = grace {
        let deadline = Instant::now() + grace;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "output pipe still open after kill, abandoning reader"
                );
                return Ok((Vec::new(), 0));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

/// Read a stream line by line with a size limit, optionally tee-ing to `sink`.
fn read_stream_limited<R: Read>(
    reader: R,
    limit: usize,
    mut sink: Sink,
) -> Result<(Vec<u8>, usize)> {
    let mut buf_reader = BufReader::new(reader);
    let mut collected = Vec::new();
    let mut truncated = 0usize;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }

        if let Some(writer) = sink.as_mut() {
            if let Err(e) = writer.write_all(&line) {
                warn!(err = %e, "failed to forward child output");
            } else if let Err(e) = writer.flush() {
                warn!(err = %e, "failed to flush forwarded output");
            }
        }

        let remaining = limit.saturating_sub(collected.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            collected.extend_from_slice(&line[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((collected, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_stream_keeps_everything_under_limit() {
        let (buf, truncated) =
            read_stream_limited(Cursor::new(b"one\ntwo\n".to_vec()), 100, None).expect("read");
        assert_eq!(buf, b"one\ntwo\n");
        assert_eq!(truncated, 0);
    }

    #[test]
    fn read_stream_counts_truncated_bytes() {
        let (buf, truncated) =
            read_stream_limited(Cursor::new(b"abcdef\nghij\n".to_vec()), 4, None).expect("read");
        assert_eq!(buf, b"abcd");
        assert_eq!(truncated, 8);
    }

    #[test]
    fn truncated_notice_is_empty_when_nothing_dropped() {
        assert_eq!(truncated_notice("compile", "stdout", 0), "");
        assert_eq!(
            truncated_notice("compile", "stderr", 3),
            "\n[compile stderr truncated 3 bytes]\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn run_command_captures_exit_code_and_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err >&2; exit 7");
        let output =
            run_command(cmd, Duration::from_secs(10), 1000, Forward::Quiet).expect("run");
        assert_eq!(output.status.code(), Some(7));
        assert_eq!(output.stdout, b"out\n");
        assert_eq!(output.stderr, b"err\n");
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn run_command_kills_on_timeout() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exec sleep 5");
        let output =
            run_command(cmd, Duration::from_millis(200), 1000, Forward::Quiet).expect("run");
        assert!(output.timed_out);
        assert!(!output.status.success());
    }

    #[cfg(unix)]
    #[test]
    fn run_command_timeout_kills_grandchildren_too() {
        // No `exec`: `sleep` is a grandchild holding the output pipes.
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30; true");
        let started = Instant::now();
        let output =
            run_command(cmd, Duration::from_millis(300), 1000, Forward::Quiet).expect("run");
        assert!(output.timed_out);
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "step took {:?} despite a 300ms timeout",
            started.elapsed()
        );
    }

    #[test]
    fn join_output_gives_up_after_grace() {
        let handle: ReaderHandle = thread::spawn(|| {
            thread::sleep(Duration::from_secs(5));
            Ok((b"late".to_vec(), 0))
        });
        let started = Instant::now();
        let (buf, truncated) =
            join_output(handle, Some(Duration::from_millis(50))).expect("join");
        assert!(buf.is_empty());
        assert_eq!(truncated, 0);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn run_command_reports_spawn_failure() {
        let cmd = Command::new("definitely-not-a-real-build-tool");
        let err = run_command(cmd, Duration::from_secs(1), 100, Forward::Quiet).unwrap_err();
        assert!(err.is::<SpawnError>());
        assert!(format!("{err:#}").contains("spawn definitely-not-a-real-build-tool"));
    }
}
