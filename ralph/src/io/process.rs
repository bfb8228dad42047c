//! Helpers for running the external tool as a cancellable child process.
//!
//! stdout and stderr are drained concurrently into one buffer, so the captured
//! text interleaves both streams in arrival order. On Unix the child leads its
//! own process group and cancellation kills the whole group.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::budget::CancelToken;

/// Upper bound on one `wait_timeout` slice, so explicit cancellation is noticed promptly.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default cap on captured output kept in memory.
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// stdout and stderr, merged.
    pub output: Vec<u8>,
    /// Bytes drained but not stored because of the output limit.
    pub truncated: usize,
    /// The child was killed because the token fired.
    pub cancelled: bool,
}

impl CommandOutput {
    pub fn text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.output).into_owned();
        if self.truncated > 0 {
            text.push_str(&format!("\n[output truncated {} bytes]\n", self.truncated));
        }
        text
    }
}

#[derive(Debug, Default)]
struct MergedBuffer {
    bytes: Vec<u8>,
    truncated: usize,
}

/// Spawn `cmd` with piped output and no stdin.
///
/// The only error is the spawn failure itself, so callers can tell a missing
/// binary apart from a failure while supervising the child.
pub fn spawn_piped(cmd: &mut Command) -> std::io::Result<Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    debug!("spawning child process");
    cmd.spawn()
}

/// Wait for `child` while draining its output, killing it if `cancel` fires.
///
/// The child is always reaped before this returns, including on cancellation.
#[instrument(skip_all, fields(pid = child.id(), limit = output_limit_bytes))]
pub fn wait_cancellable(
    mut child: Child,
    cancel: &CancelToken,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let buffer = Arc::new(Mutex::new(MergedBuffer::default()));
    let stdout_handle = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || drain_into(stdout, &buffer, output_limit_bytes))
    };
    let stderr_handle = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || drain_into(stderr, &buffer, output_limit_bytes))
    };

    let mut cancelled = false;
    let status = loop {
        if cancel.is_cancelled() {
            warn!("cancellation requested, killing child process");
            cancelled = true;
            break terminate(&mut child)?;
        }
        let slice = cancel
            .remaining()
            .map_or(POLL_INTERVAL, |remaining| remaining.min(POLL_INTERVAL));
        if let Some(status) = child.wait_timeout(slice).context("wait for command")? {
            break status;
        }
    };
    if !cancelled {
        // Background descendants would otherwise hold the pipes open past the deadline.
        kill_stragglers(&child);
    }

    join_reader(stdout_handle).context("join stdout")?;
    join_reader(stderr_handle).context("join stderr")?;

    let MergedBuffer { bytes, truncated } = std::mem::take(
        &mut *buffer
            .lock()
            .map_err(|_| anyhow!("output buffer lock poisoned"))?,
    );
    if truncated > 0 {
        warn!(truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), cancelled, "command finished");
    Ok(CommandOutput {
        status,
        output: bytes,
        truncated,
        cancelled,
    })
}

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<ExitStatus> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let pgid = i32::try_from(child.id()).context("child pid out of range")?;
    if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        warn!(err = %err, "failed to kill process group, killing child only");
        child.kill().context("kill command")?;
    }
    child.wait().context("wait command after kill")
}

/// Kill whatever is left in the exited child's process group.
#[cfg(unix)]
fn kill_stragglers(child: &Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!("killed leftover processes in group"),
        Err(Errno::ESRCH) => {}
        Err(err) => warn!(err = %err, "failed to kill leftover processes"),
    }
}

#[cfg(not(unix))]
fn kill_stragglers(_child: &Child) {}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> Result<ExitStatus> {
    child.kill().context("kill command")?;
    child.wait().context("wait command after kill")
}

fn join_reader(handle: thread::JoinHandle<Result<()>>) -> Result<()> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn drain_into<R: Read>(mut reader: R, buffer: &Mutex<MergedBuffer>, limit: usize) -> Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(());
        }
        let mut merged = buffer
            .lock()
            .map_err(|_| anyhow!("output buffer lock poisoned"))?;
        let remaining = limit.saturating_sub(merged.bytes.len());
        let keep = n.min(remaining);
        merged.bytes.extend_from_slice(&chunk[..keep]);
        merged.truncated += n - keep;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_stderr_together() {
        let child = spawn_piped(&mut sh("echo out; echo err >&2")).expect("spawn");
        let output = wait_cancellable(child, &CancelToken::new(), 1000).expect("wait");

        assert!(output.status.success());
        assert!(!output.cancelled);
        let text = output.text();
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[test]
    fn reports_nonzero_exit_without_error() {
        let child = spawn_piped(&mut sh("echo partial; exit 3")).expect("spawn");
        let output = wait_cancellable(child, &CancelToken::new(), 1000).expect("wait");

        assert_eq!(output.status.code(), Some(3));
        assert!(output.text().contains("partial"));
    }

    #[test]
    fn truncates_beyond_limit() {
        let child = spawn_piped(&mut sh("printf 'abcdefghij'")).expect("spawn");
        let output = wait_cancellable(child, &CancelToken::new(), 4).expect("wait");

        assert_eq!(output.output, b"abcd");
        assert_eq!(output.truncated, 6);
        assert!(output.text().contains("[output truncated 6 bytes]"));
    }

    #[test]
    fn spawn_fails_for_missing_binary() {
        let err = spawn_piped(&mut Command::new("/nonexistent/ralph-test-binary")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn deadline_kills_child_group() {
        let start = Instant::now();
        // The backgrounded sleep would keep the pipes open if only the shell were killed.
        let child = spawn_piped(&mut sh("sleep 30 & echo started; wait")).expect("spawn");
        let token = CancelToken::with_deadline(Instant::now() + Duration::from_millis(300));
        let output = wait_cancellable(child, &token, 1000).expect("wait");

        assert!(output.cancelled);
        assert!(!output.status.success());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn background_descendant_does_not_outlive_exit() {
        let start = Instant::now();
        let child = spawn_piped(&mut sh("sleep 30 & echo done")).expect("spawn");
        let token = CancelToken::with_deadline(Instant::now() + Duration::from_millis(500));
        let output = wait_cancellable(child, &token, 1000).expect("wait");

        assert!(output.status.success());
        assert!(!output.cancelled);
        assert!(output.text().contains("done"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn explicit_cancel_from_another_thread_kills_child() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            canceller.cancel();
        });

        let start = Instant::now();
        let child = spawn_piped(&mut sh("exec sleep 30")).expect("spawn");
        let output = wait_cancellable(child, &token, 1000).expect("wait");
        handle.join().expect("join canceller");

        assert!(output.cancelled);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
