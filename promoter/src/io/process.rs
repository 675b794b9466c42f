//! Run child processes with a timeout and bounded captured output.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How long reader threads may keep draining after a timeout kill.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Run `cmd` to completion or until `timeout` elapses, whichever is first.
///
/// stdin is closed. stdout/stderr are drained on reader threads so a chatty
/// child cannot block on a full pipe; at most `output_limit_bytes` of each is
/// kept. A child still running at the deadline is killed together with
/// everything it spawned (git's remote helpers, ssh, hook shells) and reported
/// with `timed_out = true`. Output a surviving descendant still holds open is
/// dropped after a short grace period, so the deadline stays bounded.
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> io::Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr was not piped"))?;

    let stdout_rx = spawn_reader(stdout, output_limit_bytes);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "child timed out, killing");
            timed_out = true;
            kill_process_group(&mut child)?;
            child.wait()?
        }
    };

    let grace = timed_out.then_some(READER_GRACE);
    let stdout = collect_reader(&stdout_rx, grace)?;
    let stderr = collect_reader(&stderr_rx, grace)?;

    debug!(exit_code = ?status.code(), timed_out, "child finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Kill the child's process group, then the child itself.
///
/// The child leads its own group, so its descendants go down with it.
fn kill_process_group(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let pgid = i32::try_from(child.id()).map_err(io::Error::other)?;
        if let Err(errno) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            debug!(%errno, "killpg failed, killing direct child only");
        }
    }
    match child.kill() {
        // Exited after the group kill.
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}

type ReaderResult = io::Result<Vec<u8>>;

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<ReaderResult> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // The receiver is gone only if the caller already gave up on this stream.
        let _ = tx.send(read_limited(reader, limit));
    });
    rx
}

/// Wait for a reader's output; with `grace`, give up once it elapses.
fn collect_reader(rx: &Receiver<ReaderResult>, grace: Option<Duration>) -> ReaderResult {
    let Some(grace) = grace else {
        return rx
            .recv()
            .map_err(|_| io::Error::other("output reader thread panicked"))?;
    };
    match rx.recv_timeout(grace) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            warn!("output pipe still held open after kill, dropping output");
            Ok(Vec::new())
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(io::Error::other("output reader thread panicked"))
        }
    }
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }

    if dropped > 0 {
        warn!(dropped, "child output truncated");
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn captures_output_of_fast_command() {
        let mut cmd = Command::new("git");
        cmd.arg("--version");
        let out = run_with_timeout(cmd, Duration::from_secs(10), 1024).expect("run");
        assert!(out.success());
        assert!(out.stdout_lossy().starts_with("git version"));
    }

    #[test]
    fn truncates_output_beyond_limit() {
        let out = read_limited(&b"0123456789"[..], 4).expect("read");
        assert_eq!(out, b"0123");
    }

    #[cfg(unix)]
    #[test]
    fn kills_command_at_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let out = run_with_timeout(cmd, Duration::from_millis(100), 1024).expect("run");
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn timeout_is_not_held_up_by_grandchildren() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 4; echo done"]);
        let started = Instant::now();
        let out = run_with_timeout(cmd, Duration::from_millis(200), 1024).expect("run");
        let elapsed = started.elapsed();
        assert!(out.timed_out);
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
        assert!(!out.stdout_lossy().contains("done"));
    }

    #[test]
    fn reader_gives_up_after_grace() {
        let (_tx, rx) = mpsc::channel::<ReaderResult>();
        let out = collect_reader(&rx, Some(Duration::from_millis(20))).expect("collect");
        assert!(out.is_empty());
    }
}
