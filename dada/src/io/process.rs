//! Child process helper for line-streamed agent output.
//!
//! Stdout is read lazily, one line at a time, by the caller. Stderr is drained
//! on a helper thread with a byte limit so the child never blocks on a full
//! pipe.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, warn};
use wait_timeout::ChildExt;

/// How a streamed child ended.
#[derive(Debug)]
pub struct ChildExit {
    pub status: ExitStatus,
    pub stderr: Vec<u8>,
    pub stderr_truncated: usize,
    /// The child outlived the grace period and was killed.
    pub killed: bool,
}

impl ChildExit {
    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }

    /// Stderr as text, trimmed, with a truncation notice if bytes were dropped.
    pub fn stderr_text(&self, label: &str) -> String {
        let mut text = String::from_utf8_lossy(&self.stderr).trim().to_string();
        text.push_str(self.stderr_truncated_notice(label).trim_end());
        text
    }
}

type StderrHandle = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

/// A running child whose stdout is consumed line by line.
///
/// Dropping it before [`StreamingChild::finish`] kills and reaps the child.
pub struct StreamingChild {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_handle: Option<StderrHandle>,
    finished: bool,
}

/// Spawn `cmd`, write `stdin` to it, and close its stdin.
pub fn spawn_streaming(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    stderr_limit_bytes: usize,
) -> Result<StreamingChild> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, stderr_limit_bytes));

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;

    let mut streaming = StreamingChild {
        child,
        stdout: BufReader::new(stdout),
        stderr_handle: Some(stderr_handle),
        finished: false,
    };

    if let Some(input) = stdin {
        let mut child_stdin = streaming
            .child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    Ok(streaming)
}

impl StreamingChild {
    /// Next stdout line without its line terminator, or `None` at EOF.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let n = self
            .stdout
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            return Ok(None);
        }
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Wait for the child to exit, killing it if it outlives `grace`.
    pub fn finish(&mut self, grace: Duration) -> Result<ChildExit> {
        if self.finished {
            return Err(anyhow!("child already reaped"));
        }
        let mut killed = false;
        let status = match self.child.wait_timeout(grace).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(grace_secs = grace.as_secs(), "child did not exit, killing");
                killed = true;
                self.child.kill().context("kill command")?;
                self.child.wait().context("wait command after kill")?
            }
        };
        self.finished = true;

        let (stderr, stderr_truncated) = match self.stderr_handle.take() {
            Some(handle) => join_output(handle).context("join stderr")?,
            None => (Vec::new(), 0),
        };
        if stderr_truncated > 0 {
            warn!(stderr_truncated, "stderr truncated");
        }

        debug!(exit_code = ?status.code(), killed, "command finished");
        Ok(ChildExit {
            status,
            stderr,
            stderr_truncated,
            killed,
        })
    }
}

impl Drop for StreamingChild {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(err) = self.child.kill() {
            debug!(err = %err, "kill on drop failed");
        }
        if let Err(err) = self.child.wait() {
            warn!(err = %err, "failed to reap child on drop");
        }
    }
}

fn join_output(handle: StderrHandle) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn streams_stdout_lines_and_captures_stderr() {
        let mut child = spawn_streaming(
            sh("read input; echo \"got $input\"; echo second; echo oops >&2; exit 3"),
            Some(b"hello\n"),
            1000,
        )
        .expect("spawn");

        assert_eq!(child.next_line().expect("line").as_deref(), Some("got hello"));
        assert_eq!(child.next_line().expect("line").as_deref(), Some("second"));
        assert_eq!(child.next_line().expect("line"), None);

        let exit = child.finish(Duration::from_secs(5)).expect("finish");
        assert_eq!(exit.status.code(), Some(3));
        assert!(!exit.killed);
        assert_eq!(exit.stderr_text("agent"), "oops");
    }

    #[test]
    fn stderr_is_bounded() {
        let mut child = spawn_streaming(sh("printf 'abcdefghij' >&2"), None, 4).expect("spawn");
        assert_eq!(child.next_line().expect("line"), None);
        let exit = child.finish(Duration::from_secs(5)).expect("finish");
        assert_eq!(exit.stderr, b"abcd");
        assert_eq!(exit.stderr_truncated, 6);
        assert!(exit.stderr_text("agent").contains("truncated 6 bytes"));
    }

    #[test]
    fn finish_kills_child_that_outlives_grace() {
        let mut child = spawn_streaming(sh("exec >&-; exec sleep 30"), None, 100).expect("spawn");
        assert_eq!(child.next_line().expect("line"), None);
        let exit = child.finish(Duration::from_millis(200)).expect("finish");
        assert!(exit.killed);
        assert!(child.finish(Duration::from_millis(10)).is_err());
    }
}
