//! Blocking process execution with captured output and an optional deadline.

use crate::LOG_TARGET;
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::tool::ExternalToolInvocation;

use std::io::{self, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

const SPAWN_RETRIES: u32 = 10;

/// How long to wait for the pipes to close once the child is gone and no
/// deadline applies, or after killing a timed-out child.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

const KILL_TIMEOUT: Duration = Duration::from_secs(30);

const CHUNK_SIZE: usize = 64 * 1024;

/// Captured result of one finished process.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub command: String,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Turn a non-zero exit into `Error::ToolInvocation`, logging the captured
    /// output first.
    pub fn check(self) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        diagnostics::report_failure(&self.command, self.code, &self.stdout, &self.stderr);
        Err(Error::ToolInvocation {
            command: self.command,
            code: self.code,
            stdout: diagnostics::lossy(&self.stdout),
            stderr: diagnostics::lossy(&self.stderr),
        })
    }
}

/// Run `invocation` to completion, or until `timeout` elapses.
///
/// stdout and stderr are drained on their own threads so a tool that writes
/// more than a pipe buffer cannot stall. The deadline covers both the child
/// and its pipes: a process that inherited them and outlives the child does
/// not extend the call. On timeout the child (and its container, if any) is
/// killed and `Error::ToolTimeout` carries whatever was captured so far.
pub fn run(invocation: &ExternalToolInvocation, timeout: Option<Duration>) -> Result<ToolOutput> {
    let command = invocation.display();
    log::debug!(target: LOG_TARGET, "running {}", command);

    let mut child = spawn(invocation).map_err(|source| Error::ToolSpawn {
        command: command.clone(),
        source,
    })?;

    let mut stdout = Capture::new(child.stdout.take());
    let mut stderr = Capture::new(child.stderr.take());

    let started = Instant::now();
    let deadline = timeout.map(|limit| started + limit);
    let status: Option<ExitStatus> = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::io(format!("wait for `{}`", command), e));
            }
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        stdout.poll();
        stderr.poll();
        thread::sleep(POLL_INTERVAL);
    };

    let drained = match (status, deadline) {
        (None, _) => false,
        // The pipes may lag the exit slightly; never cut them off earlier than that.
        (Some(_), Some(d)) => {
            let until = d.max(Instant::now() + POLL_INTERVAL);
            stdout.finish(until) & stderr.finish(until)
        }
        (Some(_), None) => {
            let until = Instant::now() + DRAIN_GRACE;
            let closed = stdout.finish(until) & stderr.finish(until);
            if !closed {
                log::warn!(
                    target: LOG_TARGET,
                    "`{}` exited but something still holds its output open; using what was captured",
                    command
                );
            }
            true
        }
    };

    let (Some(status), true) = (status, drained) else {
        // `timeout` is always set on this branch.
        let limit = timeout.unwrap_or_default();
        log::warn!(target: LOG_TARGET, "`{}` timed out after {:?}", command, limit);
        stop_container(invocation);
        let grace = Instant::now() + DRAIN_GRACE;
        stdout.finish(grace);
        stderr.finish(grace);
        diagnostics::report_failure(&command, None, &stdout.buf, &stderr.buf);
        return Err(Error::ToolTimeout {
            command,
            timeout: limit,
            stdout: diagnostics::lossy(&stdout.buf),
            stderr: diagnostics::lossy(&stderr.buf),
        });
    };

    log::debug!(
        target: LOG_TARGET,
        "`{}` exited with {:?} after {:?} ({} bytes on stdout)",
        command,
        status.code(),
        started.elapsed(),
        stdout.buf.len()
    );

    Ok(ToolOutput {
        command,
        code: status.code(),
        stdout: stdout.buf,
        stderr: stderr.buf,
    })
}

/// Killing the `run` client does not stop the container it started.
fn stop_container(invocation: &ExternalToolInvocation) {
    let Some(kill) = invocation.kill_command() else {
        return;
    };
    match run(&kill, Some(KILL_TIMEOUT)) {
        Ok(out) if out.success() => {
            log::debug!(target: LOG_TARGET, "stopped container with `{}`", out.command);
        }
        Ok(out) => log::warn!(
            target: LOG_TARGET,
            "`{}` exited with {:?}: {}",
            out.command,
            out.code,
            diagnostics::lossy(&out.stderr).trim()
        ),
        Err(e) => log::warn!(target: LOG_TARGET, "cannot stop container: {}", e),
    }
}

fn spawn(invocation: &ExternalToolInvocation) -> io::Result<Child> {
    let mut attempts = 0;
    loop {
        let spawned = invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        match spawned {
            // The binary may still be open for writing elsewhere (freshly built or copied).
            Err(e) if e.kind() == io::ErrorKind::ExecutableFileBusy && attempts < SPAWN_RETRIES => {
                attempts += 1;
                thread::sleep(POLL_INTERVAL);
            }
            other => return other,
        }
    }
}

/// Output of one pipe, read in chunks on a background thread.
struct Capture {
    chunks: Receiver<Vec<u8>>,
    buf: Vec<u8>,
}

impl Capture {
    fn new<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let Some(mut pipe) = pipe else {
                return;
            };
            let mut chunk = [0u8; CHUNK_SIZE];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(chunk[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    // A read error just truncates the capture.
                    Err(_) => break,
                }
            }
        });
        Self {
            chunks: rx,
            buf: Vec::new(),
        }
    }

    /// Take whatever has arrived without blocking.
    fn poll(&mut self) {
        while let Ok(chunk) = self.chunks.try_recv() {
            self.buf.extend_from_slice(&chunk);
        }
    }

    /// Collect until the pipe closes or `until` passes. Returns whether it closed.
    fn finish(&mut self, until: Instant) -> bool {
        loop {
            let left = until.saturating_duration_since(Instant::now());
            match self.chunks.recv_timeout(left) {
                Ok(chunk) => self.buf.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }
}
