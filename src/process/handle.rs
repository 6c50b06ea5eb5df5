use std::io;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus};

use super::signal::{send_signal, Signal};
use super::ProcessError;

/// Owns a spawned child and whatever pipes have not been handed out yet.
///
/// A handle that is dropped before the child was reaped kills and reaps it,
/// so no child outlives its handle and no zombie is left behind. Signals are
/// refused once the child is reaped, since its OS pid may have been reused.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    exit_status: Option<ExitStatus>,
}

impl ProcessHandle {
    pub fn new(mut child: Child) -> Self {
        Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            exit_status: None,
        }
    }

    pub fn os_pid(&self) -> u32 {
        self.child.id()
    }

    /// True until the child has been reaped.
    pub fn is_valid(&self) -> bool {
        self.exit_status.is_none()
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    pub fn signal(&self, signal: Signal) -> Result<(), ProcessError> {
        if !self.is_valid() {
            return Err(ProcessError::Signal {
                signal: signal.name(),
                source: io::Error::from_raw_os_error(libc::ESRCH),
            });
        }
        send_signal(self.os_pid(), signal)
    }

    /// Non-blocking reap.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        if let Some(status) = self.exit_status {
            return Ok(Some(status));
        }
        let status = self.child.try_wait()?;
        self.exit_status = status;
        Ok(status)
    }

    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = self.child.wait()?;
        self.exit_status = Some(status);
        Ok(status)
    }

    /// Drops any pipes still held by the handle.
    pub fn close(&mut self) {
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.close();
        if self.exit_status.is_none() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
