use super::Shell;
use crate::process::{Pid, ProcessInfo};

/// Terminates a shell process on drop unless [`release`](Self::release)d.
///
/// Termination is graceful and only attempted while the process is still
/// active.
pub struct ProcessGuard<'a> {
    shell: &'a Shell,
    pid: Pid,
    armed: bool,
}

impl<'a> ProcessGuard<'a> {
    pub fn new(shell: &'a Shell, pid: Pid) -> Self {
        Self {
            shell,
            pid,
            armed: pid > 0,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn info(&self) -> ProcessInfo {
        self.shell.get_process_info(self.pid)
    }

    /// Stops managing the process and returns its pid.
    pub fn release(mut self) -> Pid {
        self.armed = false;
        self.pid
    }
}

impl Drop for ProcessGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.info().is_active() {
            self.shell.terminate_process(self.pid, false);
        }
    }
}
