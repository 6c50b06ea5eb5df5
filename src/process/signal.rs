use crate::process::ProcessError;

use libc::{SIGCONT, SIGKILL, SIGSTOP, SIGTERM};

/// Job-control and termination signals the shell sends to its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
    Stop,
    Continue,
}

impl Signal {
    pub fn termination(force: bool) -> Self {
        if force {
            Signal::Kill
        } else {
            Signal::Terminate
        }
    }

    pub fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Terminate => SIGTERM,
            Signal::Kill => SIGKILL,
            Signal::Stop => SIGSTOP,
            Signal::Continue => SIGCONT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Signal::Terminate => "SIGTERM",
            Signal::Kill => "SIGKILL",
            Signal::Stop => "SIGSTOP",
            Signal::Continue => "SIGCONT",
        }
    }
}

pub fn send_signal(os_pid: u32, signal: Signal) -> Result<(), ProcessError> {
    let pid = libc::pid_t::try_from(os_pid).map_err(|_| ProcessError::Signal {
        signal: signal.name(),
        source: std::io::Error::from_raw_os_error(libc::ESRCH),
    })?;

    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(pid, signal.as_raw()) } == 0 {
        Ok(())
    } else {
        Err(ProcessError::Signal {
            signal: signal.name(),
            source: std::io::Error::last_os_error(),
        })
    }
}

/// Name of the signal that ended a child, for logs.
pub fn describe(raw: libc::c_int) -> &'static str {
    match raw {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGABRT => "SIGABRT",
        SIGKILL => "SIGKILL",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGPIPE => "SIGPIPE",
        SIGTERM => "SIGTERM",
        _ => "signal",
    }
}
