//! Child processes: spawning, monitoring, signalling and captured output.

mod handle;
mod io;
mod managed;
pub mod signal;
mod spawn;
mod types;

pub use handle::ProcessHandle;
pub use io::{ProcessIO, INITIAL_BUFFER_SIZE};
pub use managed::{CompletionCallback, ManagedProcess, OutputCallback};
pub use spawn::{SpawnProvider, SpawnRequest, UnixSpawner};
pub use types::{ExecutionOptions, Pid, ProcessInfo, ProcessState, MAX_PRIORITY, MIN_PRIORITY};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("no such process: {0}")]
    NotFound(Pid),
    #[error("failed to spawn {command}: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("process {0} already started")]
    AlreadyStarted(Pid),
    #[error("process {0} is not running")]
    NotRunning(Pid),
    #[error("{signal} failed: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("stdin of process {0} is not available")]
    StdinUnavailable(Pid),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported on this platform: {0}")]
    Unsupported(&'static str),
}
