use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use super::handle::ProcessHandle;
use super::types::ExecutionOptions;
use super::ProcessError;
use crate::parser::ParsedCommand;

/// Everything a provider needs to create one child.
///
/// The shell resolves the working directory and environment before calling
/// the provider, so providers never consult process-global state.
#[derive(Debug, Clone, Copy)]
pub struct SpawnRequest<'a> {
    pub command: &'a ParsedCommand,
    pub options: &'a ExecutionOptions,
    pub working_dir: &'a Path,
    pub environment: &'a BTreeMap<String, String>,
}

/// Platform process creation.
pub trait SpawnProvider: Send + Sync {
    fn spawn(&self, request: &SpawnRequest<'_>) -> Result<ProcessHandle, ProcessError>;
}

/// `fork`/`exec` through `std::process`, with `libc` for scheduling priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixSpawner;

impl UnixSpawner {
    pub fn new() -> Self {
        Self
    }

    fn resolve(working_dir: &Path, target: &str) -> PathBuf {
        let target = Path::new(target);
        if target.is_absolute() {
            target.to_path_buf()
        } else {
            working_dir.join(target)
        }
    }

    fn stdin_for(request: &SpawnRequest<'_>) -> Result<Stdio, ProcessError> {
        match &request.command.input_redirect {
            Some(target) => {
                let path = Self::resolve(request.working_dir, target);
                let file = File::open(&path).map_err(|source| ProcessError::SpawnFailed {
                    command: format!("< {}", path.display()),
                    source,
                })?;
                Ok(Stdio::from(file))
            }
            None if request.options.capture_output => Ok(Stdio::piped()),
            None => Ok(Stdio::inherit()),
        }
    }

    fn stdout_for(request: &SpawnRequest<'_>) -> Result<Stdio, ProcessError> {
        match &request.command.output_redirect {
            Some(target) => {
                let path = Self::resolve(request.working_dir, target);
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .append(request.command.append_output)
                    .truncate(!request.command.append_output)
                    .open(&path)
                    .map_err(|source| ProcessError::SpawnFailed {
                        command: format!("> {}", path.display()),
                        source,
                    })?;
                Ok(Stdio::from(file))
            }
            None if request.options.capture_output => Ok(Stdio::piped()),
            None => Ok(Stdio::inherit()),
        }
    }

    fn apply_priority(os_pid: u32, priority: i32) {
        // SAFETY: setpriority(2) takes plain integers.
        let rc = unsafe {
            libc::setpriority(libc::PRIO_PROCESS, os_pid as libc::id_t, priority)
        };
        if rc != 0 {
            warn!(
                os_pid,
                priority,
                error = %std::io::Error::last_os_error(),
                "could not set priority"
            );
        }
    }
}

impl SpawnProvider for UnixSpawner {
    fn spawn(&self, request: &SpawnRequest<'_>) -> Result<ProcessHandle, ProcessError> {
        let parsed = request.command;
        let stderr = if request.options.capture_output {
            Stdio::piped()
        } else {
            Stdio::inherit()
        };

        let mut command = Command::new(&parsed.executable);
        command
            .args(&parsed.arguments)
            .current_dir(request.working_dir)
            .env_clear()
            .envs(request.environment)
            .stdin(Self::stdin_for(request)?)
            .stdout(Self::stdout_for(request)?)
            .stderr(stderr);

        let child = command.spawn().map_err(|source| ProcessError::SpawnFailed {
            command: parsed.executable.clone(),
            source,
        })?;
        let handle = ProcessHandle::new(child);

        debug!(
            os_pid = handle.os_pid(),
            executable = %parsed.executable,
            dir = %request.working_dir.display(),
            "spawned"
        );

        if request.options.priority != 0 {
            Self::apply_priority(handle.os_pid(), request.options.priority);
        }

        Ok(handle)
    }
}
