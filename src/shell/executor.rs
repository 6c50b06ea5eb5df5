use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::commands::{CommandError, Session};
use crate::core::env::Environment;
use crate::parser::ParsedCommand;
use crate::process::{Pid, ProcessInfo, ProcessState};

impl super::Shell {
    pub(crate) fn is_builtin(&self, parsed: &ParsedCommand) -> bool {
        !parsed.requires_shell && self.builtins.is_builtin(&parsed.executable)
    }

    /// Runs a built-in in the calling thread and reports it as a finished
    /// process. Failures exit with 1 and carry the message as output.
    pub(crate) fn run_builtin(&self, pid: Pid, parsed: &ParsedCommand) -> ProcessInfo {
        let mut info = ProcessInfo::new(pid, parsed.executable.as_str(), parsed.arguments.clone())
            .with_working_dir(self.get_current_directory());

        let result = self
            .builtins
            .execute(&parsed.executable, &parsed.arguments, self)
            .and_then(|output| match &parsed.output_redirect {
                Some(target) => {
                    self.write_redirect(target, parsed.append_output, &output.text)?;
                    Ok(crate::core::commands::CommandOutput {
                        text: String::new(),
                        ..output
                    })
                }
                None => Ok(output),
            });

        match result {
            Ok(output) => {
                info.output = output.text;
                info.finish(ProcessState::Completed, output.exit_code);
            }
            Err(e) => {
                info.output = format!("{}: {e}\n", parsed.executable);
                info.finish(ProcessState::Failed, 1);
            }
        }

        debug!(pid, builtin = %parsed.executable, exit_code = info.exit_code, "built-in finished");
        info
    }

    fn write_redirect(&self, target: &str, append: bool, text: &str) -> Result<(), CommandError> {
        let path = self.get_current_directory().join(target);
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl Session for super::Shell {
    fn environment(&self) -> &Environment {
        self.get_environment()
    }

    fn current_directory(&self) -> PathBuf {
        self.get_current_directory()
    }

    fn change_directory(&self, path: &Path) -> Result<PathBuf, CommandError> {
        let resolved = self.resolve_directory(path)?;
        *self.current_directory.write() = resolved.clone();
        Ok(resolved)
    }

    fn jobs(&self) -> Vec<ProcessInfo> {
        self.get_all_processes()
    }

    fn terminate_process(&self, pid: Pid, force: bool) -> bool {
        super::Shell::terminate_process(self, pid, force)
    }

    fn request_exit(&self, code: i32) {
        *self.exit_requested.lock() = Some(code);
    }
}
