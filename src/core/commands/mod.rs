use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod cd;
mod echo;
mod exit;
mod export;
mod help;
mod jobs;
mod kill;
mod pwd;

pub use cd::CdCommand;
pub use echo::EchoCommand;
pub use exit::ExitCommand;
pub use export::ExportCommand;
pub use help::HelpCommand;
pub use jobs::JobsCommand;
pub use kill::KillCommand;
pub use pwd::PwdCommand;

use crate::core::env::Environment;
use crate::process::{Pid, ProcessInfo};

/// Commands the shell runs itself instead of spawning.
pub const BUILTIN_NAMES: &[&str] = &["cd", "echo", "exit", "export", "help", "jobs", "kill", "pwd"];

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("execution error: {0}")]
    Execution(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a built-in needs from the shell it runs in.
pub trait Session {
    fn environment(&self) -> &Environment;
    fn current_directory(&self) -> PathBuf;
    /// Validates and switches the session directory, returning the new one.
    fn change_directory(&self, path: &Path) -> Result<PathBuf, CommandError>;
    fn jobs(&self) -> Vec<ProcessInfo>;
    fn terminate_process(&self, pid: Pid, force: bool) -> bool;
    fn request_exit(&self, code: i32);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            exit_code: 0,
        }
    }
}

pub trait Command {
    fn execute(&self, args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError>;

    /// One-line summary for `help`.
    fn usage(&self) -> &'static str;
}

#[derive(Clone)]
enum CommandType {
    Cd(CdCommand),
    Echo(EchoCommand),
    Exit(ExitCommand),
    Export(ExportCommand),
    Help(HelpCommand),
    Jobs(JobsCommand),
    Kill(KillCommand),
    Pwd(PwdCommand),
}

impl Command for CommandType {
    fn execute(&self, args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError> {
        match self {
            CommandType::Cd(cmd) => cmd.execute(args, session),
            CommandType::Echo(cmd) => cmd.execute(args, session),
            CommandType::Exit(cmd) => cmd.execute(args, session),
            CommandType::Export(cmd) => cmd.execute(args, session),
            CommandType::Help(cmd) => cmd.execute(args, session),
            CommandType::Jobs(cmd) => cmd.execute(args, session),
            CommandType::Kill(cmd) => cmd.execute(args, session),
            CommandType::Pwd(cmd) => cmd.execute(args, session),
        }
    }

    fn usage(&self) -> &'static str {
        match self {
            CommandType::Cd(cmd) => cmd.usage(),
            CommandType::Echo(cmd) => cmd.usage(),
            CommandType::Exit(cmd) => cmd.usage(),
            CommandType::Export(cmd) => cmd.usage(),
            CommandType::Help(cmd) => cmd.usage(),
            CommandType::Jobs(cmd) => cmd.usage(),
            CommandType::Kill(cmd) => cmd.usage(),
            CommandType::Pwd(cmd) => cmd.usage(),
        }
    }
}

/// Name-to-built-in table.
#[derive(Clone)]
pub struct CommandExecutor {
    commands: BTreeMap<&'static str, CommandType>,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor {
    pub fn new() -> Self {
        let mut commands = BTreeMap::new();
        commands.insert("cd", CommandType::Cd(CdCommand::new()));
        commands.insert("echo", CommandType::Echo(EchoCommand));
        commands.insert("exit", CommandType::Exit(ExitCommand));
        commands.insert("export", CommandType::Export(ExportCommand));
        commands.insert("jobs", CommandType::Jobs(JobsCommand));
        commands.insert("kill", CommandType::Kill(KillCommand));
        commands.insert("pwd", CommandType::Pwd(PwdCommand));

        let mut entries: Vec<(&'static str, &'static str)> = commands
            .iter()
            .map(|(name, cmd)| (*name, cmd.usage()))
            .collect();
        entries.push(("help", HelpCommand::USAGE));
        entries.sort_unstable();
        commands.insert("help", CommandType::Help(HelpCommand::new(entries)));

        Self { commands }
    }

    pub fn execute(
        &self,
        command: &str,
        args: &[String],
        session: &dyn Session,
    ) -> Result<CommandOutput, CommandError> {
        match self.commands.get(command) {
            Some(cmd) => cmd.execute(args, session),
            None => Err(CommandError::NotFound(command.to_owned())),
        }
    }

    pub fn is_builtin(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.keys().copied()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeSession;
    use super::*;

    #[test]
    fn test_builtin_command_detection() {
        let executor = CommandExecutor::new();
        for name in BUILTIN_NAMES {
            assert!(executor.is_builtin(name), "{name} not registered");
        }
        assert!(!executor.is_builtin("ls"));
        assert!(!executor.is_builtin(""));
        assert_eq!(executor.names().count(), BUILTIN_NAMES.len());
    }

    #[test]
    fn test_execute_unknown_command() {
        let executor = CommandExecutor::new();
        let session = FakeSession::new("/");
        let result = executor.execute("unknown_command", &[], &session);
        assert!(matches!(result, Err(CommandError::NotFound(_))));
    }

    #[test]
    fn test_dispatch_reaches_command() {
        let executor = CommandExecutor::new();
        let session = FakeSession::new("/tmp");
        let output = executor.execute("pwd", &[], &session).unwrap();
        assert_eq!(output.text, "/tmp\n");
    }

    #[test]
    fn test_command_error_display() {
        let errors = vec![
            CommandError::NotFound("test".to_string()),
            CommandError::InvalidArguments("bad args".to_string()),
            CommandError::Execution("failed".to_string()),
            CommandError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "io error")),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }
}
