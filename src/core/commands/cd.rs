use super::{Command, CommandError, CommandOutput, Session};
use crate::path::PathExpander;
use std::path::PathBuf;

#[derive(Clone, Default)]
pub struct CdCommand;

impl CdCommand {
    pub fn new() -> Self {
        Self
    }

    fn target(&self, args: &[String], session: &dyn Session) -> Result<PathBuf, CommandError> {
        let env = session.environment();
        let home = env.get("HOME").filter(|h| !h.is_empty());

        match args.first().map(String::as_str) {
            None => Ok(PathBuf::from(home.unwrap_or_else(|| "/".to_owned()))),
            Some("-") => env
                .get("OLDPWD")
                .map(PathBuf::from)
                .ok_or_else(|| CommandError::Execution("OLDPWD not set".into())),
            Some(path) => PathExpander::with_home(home.map(PathBuf::from))
                .expand(path)
                .map_err(|e| CommandError::Execution(e.to_string())),
        }
    }
}

impl Command for CdCommand {
    fn execute(&self, args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError> {
        if args.len() > 1 {
            return Err(CommandError::InvalidArguments("Usage: cd [dir]".into()));
        }

        let target = self.target(args, session)?;
        let previous = session.current_directory();
        let current = session.change_directory(&target)?;

        let env = session.environment();
        let _ = env.set("OLDPWD", &previous.to_string_lossy());
        let _ = env.set("PWD", &current.to_string_lossy());

        if args.first().is_some_and(|a| a == "-") {
            Ok(CommandOutput::text(format!("{}\n", current.display())))
        } else {
            Ok(CommandOutput::empty())
        }
    }

    fn usage(&self) -> &'static str {
        "cd [dir|-|~]  change the working directory"
    }
}
