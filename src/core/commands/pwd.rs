use super::{Command, CommandError, CommandOutput, Session};

#[derive(Clone, Copy, Default)]
pub struct PwdCommand;

impl Command for PwdCommand {
    fn execute(&self, _args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError> {
        Ok(CommandOutput::text(format!(
            "{}\n",
            session.current_directory().display()
        )))
    }

    fn usage(&self) -> &'static str {
        "pwd  print the working directory"
    }
}
