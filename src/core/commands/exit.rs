use super::{Command, CommandError, CommandOutput, Session};

/// Records an exit request; the host decides when to actually leave.
#[derive(Clone, Copy, Default)]
pub struct ExitCommand;

impl Command for ExitCommand {
    fn execute(&self, args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError> {
        // Non-numeric codes count as a generic failure.
        let code = args.first().map_or(0, |arg| arg.parse().unwrap_or(1));
        session.request_exit(code);

        Ok(CommandOutput {
            text: String::new(),
            exit_code: code,
        })
    }

    fn usage(&self) -> &'static str {
        "exit [code]  leave the shell"
    }
}
