use super::{Command, CommandError, CommandOutput, Session};

#[derive(Clone, Copy, Default)]
pub struct EchoCommand;

impl Command for EchoCommand {
    fn execute(&self, args: &[String], _session: &dyn Session) -> Result<CommandOutput, CommandError> {
        let (newline, words) = match args.first().map(String::as_str) {
            Some("-n") => (false, &args[1..]),
            _ => (true, args),
        };

        let mut text = words.join(" ");
        if newline {
            text.push('\n');
        }
        Ok(CommandOutput::text(text))
    }

    fn usage(&self) -> &'static str {
        "echo [-n] [words...]  print arguments"
    }
}
