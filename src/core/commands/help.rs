use super::{Command, CommandError, CommandOutput, Session};

#[derive(Clone, Default)]
pub struct HelpCommand {
    entries: Vec<(&'static str, &'static str)>,
}

impl HelpCommand {
    pub const USAGE: &'static str = "help  list built-in commands";

    pub fn new(entries: Vec<(&'static str, &'static str)>) -> Self {
        Self { entries }
    }
}

impl Command for HelpCommand {
    fn execute(&self, _args: &[String], _session: &dyn Session) -> Result<CommandOutput, CommandError> {
        let mut text = String::from("Built-in commands:\n");
        for (_, usage) in &self.entries {
            text.push_str("  ");
            text.push_str(usage);
            text.push('\n');
        }
        Ok(CommandOutput::text(text))
    }

    fn usage(&self) -> &'static str {
        Self::USAGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::testing::FakeSession;
    use crate::core::commands::{CommandExecutor, BUILTIN_NAMES};

    #[test]
    fn test_help_mentions_every_builtin() {
        let output = CommandExecutor::new()
            .execute("help", &[], &FakeSession::new("/"))
            .unwrap();

        for name in BUILTIN_NAMES {
            assert!(
                output.text.lines().any(|l| l.trim_start().starts_with(name)),
                "{name} missing from help"
            );
        }
    }
}
