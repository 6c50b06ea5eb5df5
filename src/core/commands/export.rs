use super::{Command, CommandError, CommandOutput, Session};

#[derive(Clone, Copy, Default)]
pub struct ExportCommand;

impl ExportCommand {
    fn parse_export(arg: &str) -> Result<Option<(&str, &str)>, CommandError> {
        let Some((name, value)) = arg.split_once('=') else {
            // `export NAME` without a value marks nothing here.
            return Ok(None);
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::InvalidArguments(
                "Variable name cannot be empty".into(),
            ));
        }

        let quoted = value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')));
        let value = if quoted {
            &value[1..value.len() - 1]
        } else {
            value
        };

        Ok(Some((name, value)))
    }
}

impl Command for ExportCommand {
    fn execute(&self, args: &[String], session: &dyn Session) -> Result<CommandOutput, CommandError> {
        let env = session.environment();

        if args.is_empty() {
            let listing: String = env
                .get_all()
                .into_iter()
                .map(|(name, value)| format!("{name}={value}\n"))
                .collect();
            return Ok(CommandOutput::text(listing));
        }

        for arg in args {
            if let Some((name, value)) = Self::parse_export(arg)? {
                env.set(name, value)
                    .map_err(|e| CommandError::InvalidArguments(e.to_string()))?;
            }
        }

        Ok(CommandOutput::empty())
    }

    fn usage(&self) -> &'static str {
        "export [NAME=VALUE...]  set or list variables"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::commands::testing::FakeSession;

    fn run(session: &FakeSession, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        ExportCommand.execute(&args, session)
    }

    #[test]
    fn test_export_simple() -> Result<(), CommandError> {
        let session = FakeSession::new("/");
        run(&session, &["TEST_VAR=value", "OTHER=x=y"])?;
        assert_eq!(session.environment.get("TEST_VAR").as_deref(), Some("value"));
        assert_eq!(session.environment.get("OTHER").as_deref(), Some("x=y"));
        Ok(())
    }

    #[test]
    fn test_export_quoted() -> Result<(), CommandError> {
        let session = FakeSession::new("/");
        run(&session, &["TEST_VAR=\"quoted value\""])?;
        assert_eq!(
            session.environment.get("TEST_VAR").as_deref(),
            Some("quoted value")
        );
        Ok(())
    }

    #[test]
    fn test_export_lists_sorted() -> Result<(), CommandError> {
        let session = FakeSession::new("/");
        run(&session, &["B=2", "A=1"])?;
        assert_eq!(run(&session, &[])?.text, "A=1\nB=2\n");
        Ok(())
    }

    #[test]
    fn test_export_empty_name() {
        let session = FakeSession::new("/");
        assert!(matches!(
            run(&session, &["=value"]),
            Err(CommandError::InvalidArguments(_))
        ));
    }

    #[test]
    fn test_export_without_value_is_noop() -> Result<(), CommandError> {
        let session = FakeSession::new("/");
        run(&session, &["JUST_A_NAME"])?;
        assert!(session.environment.is_empty());
        Ok(())
    }
}
