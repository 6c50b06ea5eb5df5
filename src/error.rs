use crate::core::commands::CommandError;
use crate::core::config::ConfigError;
use crate::core::env::EnvError;
use crate::parser::ParseError;
use crate::process::ProcessError;

/// Top-level error of the `cross-terminal` binary.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
    #[error("{0}")]
    Command(#[from] CommandError),
    #[error("Environment error: {0}")]
    Environment(#[from] EnvError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Flag error: {0}")]
    FlagError(String),
    #[error("Ctrl-C error: {0}")]
    CtrlC(#[from] ctrlc::Error),
    #[error("terminal is not initialized")]
    NotInitialized,
    #[error("Logging error: {0}")]
    Logging(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let err: ShellError = ParseError::Empty.into();
        assert!(matches!(err, ShellError::Parse(_)));

        let err: ShellError = EnvError::EmptyName.into();
        assert!(err.to_string().starts_with("Environment error"));

        let err: ShellError = CommandError::NotFound("x".into()).into();
        assert_eq!(err.to_string(), "command not found: x");
    }
}
