mod vars;

pub use vars::Environment;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvError {
    #[error("Variable name cannot be empty")]
    EmptyName,
    #[error("Invalid variable name: {0}")]
    InvalidName(String),
}
