use super::ConfigError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub rc_path: PathBuf,
    pub history_path: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
        Ok(Self::from_home(&home))
    }

    pub fn from_home(home: &Path) -> Self {
        ConfigPaths {
            rc_path: home.join(".cross_terminalrc"),
            history_path: home.join(".cross_terminal_history"),
        }
    }

    /// Uses `rc_path` instead of the default rc file.
    pub fn with_rc(mut self, rc_path: impl Into<PathBuf>) -> Self {
        self.rc_path = rc_path.into();
        self
    }
}
