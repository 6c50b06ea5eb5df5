use std::path::PathBuf;
use std::time::Duration;

mod loader;
mod paths;

pub use loader::ConfigLoader;
pub use paths::ConfigPaths;

use crate::core::env::Environment;

pub const SHELL_OVERRIDE_VAR: &str = "CROSS_TERMINAL_SHELL";
pub const HISTORY_SIZE_OVERRIDE_VAR: &str = "CROSS_TERMINAL_HISTORY_SIZE";

/// Tunables for one shell session.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Period of the table sweep that drops finished processes.
    pub cleanup_interval: Duration,
    /// Readiness wait of each process monitor.
    pub poll_interval: Duration,
    /// Wait slice used by `execute_sync` between completion checks.
    pub sync_poll_interval: Duration,
    pub history_size: usize,
    pub shell_path: Option<PathBuf>,
    pub rc_file: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            sync_poll_interval: Duration::from_millis(10),
            history_size: 1000,
            shell_path: None,
            rc_file: None,
            history_file: None,
            log_level: "warn".to_owned(),
        }
    }
}

impl ShellConfig {
    /// Defaults, then the rc file (if it exists), then environment overrides.
    ///
    /// `export` lines from the rc file land in `environment`.
    pub fn load(paths: &ConfigPaths, environment: &Environment) -> Result<Self, ConfigError> {
        let mut config = Self {
            rc_file: Some(paths.rc_path.clone()),
            history_file: Some(paths.history_path.clone()),
            ..Self::default()
        };

        ConfigLoader::new(environment).load_file(&paths.rc_path, &mut config)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(shell) = std::env::var(SHELL_OVERRIDE_VAR) {
            if !shell.is_empty() {
                self.shell_path = Some(PathBuf::from(shell));
            }
        }

        if let Ok(size) = std::env::var(HISTORY_SIZE_OVERRIDE_VAR) {
            self.history_size = size.parse().map_err(|_| ConfigError::InvalidValue {
                key: HISTORY_SIZE_OVERRIDE_VAR.to_owned(),
                value: size,
            })?;
        }

        Ok(())
    }

    /// Applies one `set KEY=VALUE` assignment.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        };

        match key {
            "cleanup_interval_ms" => {
                let ms: u64 = value.parse().map_err(|_| invalid())?;
                self.cleanup_interval = Duration::from_millis(ms.max(1));
            }
            "poll_interval_ms" => {
                let ms: u64 = value.parse().map_err(|_| invalid())?;
                self.poll_interval = Duration::from_millis(ms.max(1));
            }
            "history_size" => self.history_size = value.parse().map_err(|_| invalid())?,
            "shell" => self.shell_path = Some(PathBuf::from(value)),
            "log_level" => self.log_level = value.to_owned(),
            _ => return Err(invalid()),
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.history_size, 1000);
        assert!(config.shell_path.is_none());
    }

    #[test]
    fn test_set_value() -> Result<(), ConfigError> {
        let mut config = ShellConfig::default();
        config.set_value("cleanup_interval_ms", "250")?;
        config.set_value("history_size", "10")?;
        config.set_value("shell", "/bin/zsh")?;

        assert_eq!(config.cleanup_interval, Duration::from_millis(250));
        assert_eq!(config.history_size, 10);
        assert_eq!(config.shell_path, Some(PathBuf::from("/bin/zsh")));
        Ok(())
    }

    #[test]
    fn test_set_value_rejects_garbage() {
        let mut config = ShellConfig::default();
        assert!(matches!(
            config.set_value("history_size", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(config.set_value("no_such_key", "1").is_err());
    }
}
