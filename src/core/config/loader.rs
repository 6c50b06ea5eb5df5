use std::{fs, path::Path};

use tracing::debug;

use super::{ConfigError, ShellConfig};
use crate::core::env::Environment;
use crate::parser::expand_variables;

/// Reads rc files line by line.
///
/// Understands `export NAME=VALUE` (into the session environment) and
/// `set KEY=VALUE` (into [`ShellConfig`]). Blank lines and `#` comments are
/// ignored; anything else is skipped.
pub struct ConfigLoader<'a> {
    environment: &'a Environment,
}

impl<'a> ConfigLoader<'a> {
    pub fn new(environment: &'a Environment) -> Self {
        Self { environment }
    }

    /// Missing files are not an error.
    pub fn load_file(&self, path: &Path, config: &mut ShellConfig) -> Result<(), ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no rc file");
            return Ok(());
        }

        let content = fs::read_to_string(path)?;
        for line in content.lines() {
            self.process_line(line, config)?;
        }
        Ok(())
    }

    fn process_line(&self, line: &str, config: &mut ShellConfig) -> Result<(), ConfigError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        if let Some(var_def) = line.strip_prefix("export ") {
            self.process_env_var(var_def)
        } else if let Some(setting) = line.strip_prefix("set ") {
            self.process_setting(setting, config)
        } else {
            debug!(line, "skipping unrecognised rc line");
            Ok(())
        }
    }

    fn process_env_var(&self, var_def: &str) -> Result<(), ConfigError> {
        let Some((name, value)) = var_def.split_once('=') else {
            return Ok(());
        };

        let name = name.trim();
        let value = strip_quotes(value.trim());
        let expanded = expand_variables(value, self.environment);

        self.environment
            .set(name, &expanded)
            .map_err(|_| ConfigError::InvalidValue {
                key: "export".to_owned(),
                value: var_def.to_owned(),
            })
    }

    fn process_setting(&self, setting: &str, config: &mut ShellConfig) -> Result<(), ConfigError> {
        match setting.split_once('=') {
            Some((key, value)) => config.set_value(key.trim(), strip_quotes(value.trim())),
            None => Err(ConfigError::InvalidValue {
                key: "set".to_owned(),
                value: setting.to_owned(),
            }),
        }
    }
}

fn strip_quotes(value: &str) -> &str {
    let quoted = value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')));
    if quoted {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_process_env_var() {
        let environment = Environment::new();
        let loader = ConfigLoader::new(&environment);

        loader.process_env_var("TEST_VAR=\"hello world\"").unwrap();
        assert_eq!(environment.get("TEST_VAR").as_deref(), Some("hello world"));
    }

    #[test]
    fn test_export_expands_against_session() {
        let environment = Environment::new();
        environment.set("PATH", "/usr/bin").unwrap();
        let loader = ConfigLoader::new(&environment);

        loader.process_env_var("PATH=/usr/local/bin:$PATH").unwrap();
        assert_eq!(
            environment.get("PATH").as_deref(),
            Some("/usr/local/bin:/usr/bin")
        );
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("rc");
        fs::write(
            &rc,
            "# comment\n\nexport GREETING='hi there'\nset poll_interval_ms=20\nalias ll='ls -l'\n",
        )
        .unwrap();

        let environment = Environment::new();
        let mut config = ShellConfig::default();
        ConfigLoader::new(&environment)
            .load_file(&rc, &mut config)
            .unwrap();

        assert_eq!(environment.get("GREETING").as_deref(), Some("hi there"));
        assert_eq!(config.poll_interval, Duration::from_millis(20));
    }

    #[test]
    fn test_missing_file_is_fine() {
        let environment = Environment::new();
        let mut config = ShellConfig::default();
        let result = ConfigLoader::new(&environment)
            .load_file(Path::new("/nonexistent/cross_terminalrc"), &mut config);
        assert!(result.is_ok());
        assert_eq!(config, ShellConfig::default());
    }

    #[test]
    fn test_bad_setting_is_reported() {
        let environment = Environment::new();
        let mut config = ShellConfig::default();
        let loader = ConfigLoader::new(&environment);
        assert!(loader.process_line("set history_size", &mut config).is_err());
    }
}
