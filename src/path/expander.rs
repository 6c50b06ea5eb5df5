use crate::core::config::ConfigError;
use std::path::{Path, PathBuf};

/// Expands a leading `~` against a home directory.
///
/// The home directory comes from the session (`HOME` in the shell's
/// [`Environment`](crate::core::env::Environment)) when known, otherwise
/// from the OS user database.
#[derive(Debug, Clone, Default)]
pub struct PathExpander {
    home: Option<PathBuf>,
}

impl PathExpander {
    pub fn new() -> Self {
        Self { home: None }
    }

    pub fn with_home(home: Option<PathBuf>) -> Self {
        Self {
            home: home.filter(|h| !h.as_os_str().is_empty()),
        }
    }

    pub fn expand(&self, path: &str) -> Result<PathBuf, ConfigError> {
        if self.is_home_path(path) {
            self.expand_tilde(path)
        } else {
            Ok(Path::new(path).to_path_buf())
        }
    }

    /// Expands a word in place, returning it unchanged when no home directory
    /// can be resolved.
    pub fn expand_word(&self, word: &str) -> String {
        if !self.is_home_path(word) {
            return word.to_owned();
        }
        self.expand_tilde(word)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| word.to_owned())
    }

    fn expand_tilde(&self, path: &str) -> Result<PathBuf, ConfigError> {
        let rest = &path[1..];
        if rest.is_empty() {
            return self.get_home_dir();
        }

        match rest.strip_prefix('/') {
            Some(stripped) => {
                let mut home_path = self.get_home_dir()?;
                for part in stripped.split('/').filter(|p| !p.is_empty()) {
                    home_path.push(part);
                }
                Ok(home_path)
            }
            // "~user" forms are left alone
            None => Ok(Path::new(path).to_path_buf()),
        }
    }

    /// True for `~` and `~/...`.
    pub fn is_home_path(&self, path: &str) -> bool {
        path == "~" || path.starts_with("~/")
    }

    pub fn get_home_dir(&self) -> Result<PathBuf, ConfigError> {
        self.home
            .clone()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::HomeDirNotFound)
    }

    /// Replaces a home-directory prefix with `~`, for prompts.
    pub fn shorten(&self, path: &Path) -> String {
        if let Ok(home) = self.get_home_dir() {
            if let Ok(rest) = path.strip_prefix(&home) {
                return if rest.as_os_str().is_empty() {
                    "~".to_owned()
                } else {
                    format!("~/{}", rest.display())
                };
            }
        }
        path.display().to_string()
    }
}
