use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::commands::CommandError;
use crate::process::ExecutionOptions;

impl super::Shell {
    /// Directory a spawn runs in: the option (relative to the session
    /// directory) or the session directory itself.
    pub(crate) fn spawn_directory(&self, options: &ExecutionOptions) -> PathBuf {
        let current = self.get_current_directory();
        match &options.working_directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => current.join(dir),
            None => current,
        }
    }

    /// Variables handed to a child: the options' snapshot, or the session
    /// environment, with `PWD` pointing at `working_dir`.
    pub(crate) fn spawn_environment(
        &self,
        options: &ExecutionOptions,
        working_dir: &Path,
    ) -> BTreeMap<String, String> {
        let mut vars = match &options.environment {
            Some(vars) => vars.clone(),
            None => self.get_environment().get_all(),
        };
        vars.insert("PWD".to_owned(), working_dir.to_string_lossy().into_owned());
        vars
    }

    /// Resolves `path` against the session directory and checks it is an
    /// existing directory.
    pub(crate) fn resolve_directory(&self, path: &Path) -> Result<PathBuf, CommandError> {
        let joined = self.get_current_directory().join(path);
        let resolved = joined.canonicalize().map_err(|e| {
            CommandError::Execution(format!("{}: {e}", path.display()))
        })?;

        if resolved.is_dir() {
            Ok(resolved)
        } else {
            Err(CommandError::Execution(format!(
                "{}: Not a directory",
                path.display()
            )))
        }
    }
}
