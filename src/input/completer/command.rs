use std::sync::Arc;

use rustyline::completion::Pair;

use crate::core::commands::BUILTIN_NAMES;
use crate::shell::Shell;

/// Completes the command word from the built-ins and the session `PATH`.
#[derive(Clone)]
pub struct CommandCompleter {
    shell: Arc<Shell>,
}

impl CommandCompleter {
    pub fn new(shell: Arc<Shell>) -> Self {
        Self { shell }
    }

    pub fn complete_command(&self, word: &str) -> Vec<Pair> {
        self.shell
            .parser()
            .get_completions(word.trim(), self.shell.get_environment())
            .into_iter()
            .map(|candidate| {
                let display = if BUILTIN_NAMES.contains(&candidate.as_str()) {
                    format!("{candidate} (builtin)")
                } else {
                    candidate.clone()
                };
                let replacement = if candidate.ends_with('/') {
                    candidate
                } else {
                    format!("{candidate} ")
                };
                Pair {
                    display,
                    replacement,
                }
            })
            .collect()
    }
}
