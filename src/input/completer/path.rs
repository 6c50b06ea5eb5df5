use std::{
    fs,
    path::{Path, PathBuf},
};

use rustyline::completion::Pair;

use crate::path::PathExpander;

/// Completes file arguments relative to the session directory.
#[derive(Clone, Default)]
pub struct PathCompleter {
    expander: PathExpander,
}

impl PathCompleter {
    pub fn new(home: Option<PathBuf>) -> Self {
        Self {
            expander: PathExpander::with_home(home),
        }
    }

    pub fn complete_path(&self, incomplete: &str, base: &Path) -> Vec<Pair> {
        let (dir_part, file_prefix) = match incomplete.rfind('/') {
            Some(idx) => (&incomplete[..=idx], &incomplete[idx + 1..]),
            None => ("", incomplete),
        };

        let dir_to_search = if dir_part.is_empty() {
            base.to_path_buf()
        } else {
            let expanded = self
                .expander
                .expand(dir_part)
                .unwrap_or_else(|_| PathBuf::from(dir_part));
            base.join(expanded)
        };

        self.get_path_matches(&dir_to_search, dir_part, file_prefix)
    }

    fn get_path_matches(&self, dir_to_search: &Path, dir_part: &str, file_prefix: &str) -> Vec<Pair> {
        let Ok(entries) = fs::read_dir(dir_to_search) else {
            return Vec::new();
        };

        let mut matches: Vec<Pair> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_owned();
                let hidden = name.starts_with('.') && !file_prefix.starts_with('.');
                (name.starts_with(file_prefix) && !hidden)
                    .then(|| Self::create_completion_pair(dir_part, &name, entry.path().is_dir()))
            })
            .collect();

        matches.sort_by(|a, b| a.display.cmp(&b.display));
        matches
    }

    fn create_completion_pair(dir_part: &str, name: &str, is_dir: bool) -> Pair {
        let relative_path = format!("{dir_part}{name}");
        if is_dir {
            Pair {
                display: format!("{relative_path}/"),
                replacement: format!("{relative_path}/"),
            }
        } else {
            Pair {
                display: relative_path.clone(),
                replacement: format!("{relative_path} "),
            }
        }
    }
}
