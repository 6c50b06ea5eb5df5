mod file_ops;

use std::{collections::VecDeque, io, path::PathBuf};

use tracing::debug;

pub use self::file_ops::FileOps;

/// Command history in insertion order, capped at `max_entries`.
///
/// With a backing file every accepted entry is appended to it as well.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<String>,
    file_ops: Option<FileOps>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        History {
            entries: VecDeque::new(),
            file_ops: None,
            max_entries,
        }
    }

    pub fn with_file(history_file: PathBuf, max_entries: usize) -> io::Result<Self> {
        let file_ops = FileOps::new(history_file);
        let entries: VecDeque<String> = file_ops.load_entries(max_entries)?.into();
        debug!(path = %file_ops.path().display(), loaded = entries.len(), "history loaded");

        Ok(History {
            entries,
            file_ops: Some(file_ops),
            max_entries,
        })
    }

    /// Blank entries are ignored.
    pub fn add(&mut self, entry: &str) -> io::Result<()> {
        if entry.trim().is_empty() {
            return Ok(());
        }

        self.entries.push_back(entry.to_owned());
        self.trim_entries();

        if let Some(file_ops) = &self.file_ops {
            file_ops.append_entry(entry)?;
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    /// Distinct entries starting with `prefix`, most recent first.
    pub fn search_prefix(&self, prefix: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for entry in self.entries.iter().rev() {
            if entry.starts_with(prefix) && !found.contains(entry) {
                found.push(entry.clone());
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn trim_entries(&mut self) {
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_insertion_order() {
        let mut history = History::new(10);
        for cmd in ["ls -la", "cd /tmp", "pwd", "  "] {
            history.add(cmd).unwrap();
        }
        assert_eq!(history.entries(), vec!["ls -la", "cd /tmp", "pwd"]);
        assert_eq!(history.last(), Some("pwd"));
    }

    #[test]
    fn test_bounded() {
        let mut history = History::new(2);
        for cmd in ["a", "b", "c"] {
            history.add(cmd).unwrap();
        }
        assert_eq!(history.entries(), vec!["b", "c"]);
    }

    #[test]
    fn test_search_prefix() {
        let mut history = History::new(10);
        for cmd in ["git status", "ls", "git log", "git status"] {
            history.add(cmd).unwrap();
        }
        assert_eq!(history.search_prefix("git"), vec!["git status", "git log"]);
    }

    #[test]
    fn test_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");

        let mut history = History::with_file(path.clone(), 2).unwrap();
        for cmd in ["one", "two", "three"] {
            history.add(cmd).unwrap();
        }

        let reloaded = History::with_file(path, 2).unwrap();
        assert_eq!(reloaded.entries(), vec!["two", "three"]);
    }
}
