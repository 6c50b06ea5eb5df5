use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

/// Append-only, one-command-per-line history file.
#[derive(Debug, Clone)]
pub struct FileOps {
    file_path: PathBuf,
}

impl FileOps {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// The last `limit` non-blank lines, oldest first. A missing file is an
    /// empty history.
    pub fn load_entries(&self, limit: usize) -> io::Result<Vec<String>> {
        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.file_path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                entries.push(line);
            }
        }

        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
        Ok(entries)
    }

    pub fn append_entry(&self, entry: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.file_path)?;

        writeln!(file, "{}", entry)?;
        Ok(())
    }
}
