use std::collections::VecDeque;

/// Complete lines kept before the oldest ones scroll away.
pub const DEFAULT_MAX_LINES: usize = 10_000;

/// Accumulated terminal output, also split into complete lines.
///
/// A chunk that does not end in a newline leaves a partial line behind; the
/// next chunk continues it. Only the newest `max_lines` complete lines are
/// kept, and `text` is trimmed with them.
#[derive(Debug, Clone)]
pub struct Screen {
    text: String,
    lines: VecDeque<String>,
    partial: String,
    max_lines: usize,
}

impl Default for Screen {
    fn default() -> Self {
        Self::with_max_lines(DEFAULT_MAX_LINES)
    }
}

impl Screen {
    pub fn with_max_lines(max_lines: usize) -> Self {
        Self {
            text: String::new(),
            lines: VecDeque::new(),
            partial: String::new(),
            max_lines: max_lines.max(1),
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);

        let mut rest = chunk;
        while let Some(idx) = rest.find('\n') {
            self.partial.push_str(&rest[..idx]);
            self.lines.push_back(std::mem::take(&mut self.partial));
            rest = &rest[idx + 1..];
        }
        self.partial.push_str(rest);
        self.scroll();
    }

    fn scroll(&mut self) {
        let mut dropped = 0;
        while self.lines.len() > self.max_lines {
            if let Some(line) = self.lines.pop_front() {
                dropped += line.len() + 1;
            }
        }
        if dropped > 0 {
            self.text.drain(..dropped.min(self.text.len()));
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Complete lines followed by the partial one, if any.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.lines.iter().cloned().collect();
        if !self.partial.is_empty() {
            lines.push(self.partial.clone());
        }
        lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len() + usize::from(!self.partial.is_empty())
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.lines.clear();
        self.partial.clear();
    }
}
