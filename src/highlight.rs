use inksac::prelude::*;

use crate::core::commands::BUILTIN_NAMES;

/// ANSI colouring for the REPL line, prompt and messages.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxHighlighter {
    color_support: ColorSupport,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordKind {
    Builtin,
    Command,
    Flag,
    Variable,
    Operator,
    Plain,
}

fn is_operator(word: &str) -> bool {
    matches!(word, "|" | "||" | "&&" | ";" | "&" | "<" | ">" | ">>")
}

/// Splits `input` into alternating whitespace and non-whitespace runs so
/// re-joining them reproduces the line exactly.
fn segments(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_space = None;

    for (idx, ch) in input.char_indices() {
        let space = ch.is_whitespace();
        if in_space.is_some_and(|prev| prev != space) {
            parts.push(&input[start..idx]);
            start = idx;
        }
        in_space = Some(space);
    }
    if start < input.len() {
        parts.push(&input[start..]);
    }
    parts
}

impl SyntaxHighlighter {
    pub fn new() -> Self {
        let support = check_color_support().unwrap_or(ColorSupport::NoColor);
        Self {
            color_support: support,
        }
    }

    fn enabled(&self) -> bool {
        !matches!(self.color_support, ColorSupport::NoColor)
    }

    fn classify(input: &str) -> Vec<(&str, WordKind)> {
        let mut expect_command = true;
        segments(input)
            .into_iter()
            .map(|part| {
                let kind = if part.trim().is_empty() {
                    WordKind::Plain
                } else if is_operator(part) {
                    expect_command = !matches!(part, "<" | ">" | ">>");
                    WordKind::Operator
                } else if expect_command {
                    expect_command = false;
                    if BUILTIN_NAMES.contains(&part) {
                        WordKind::Builtin
                    } else {
                        WordKind::Command
                    }
                } else if part.starts_with('-') {
                    WordKind::Flag
                } else if part.starts_with('$') {
                    WordKind::Variable
                } else {
                    WordKind::Plain
                };
                (part, kind)
            })
            .collect()
    }

    pub fn highlight_command(&self, input: &str) -> String {
        if !self.enabled() {
            return input.to_string();
        }

        Self::classify(input)
            .into_iter()
            .map(|(part, kind)| {
                let style = match kind {
                    WordKind::Builtin => Style::builder().foreground(Color::Magenta).bold().build(),
                    WordKind::Command => Style::builder().foreground(Color::Cyan).bold().build(),
                    WordKind::Flag => Style::builder().foreground(Color::Yellow).build(),
                    WordKind::Variable => Style::builder().foreground(Color::Green).build(),
                    WordKind::Operator => Style::builder().foreground(Color::Red).build(),
                    WordKind::Plain => return part.to_string(),
                };
                part.style(style).to_string()
            })
            .collect()
    }

    pub fn highlight_prompt(&self, prompt: &str) -> String {
        if !self.enabled() {
            return prompt.to_string();
        }

        let prompt_style = Style::builder().foreground(Color::Blue).bold().build();
        prompt.style(prompt_style).to_string()
    }

    pub fn highlight_error(&self, error: &str) -> String {
        if !self.enabled() {
            return error.to_string();
        }

        let error_style = Style::builder().foreground(Color::Red).bold().build();
        error.style(error_style).to_string()
    }

    pub fn highlight_hint(&self, hint: &str) -> String {
        if !self.enabled() {
            return hint.to_string();
        }

        let hint_style = Style::builder()
            .foreground(Color::RGB(128, 128, 128))
            .build();
        hint.style(hint_style).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_round_trip() {
        let line = "  ls -la   | grep  x ";
        assert_eq!(segments(line).concat(), line);
    }

    #[test]
    fn test_classification() {
        let kinds: Vec<WordKind> = SyntaxHighlighter::classify("cd -P $HOME && ls > out")
            .into_iter()
            .filter(|(part, _)| !part.trim().is_empty())
            .map(|(_, kind)| kind)
            .collect();

        assert_eq!(
            kinds,
            vec![
                WordKind::Builtin,
                WordKind::Flag,
                WordKind::Variable,
                WordKind::Operator,
                WordKind::Command,
                WordKind::Operator,
                WordKind::Plain,
            ]
        );
    }

    #[test]
    fn test_no_color_passthrough() {
        let highlighter = SyntaxHighlighter {
            color_support: ColorSupport::NoColor,
        };
        assert_eq!(highlighter.highlight_command("echo hi"), "echo hi");
        assert_eq!(highlighter.highlight_error("boom"), "boom");
    }
}
