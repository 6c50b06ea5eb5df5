//! Command-line tokenizing, expansion and completion.

mod tokenizer;

pub use tokenizer::{expand_variables, Token, TokenKind, Tokenizer};

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::core::commands::BUILTIN_NAMES;
use crate::core::env::Environment;
use crate::path::PathExpander;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unterminated quote starting at {position}")]
    UnterminatedQuote { position: usize },
    #[error("missing redirection target at {position}")]
    MissingRedirectTarget { position: usize },
    #[error("unexpected `{operator}` at {position}")]
    UnexpectedOperator { operator: String, position: usize },
}

/// One parsed command line.
///
/// Only valid when `executable` is non-empty. Lines that need a real shell
/// (pipes, lists, `&&`/`||`) keep the first word as `executable` for display
/// and set `requires_shell`; `line` then holds the text to hand to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    pub executable: String,
    pub arguments: Vec<String>,
    pub input_redirect: Option<String>,
    pub output_redirect: Option<String>,
    pub append_output: bool,
    pub run_in_background: bool,
    pub requires_shell: bool,
    pub line: String,
}

impl ParsedCommand {
    pub fn is_valid(&self) -> bool {
        !self.executable.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    /// Lenient parse: any error yields an invalid (empty) command.
    pub fn parse(&self, command: &str, environment: &Environment) -> ParsedCommand {
        self.try_parse(command, environment).unwrap_or_default()
    }

    pub fn try_parse(
        &self,
        command: &str,
        environment: &Environment,
    ) -> Result<ParsedCommand, ParseError> {
        let tokens = Tokenizer::new(command, Some(environment)).tokenize()?;
        build(command, tokens)
    }

    /// Syntax check only; nothing is expanded.
    pub fn validate(&self, command: &str) -> Result<(), ParseError> {
        let tokens = Tokenizer::new(command, None).tokenize()?;
        check_structure(&tokens)
    }

    /// Completion candidates for `partial`, sorted lexically.
    ///
    /// Words that look like paths complete against the filesystem; anything
    /// else against the built-ins and the executables on the session `PATH`.
    pub fn get_completions(&self, partial: &str, environment: &Environment) -> Vec<String> {
        if partial.contains('/') || partial.starts_with('.') || partial.starts_with('~') {
            return complete_path(partial, environment);
        }

        let mut candidates: BTreeSet<String> = BUILTIN_NAMES
            .iter()
            .filter(|name| name.starts_with(partial))
            .map(|name| (*name).to_owned())
            .collect();

        if let Some(path_var) = environment.get("PATH") {
            for dir in std::env::split_paths(&path_var) {
                collect_executables(&dir, partial, &mut candidates);
            }
        }

        candidates.into_iter().collect()
    }
}

fn check_structure(tokens: &[Token]) -> Result<(), ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    for (i, token) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1);
        let unexpected = || ParseError::UnexpectedOperator {
            operator: token.kind.symbol().to_owned(),
            position: token.position,
        };

        match token.kind {
            TokenKind::Word(_) => {}
            TokenKind::RedirectIn | TokenKind::RedirectOut | TokenKind::Append => {
                if !matches!(next.map(|t| &t.kind), Some(TokenKind::Word(_))) {
                    return Err(ParseError::MissingRedirectTarget {
                        position: token.position,
                    });
                }
            }
            TokenKind::Pipe | TokenKind::And | TokenKind::Or => {
                if i == 0 || !matches!(next.map(|t| &t.kind), Some(TokenKind::Word(_))) {
                    return Err(unexpected());
                }
            }
            TokenKind::Semicolon | TokenKind::Background => {
                if i == 0 {
                    return Err(unexpected());
                }
            }
        }
    }

    Ok(())
}

fn build(command: &str, tokens: Vec<Token>) -> Result<ParsedCommand, ParseError> {
    check_structure(&tokens)?;

    let mut parsed = ParsedCommand::default();
    let mut line_end = command.len();
    let last = tokens.len() - 1;
    let mut tokens = tokens.into_iter().enumerate().peekable();

    while let Some((i, token)) = tokens.next() {
        match token.kind {
            TokenKind::Word(word) => {
                if parsed.executable.is_empty() {
                    parsed.executable = word;
                } else if !parsed.requires_shell {
                    parsed.arguments.push(word);
                }
            }
            TokenKind::RedirectIn | TokenKind::RedirectOut | TokenKind::Append => {
                let target = match tokens.next() {
                    Some((_, Token { kind: TokenKind::Word(w), .. })) => w,
                    _ => {
                        return Err(ParseError::MissingRedirectTarget {
                            position: token.position,
                        })
                    }
                };
                if parsed.requires_shell {
                    continue;
                }
                if token.kind == TokenKind::RedirectIn {
                    parsed.input_redirect = Some(target);
                } else {
                    parsed.append_output = token.kind == TokenKind::Append;
                    parsed.output_redirect = Some(target);
                }
            }
            TokenKind::Background if i == last => {
                parsed.run_in_background = true;
                line_end = char_offset_to_byte(command, token.position);
            }
            _ => parsed.requires_shell = true,
        }
    }

    if parsed.executable.is_empty() {
        return Err(ParseError::Empty);
    }

    parsed.line = command[..line_end].trim().to_owned();
    Ok(parsed)
}

fn char_offset_to_byte(text: &str, offset: usize) -> usize {
    text.char_indices()
        .nth(offset)
        .map_or(text.len(), |(byte, _)| byte)
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn collect_executables(dir: &Path, prefix: &str, out: &mut BTreeSet<String>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.filter_map(Result::ok) {
        if let Some(name) = entry.file_name().to_str() {
            if name.starts_with(prefix) && is_executable(&entry.path()) {
                out.insert(name.to_owned());
            }
        }
    }
}

fn complete_path(partial: &str, environment: &Environment) -> Vec<String> {
    let expander = PathExpander::with_home(environment.get("HOME").map(PathBuf::from));

    let (dir_part, file_prefix) = match partial.rfind('/') {
        Some(idx) => (&partial[..=idx], &partial[idx + 1..]),
        None => ("", partial),
    };

    let search_dir = if dir_part.is_empty() {
        PathBuf::from(".")
    } else {
        expander.expand(dir_part).unwrap_or_else(|_| PathBuf::from(dir_part))
    };

    let Ok(entries) = fs::read_dir(&search_dir) else {
        return Vec::new();
    };

    let mut matches: BTreeSet<String> = BTreeSet::new();
    for entry in entries.filter_map(Result::ok) {
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !name.starts_with(file_prefix) {
            continue;
        }
        if name.starts_with('.') && !file_prefix.starts_with('.') {
            continue;
        }

        let mut candidate = format!("{dir_part}{name}");
        if entry.path().is_dir() {
            candidate.push('/');
        }
        matches.insert(candidate);
    }

    matches.into_iter().collect()
}
