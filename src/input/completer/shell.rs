use std::{borrow::Cow, path::PathBuf, sync::Arc};

use super::{command::CommandCompleter, path::PathCompleter};
use crate::highlight::SyntaxHighlighter;
use crate::parser::ParseError;
use crate::shell::Shell;

use rustyline::{
    completion::{Completer, Pair},
    highlight::{CmdKind, Highlighter},
    hint::Hinter,
    validate::{ValidationContext, ValidationResult, Validator},
    Context, Helper,
};

/// rustyline helper: completion, highlighting and quote continuation.
#[derive(Clone)]
pub struct ShellCompleter {
    shell: Arc<Shell>,
    command_completer: CommandCompleter,
    highlighter: SyntaxHighlighter,
}

impl ShellCompleter {
    pub fn new(shell: Arc<Shell>) -> Self {
        ShellCompleter {
            command_completer: CommandCompleter::new(Arc::clone(&shell)),
            highlighter: SyntaxHighlighter::new(),
            shell,
        }
    }

    fn path_completer(&self) -> PathCompleter {
        let home = self.shell.get_environment().get("HOME").map(PathBuf::from);
        PathCompleter::new(home)
    }
}

impl Helper for ShellCompleter {}

impl Highlighter for ShellCompleter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned(self.highlighter.highlight_command(line))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, _default: bool) -> Cow<'b, str> {
        Cow::Owned(self.highlighter.highlight_prompt(prompt))
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(self.highlighter.highlight_hint(hint))
    }
}

impl Hinter for ShellCompleter {
    type Hint = String;
}

impl Validator for ShellCompleter {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        match self.shell.parser().validate(ctx.input()) {
            Err(ParseError::UnterminatedQuote { .. }) => Ok(ValidationResult::Incomplete),
            _ => Ok(ValidationResult::Valid(None)),
        }
    }
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_up_to_cursor = &line[..pos];
        let start = line_up_to_cursor
            .rfind(|c: char| c.is_whitespace() || matches!(c, '|' | ';' | '&'))
            .map_or(0, |idx| idx + 1);
        let word = &line_up_to_cursor[start..];

        // The first word after the start of line or a separator is a command.
        let before = line_up_to_cursor[..start].trim_end();
        let is_command = before.is_empty() || before.ends_with(['|', ';', '&']);

        let matches = if is_command && !word.contains('/') {
            self.command_completer.complete_command(word)
        } else {
            self.path_completer()
                .complete_path(word, &self.shell.get_current_directory())
        };

        Ok((start, matches))
    }
}
