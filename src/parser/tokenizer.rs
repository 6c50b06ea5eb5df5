use super::ParseError;
use crate::core::env::Environment;
use crate::path::PathExpander;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Word(String),
    Pipe,
    RedirectIn,
    RedirectOut,
    Append,
    Background,
    Semicolon,
    And,
    Or,
}

impl TokenKind {
    pub fn symbol(&self) -> &str {
        match self {
            TokenKind::Word(word) => word,
            TokenKind::Pipe => "|",
            TokenKind::RedirectIn => "<",
            TokenKind::RedirectOut => ">",
            TokenKind::Append => ">>",
            TokenKind::Background => "&",
            TokenKind::Semicolon => ";",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
        }
    }
}

/// A token and the character offset it starts at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

/// Splits a command line into words and operators.
///
/// With an environment attached, `$NAME`, `${NAME}` and a leading `~` are
/// expanded while words are built; without one the input is only checked.
pub struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    environment: Option<&'a Environment>,
    expander: PathExpander,
}

#[derive(Default)]
struct WordBuilder {
    text: String,
    start: Option<usize>,
    quoted: bool,
    tilde: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &str, environment: Option<&'a Environment>) -> Self {
        let home = environment
            .and_then(|env| env.get("HOME"))
            .map(std::path::PathBuf::from);

        Self {
            chars: input.chars().collect(),
            pos: 0,
            environment,
            expander: PathExpander::with_home(home),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut word = WordBuilder::default();

        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.pos += 1;
                    self.flush(&mut word, &mut tokens);
                }
                '\'' => {
                    word.start.get_or_insert(self.pos);
                    word.quoted = true;
                    self.single_quoted(&mut word.text)?;
                }
                '"' => {
                    word.start.get_or_insert(self.pos);
                    word.quoted = true;
                    self.double_quoted(&mut word.text)?;
                }
                '\\' => {
                    word.start.get_or_insert(self.pos);
                    word.quoted = true;
                    self.pos += 1;
                    if let Some(escaped) = self.peek() {
                        word.text.push(escaped);
                        self.pos += 1;
                    } else {
                        word.text.push('\\');
                    }
                }
                '$' => {
                    word.start.get_or_insert(self.pos);
                    self.variable(&mut word.text);
                }
                '|' | '&' | ';' | '<' | '>' => {
                    self.flush(&mut word, &mut tokens);
                    tokens.push(self.operator(c));
                }
                '~' if word.start.is_none() => {
                    word.start = Some(self.pos);
                    word.tilde = true;
                    word.text.push('~');
                    self.pos += 1;
                }
                _ => {
                    word.start.get_or_insert(self.pos);
                    word.text.push(c);
                    self.pos += 1;
                }
            }
        }

        self.flush(&mut word, &mut tokens);
        Ok(tokens)
    }

    fn flush(&self, word: &mut WordBuilder, tokens: &mut Vec<Token>) {
        let finished = std::mem::take(word);
        let Some(position) = finished.start else {
            return;
        };

        let text = if finished.tilde && self.environment.is_some() {
            self.expander.expand_word(&finished.text)
        } else {
            finished.text
        };

        // An unquoted expansion to nothing disappears, as in sh.
        if !text.is_empty() || finished.quoted {
            tokens.push(Token {
                kind: TokenKind::Word(text),
                position,
            });
        }
    }

    fn operator(&mut self, c: char) -> Token {
        let position = self.pos;
        let doubled = self.peek_next() == Some(c);
        let kind = match (c, doubled) {
            ('|', true) => TokenKind::Or,
            ('|', false) => TokenKind::Pipe,
            ('&', true) => TokenKind::And,
            ('&', false) => TokenKind::Background,
            ('>', true) => TokenKind::Append,
            ('>', false) => TokenKind::RedirectOut,
            ('<', _) => TokenKind::RedirectIn,
            _ => TokenKind::Semicolon,
        };

        let width = if doubled && c != '<' && c != ';' { 2 } else { 1 };
        self.pos += width;
        Token { kind, position }
    }

    fn single_quoted(&mut self, out: &mut String) -> Result<(), ParseError> {
        let open = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\'' {
                return Ok(());
            }
            out.push(c);
        }
        Err(ParseError::UnterminatedQuote { position: open })
    }

    fn double_quoted(&mut self, out: &mut String) -> Result<(), ParseError> {
        let open = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.pos += 1;
                    return Ok(());
                }
                '\\' if matches!(self.peek_next(), Some('"' | '\\' | '$' | '`')) => {
                    if let Some(escaped) = self.peek_next() {
                        out.push(escaped);
                    }
                    self.pos += 2;
                }
                '$' => self.variable(out),
                _ => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
        Err(ParseError::UnterminatedQuote { position: open })
    }

    /// Expands the variable reference at `self.pos` (which is on the `$`).
    fn variable(&mut self, out: &mut String) {
        let (consumed, name) = scan_variable(&self.chars[self.pos..]);
        match name {
            Some(name) => {
                if let Some(value) = self.environment.and_then(|env| env.get(&name)) {
                    out.push_str(&value);
                }
                self.pos += consumed;
            }
            None => {
                out.push('$');
                self.pos += 1;
            }
        }
    }
}

/// Parses `$NAME` or `${NAME}` at the start of `chars`. Returns the number
/// of characters consumed and the name, or `None` when this `$` is literal.
fn scan_variable(chars: &[char]) -> (usize, Option<String>) {
    let is_name = |c: &char| c.is_ascii_alphanumeric() || *c == '_';

    match chars.get(1) {
        Some('{') => {
            let body: String = chars[2..].iter().take_while(|c| **c != '}').collect();
            let closed = chars.get(2 + body.chars().count()) == Some(&'}');
            if closed && !body.is_empty() && body.chars().all(|c| is_name(&c)) {
                (body.chars().count() + 3, Some(body))
            } else {
                (1, None)
            }
        }
        Some(c) if is_name(c) => {
            let name: String = chars[1..].iter().take_while(|c| is_name(c)).collect();
            (name.len() + 1, Some(name))
        }
        _ => (1, None),
    }
}

/// Expands `$NAME` and `${NAME}` references in `text`; unset names become
/// empty. Quotes are not interpreted.
pub fn expand_variables(text: &str, environment: &Environment) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let (consumed, name) = scan_variable(&chars[i..]);
        match name {
            Some(name) => {
                if let Some(value) = environment.get(&name) {
                    out.push_str(&value);
                }
            }
            None => out.push('$'),
        }
        i += consumed;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(input: &str, env: &Environment) -> Vec<String> {
        Tokenizer::new(input, Some(env))
            .tokenize()
            .unwrap()
            .into_iter()
            .filter_map(|t| match t.kind {
                TokenKind::Word(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    fn env() -> Environment {
        let env = Environment::new();
        env.set("NAME", "world").unwrap();
        env.set("HOME", "/home/test").unwrap();
        env
    }

    #[test]
    fn test_quotes_group_words() {
        let env = env();
        assert_eq!(
            words(r#"echo "hello there" 'single quoted' plain"#, &env),
            vec!["echo", "hello there", "single quoted", "plain"]
        );
        assert_eq!(words("echo ''", &env), vec!["echo", ""]);
        assert_eq!(words("a'b'\"c\"", &env), vec!["abc"]);
    }

    #[test]
    fn test_variable_expansion() {
        let env = env();
        assert_eq!(words("echo $NAME", &env), vec!["echo", "world"]);
        assert_eq!(words("echo ${NAME}!", &env), vec!["echo", "world!"]);
        assert_eq!(words("echo \"hi $NAME\"", &env), vec!["echo", "hi world"]);
        assert_eq!(words("echo '$NAME'", &env), vec!["echo", "$NAME"]);
        assert_eq!(words("echo $MISSING end", &env), vec!["echo", "end"]);
        assert_eq!(words("echo \"$MISSING\"", &env), vec!["echo", ""]);
        assert_eq!(words("echo $ 5$", &env), vec!["echo", "$", "5$"]);
    }

    #[test]
    fn test_escapes() {
        let env = env();
        assert_eq!(words(r"echo a\ b \$NAME", &env), vec!["echo", "a b", "$NAME"]);
        assert_eq!(words(r#"echo "say \"hi\"""#, &env), vec!["echo", "say \"hi\""]);
    }

    #[test]
    fn test_tilde_expansion() {
        let env = env();
        assert_eq!(
            words("ls ~ ~/src a~b '~'", &env),
            vec!["ls", "/home/test", "/home/test/src", "a~b", "~"]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = Tokenizer::new("a|b || c && d; e > f >> g < h &", None)
            .tokenize()
            .unwrap();
        let kinds: Vec<_> = tokens
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::Word(_)))
            .map(|t| t.kind.symbol().to_owned())
            .collect();
        assert_eq!(kinds, vec!["|", "||", "&&", ";", ">", ">>", "<", "&"]);
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_unterminated_quote() {
        let result = Tokenizer::new("echo \"oops", None).tokenize();
        assert_eq!(result, Err(ParseError::UnterminatedQuote { position: 5 }));

        let result = Tokenizer::new("echo 'oops", None).tokenize();
        assert_eq!(result, Err(ParseError::UnterminatedQuote { position: 5 }));
    }

    #[test]
    fn test_expand_variables_helper() {
        let env = env();
        assert_eq!(expand_variables("$HOME/bin:${NAME}", &env), "/home/test/bin:world");
        assert_eq!(expand_variables("cost $5 and ${", &env), "cost  and ${");
    }
}
