use crate::error::ExecutionError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: usize,
    pub(crate) column: usize,
    /// A line terminator separates this token from the previous one.
    pub(crate) newline_before: bool,
}

const PUNCTUATION: &[char] = &['.', ',', ';', ':', '(', ')', '{', '}', '='];

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
    newline_pending: bool,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ExecutionError> {
    let mut lexer = Lexer {
        chars: source.chars().peekable(),
        line: 1,
        column: 1,
        newline_pending: false,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl Lexer<'_> {
    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
            self.newline_pending = true;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ExecutionError {
        ExecutionError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ExecutionError> {
        loop {
            match self.chars.peek().copied() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.next() {
                        Some('/') => {
                            while let Some(ch) = self.chars.peek().copied() {
                                if ch == '\n' {
                                    break;
                                }
                                self.bump();
                            }
                        }
                        Some('*') => {
                            let (line, column) = (self.line, self.column);
                            self.bump();
                            self.bump();
                            let mut closed = false;
                            while let Some(ch) = self.bump() {
                                if ch == '*' && self.chars.peek() == Some(&'/') {
                                    self.bump();
                                    closed = true;
                                    break;
                                }
                            }
                            if !closed {
                                return Err(self.error(line, column, "unterminated comment"));
                            }
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ExecutionError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let newline_before = std::mem::take(&mut self.newline_pending);
        let make = |kind| Token {
            kind,
            line,
            column,
            newline_before,
        };

        let Some(ch) = self.chars.peek().copied() else {
            return Ok(make(TokenKind::Eof));
        };

        if ch == '\'' || ch == '"' {
            self.bump();
            let value = self.string_body(ch, line, column)?;
            // A line continuation inside the literal does not separate tokens.
            self.newline_pending = false;
            return Ok(make(TokenKind::Str(value)));
        }

        if ch.is_ascii_digit() {
            let mut literal = String::new();
            while let Some(next) = self.chars.peek().copied() {
                if next.is_ascii_digit() || next == '.' {
                    literal.push(next);
                    self.bump();
                } else {
                    break;
                }
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| self.error(line, column, format!("invalid number '{literal}'")))?;
            return Ok(make(TokenKind::Num(value)));
        }

        if ch.is_alphabetic() || ch == '_' || ch == '$' {
            let mut ident = String::new();
            while let Some(next) = self.chars.peek().copied() {
                if next.is_alphanumeric() || next == '_' || next == '$' {
                    ident.push(next);
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(make(TokenKind::Ident(ident)));
        }

        if PUNCTUATION.contains(&ch) {
            self.bump();
            if ch == '=' && matches!(self.chars.peek(), Some('=') | Some('>')) {
                return Err(self.error(line, column, "unsupported operator"));
            }
            return Ok(make(TokenKind::Punct(ch)));
        }

        Err(self.error(line, column, format!("unexpected character '{ch}'")))
    }

    fn string_body(&mut self, quote: char, line: usize, column: usize) -> Result<String, ExecutionError> {
        let mut value = String::new();
        loop {
            let Some(ch) = self.chars.peek().copied() else {
                return Err(self.error(line, column, "unterminated string literal"));
            };
            if ch == '\n' {
                return Err(self.error(line, column, "unterminated string literal"));
            }
            self.bump();
            if ch == quote {
                return Ok(value);
            }
            if ch != '\\' {
                value.push(ch);
                continue;
            }
            let Some(escaped) = self.bump() else {
                return Err(self.error(line, column, "unterminated string literal"));
            };
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '0' => value.push('\0'),
                'u' => {
                    let mut hex = String::with_capacity(4);
                    for _ in 0..4 {
                        match self.bump() {
                            Some(digit) if digit.is_ascii_hexdigit() => hex.push(digit),
                            _ => {
                                return Err(self.error(line, column, "invalid unicode escape"));
                            }
                        }
                    }
                    let code = u32::from_str_radix(&hex, 16)
                        .map_err(|_| self.error(line, column, "invalid unicode escape"))?;
                    value.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                // Line continuation.
                '\n' => {}
                other => value.push(other),
            }
        }
    }
}
