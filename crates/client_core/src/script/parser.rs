use crate::error::ExecutionError;

use super::lexer::{tokenize, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Ident { name: String, line: usize },
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Object(Vec<(String, Expr)>),
    Member {
        object: Box<Expr>,
        property: String,
        line: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        line: usize,
    },
    Import { specifier: Box<Expr>, line: usize },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        line: usize,
    },
    /// Only produced at the head of a statement, initializer or return value.
    Await(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Stmt {
    Declare {
        kind: DeclKind,
        name: String,
        init: Option<Expr>,
        line: usize,
    },
    Expr(Expr),
    Return(Option<Expr>),
    Throw(Expr),
}

/// A parsed executable unit. Parsing completes before anything runs, so a
/// syntax error never leaves the page half updated.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) statements: Vec<Stmt>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "function", "new", "if", "else", "for", "while", "do", "switch", "class", "try", "catch",
    "delete", "typeof", "yield", "async", "this", "export",
];

pub fn parse(source: &str) -> Result<Program, ExecutionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while !parser.at_eof() {
        if parser.eat_punct(';') {
            continue;
        }
        statements.push(parser.statement()?);
    }
    Ok(Program { statements })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn is_punct(&self, ch: char) -> bool {
        self.peek().kind == TokenKind::Punct(ch)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(ident) if ident == name)
    }

    fn eat_punct(&mut self, ch: char) -> bool {
        if self.is_punct(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> ExecutionError {
        ExecutionError::Syntax {
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn expect_punct(&mut self, ch: char) -> Result<(), ExecutionError> {
        if self.eat_punct(ch) {
            Ok(())
        } else {
            let token = self.peek().clone();
            Err(self.error_at(&token, format!("expected '{ch}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, usize), ExecutionError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.line)),
            _ => Err(self.error_at(&token, "expected identifier")),
        }
    }

    /// Accepts `;`, a line break, `}` or end of input after a statement.
    fn end_statement(&mut self) -> Result<(), ExecutionError> {
        if self.eat_punct(';') || self.at_eof() || self.peek().newline_before || self.is_punct('}') {
            return Ok(());
        }
        let token = self.peek().clone();
        Err(self.error_at(&token, "expected ';'"))
    }

    fn statement(&mut self) -> Result<Stmt, ExecutionError> {
        let token = self.peek().clone();
        let stmt = match &token.kind {
            TokenKind::Ident(word) if matches!(word.as_str(), "let" | "var" | "const") => {
                let kind = match word.as_str() {
                    "let" => DeclKind::Let,
                    "const" => DeclKind::Const,
                    _ => DeclKind::Var,
                };
                self.advance();
                let (name, line) = self.expect_ident()?;
                let init = if self.eat_punct('=') {
                    Some(self.statement_expression()?)
                } else if kind == DeclKind::Const {
                    return Err(self.error_at(&token, "missing initializer in const declaration"));
                } else {
                    None
                };
                Stmt::Declare {
                    kind,
                    name,
                    init,
                    line,
                }
            }
            TokenKind::Ident(word) if word == "return" => {
                self.advance();
                if self.at_eof() || self.is_punct(';') || self.is_punct('}') || self.peek().newline_before {
                    Stmt::Return(None)
                } else {
                    Stmt::Return(Some(self.statement_expression()?))
                }
            }
            TokenKind::Ident(word) if word == "throw" => {
                self.advance();
                if self.peek().newline_before {
                    return Err(self.error_at(&token, "illegal newline after throw"));
                }
                Stmt::Throw(self.statement_expression()?)
            }
            _ => Stmt::Expr(self.statement_expression()?),
        };
        self.end_statement()?;
        Ok(stmt)
    }

    fn statement_expression(&mut self) -> Result<Expr, ExecutionError> {
        if self.is_ident("await") {
            self.advance();
            return Ok(Expr::Await(Box::new(self.expression()?)));
        }
        self.expression()
    }

    fn expression(&mut self) -> Result<Expr, ExecutionError> {
        let start = self.peek().clone();
        let target = self.postfix()?;
        if !self.eat_punct('=') {
            return Ok(target);
        }
        if !matches!(target, Expr::Ident { .. } | Expr::Member { .. }) {
            return Err(self.error_at(&start, "invalid assignment target"));
        }
        let value = self.expression()?;
        Ok(Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
            line: start.line,
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExecutionError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct('.') {
                let (property, line) = self.expect_ident()?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    line,
                };
            } else if self.is_punct('(') {
                let line = self.advance().line;
                let args = self.arguments()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    line,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ExecutionError> {
        let mut args = Vec::new();
        while !self.eat_punct(')') {
            args.push(self.expression()?);
            if !self.eat_punct(',') {
                self.expect_punct(')')?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ExecutionError> {
        let token = self.advance();
        match token.kind.clone() {
            TokenKind::Str(value) => Ok(Expr::Str(value)),
            TokenKind::Num(value) => Ok(Expr::Num(value)),
            TokenKind::Punct('(') => {
                let inner = self.expression()?;
                self.expect_punct(')')?;
                Ok(inner)
            }
            TokenKind::Punct('{') => self.object_literal(),
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "import" => {
                    self.expect_punct('(')?;
                    let specifier = self.expression()?;
                    self.expect_punct(')')?;
                    Ok(Expr::Import {
                        specifier: Box::new(specifier),
                        line: token.line,
                    })
                }
                "await" => Err(self.error_at(
                    &token,
                    "await is only supported at the start of a statement",
                )),
                "let" | "var" | "const" | "return" | "throw" => {
                    Err(self.error_at(&token, format!("unexpected keyword '{name}'")))
                }
                keyword if UNSUPPORTED_KEYWORDS.contains(&keyword) => {
                    Err(self.error_at(&token, format!("unsupported syntax '{keyword}'")))
                }
                _ => Ok(Expr::Ident {
                    name,
                    line: token.line,
                }),
            },
            TokenKind::Eof => Err(self.error_at(&token, "unexpected end of input")),
            TokenKind::Punct(ch) => Err(self.error_at(&token, format!("unexpected token '{ch}'"))),
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ExecutionError> {
        let mut fields = Vec::new();
        while !self.eat_punct('}') {
            let token = self.advance();
            let key = match token.kind {
                TokenKind::Ident(name) | TokenKind::Str(name) => name,
                _ => return Err(self.error_at(&token, "expected property name")),
            };
            self.expect_punct(':')?;
            fields.push((key, self.expression()?));
            if !self.eat_punct(',') {
                self.expect_punct('}')?;
                break;
            }
        }
        Ok(Expr::Object(fields))
    }
}
