//! Tokenizer for signal script.
//!
//! Newlines end statements except inside brackets. `#` starts a comment that
//! runs to the end of the line.

use crate::domain::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Newline,
    Eof,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    Pipe,
    Tilde,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::StarStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Assign => "=",
            TokenKind::Eq => "==",
            TokenKind::Ne => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Tilde => "~",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    pub line: usize,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    brackets: Vec<(char, usize, usize)>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            brackets: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.remaining().chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>, position: usize) -> ParseError {
        ParseError {
            message: message.into(),
            position,
            line: self.line,
        }
    }

    fn push(&mut self, kind: TokenKind, position: usize) {
        self.tokens.push(Token {
            kind,
            position,
            line: self.line,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, ParseError> {
        while let Some(ch) = self.peek() {
            let start = self.pos;
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                '\\' if self.peek_nth(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                    self.line += 1;
                }
                '\n' => {
                    self.advance();
                    if self.brackets.is_empty() {
                        self.push(TokenKind::Newline, start);
                    }
                    self.line += 1;
                }
                '0'..='9' => self.number()?,
                '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.number()?,
                '\'' | '"' => self.string(ch)?,
                c if c.is_alphabetic() || c == '_' => self.ident(),
                _ => self.operator(ch)?,
            }
        }

        if let Some(&(open, position, line)) = self.brackets.last() {
            return Err(ParseError {
                message: format!("'{open}' was never closed"),
                position,
                line,
            });
        }

        let end = self.input.len();
        self.push(TokenKind::Newline, end);
        self.push(TokenKind::Eof, end);
        Ok(self.tokens)
    }

    fn number(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        let mut has_dot = false;
        let mut has_exp = false;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                self.advance();
            } else if ch == '.' && !has_dot && !has_exp {
                if self.peek_nth(1).is_some_and(|c| c.is_alphabetic() || c == '_') {
                    return Err(self.error("invalid decimal literal", self.pos));
                }
                has_dot = true;
                self.advance();
            } else if (ch == 'e' || ch == 'E')
                && !has_exp
                && (self.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
                    || (matches!(self.peek_nth(1), Some('+' | '-'))
                        && self.peek_nth(2).is_some_and(|c| c.is_ascii_digit())))
            {
                has_exp = true;
                self.advance();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }

        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '_') {
            return Err(self.error("invalid decimal literal", self.pos));
        }

        let text: String = self.input[start..self.pos]
            .chars()
            .filter(|&c| c != '_')
            .collect();
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number: {text}"), start))?;
        self.push(TokenKind::Number(value), start);
        Ok(())
    }

    fn string(&mut self, quote: char) -> Result<(), ParseError> {
        let start = self.pos;
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => break,
                },
                Some('\n') | None => {
                    return Err(self.error("unterminated string literal", start));
                }
                Some(c) => value.push(c),
            }
        }
        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    fn ident(&mut self) {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let word = self.input[start..self.pos].to_string();
        self.push(TokenKind::Ident(word), start);
    }

    fn operator(&mut self, ch: char) -> Result<(), ParseError> {
        let start = self.pos;
        let next = self.peek_nth(1);
        let (kind, width) = match (ch, next) {
            ('*', Some('*')) => (TokenKind::StarStar, 2),
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('!', Some('=')) => (TokenKind::Ne, 2),
            ('<', Some('=')) => (TokenKind::Le, 2),
            ('>', Some('=')) => (TokenKind::Ge, 2),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('*', _) => (TokenKind::Star, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('%', _) => (TokenKind::Percent, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            (',', _) => (TokenKind::Comma, 1),
            ('.', _) => (TokenKind::Dot, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('=', _) => (TokenKind::Assign, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            ('&', _) => (TokenKind::Amp, 1),
            ('|', _) => (TokenKind::Pipe, 1),
            ('~', _) => (TokenKind::Tilde, 1),
            _ => return Err(self.error(format!("invalid character '{ch}'"), start)),
        };

        match kind {
            TokenKind::LParen => self.brackets.push(('(', start, self.line)),
            TokenKind::LBracket => self.brackets.push(('[', start, self.line)),
            TokenKind::RParen | TokenKind::RBracket => {
                let expected = if kind == TokenKind::RParen { '(' } else { '[' };
                match self.brackets.pop() {
                    Some((open, _, _)) if open == expected => {}
                    _ => return Err(self.error(format!("unmatched '{ch}'"), start)),
                }
            }
            _ => {}
        }

        for _ in 0..width {
            self.advance();
        }
        self.push(kind, start);
        Ok(())
    }
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(input).run()
}
