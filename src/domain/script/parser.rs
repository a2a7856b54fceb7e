//! Recursive descent parser for signal script.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparison (no chaining),
//! `|`, `&`, `+ -`, `* / %`, unary `- + ~`, `**`, then postfix attribute
//! access, calls, and subscripts.

use crate::domain::error::ParseError;
use crate::domain::script::ast::{BinOp, CmpOp, Expr, LogicOp, Program, Stmt, Target, UnaryOp};
use crate::domain::script::lexer::{tokenize, Token, TokenKind};

/// Reserved words that have no meaning in signal script.
const FORBIDDEN_KEYWORDS: [&str; 24] = [
    "for", "while", "def", "lambda", "class", "import", "from", "with", "try", "except",
    "finally", "return", "yield", "global", "nonlocal", "del", "if", "elif", "else", "raise",
    "assert", "async", "await", "pass",
];

/// Bracket and unary nesting allowed within one statement.
const MAX_NESTING: usize = 64;

/// Binary operators plus postfix accesses allowed within one statement.
const MAX_CHAIN: usize = 200;

fn keyword_message(word: &str) -> String {
    match word {
        "for" | "while" => format!("'{word}' loops are not allowed, use vectorized table operations"),
        "def" | "lambda" | "class" => format!("'{word}' definitions are not allowed"),
        "import" | "from" => format!("'{word}' is not allowed, use the provided bindings"),
        _ => format!("'{word}' is not supported in signal script"),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    chain: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            chain: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_next_kind(&self) -> &TokenKind {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: token.position,
            line: token.line,
        }
    }

    fn unexpected(&self) -> ParseError {
        let token = self.peek();
        if let TokenKind::Ident(word) = &token.kind {
            if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
                return self.error_at(token, keyword_message(word));
            }
        }
        self.error_at(
            token,
            format!("invalid syntax: unexpected {}", token.kind.describe()),
        )
    }

    /// Run `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_at(
                self.peek(),
                format!("too many nested parentheses or operators (limit {MAX_NESTING})"),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Count one more link in an operator or postfix chain.
    fn extend_chain(&mut self) -> Result<(), ParseError> {
        self.chain += 1;
        if self.chain > MAX_CHAIN {
            return Err(self.error_at(
                self.peek(),
                "expression is too long, split it across several assignments",
            ));
        }
        Ok(())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseError> {
        if self.consume(&kind) {
            Ok(())
        } else {
            let found = self.peek();
            Err(self.error_at(
                found,
                format!(
                    "expected {}, found {}",
                    kind.describe(),
                    found.kind.describe()
                ),
            ))
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Ident(w) if w == keyword)
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        loop {
            while self.consume(&TokenKind::Newline) {}
            if self.check(&TokenKind::Eof) {
                break;
            }
            statements.push(self.parse_statement()?);
            if !self.consume(&TokenKind::Newline) {
                return Err(self.unexpected());
            }
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek().clone();
        self.chain = 0;
        let expr = self.parse_expr()?;
        if self.check(&TokenKind::Assign) {
            let assign = self.advance();
            let target = to_target(expr).ok_or_else(|| {
                self.error_at(&assign, "cannot assign to expression")
            })?;
            let value = self.parse_expr()?;
            if self.check(&TokenKind::Assign) {
                return Err(self.error_at(self.peek(), "chained assignment is not supported"));
            }
            return Ok(Stmt::Assign {
                target,
                value,
                line: start.line,
            });
        }
        Ok(Stmt::Expr {
            expr,
            line: start.line,
        })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_or)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.consume_keyword("or") {
            self.extend_chain()?;
            let right = self.parse_and()?;
            left = Expr::Logic {
                op: LogicOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.consume_keyword("and") {
            self.extend_chain()?;
            let right = self.parse_not()?;
            left = Expr::Logic {
                op: LogicOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.consume_keyword("not") {
            let operand = self.nested(Self::parse_not)?;
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<CmpOp> {
        match self.peek_kind() {
            TokenKind::Eq => Some(CmpOp::Eq),
            TokenKind::Ne => Some(CmpOp::Ne),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Le => Some(CmpOp::Le),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Ge => Some(CmpOp::Ge),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_bitor()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_bitor()?;
        if self.comparison_op().is_some() {
            return Err(self.error_at(
                self.peek(),
                "chained comparisons are not supported, wrap each comparison in parentheses",
            ));
        }
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_bitor(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_bitand()?;
        while self.consume(&TokenKind::Pipe) {
            self.extend_chain()?;
            let right = self.parse_bitand()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_arith()?;
        while self.consume(&TokenKind::Amp) {
            self.extend_chain()?;
            let right = self.parse_arith()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            self.extend_chain()?;
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            self.extend_chain()?;
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Tilde => UnaryOp::Invert,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.nested(Self::parse_factor)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.consume(&TokenKind::StarStar) {
            let exponent = self.nested(Self::parse_factor)?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;
        loop {
            if matches!(
                self.peek_kind(),
                TokenKind::Dot | TokenKind::LParen | TokenKind::LBracket
            ) {
                self.extend_chain()?;
            }
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let token = self.advance();
                    let attr = match &token.kind {
                        TokenKind::Ident(attr) => attr.clone(),
                        other => {
                            return Err(self.error_at(
                                &token,
                                format!("expected attribute name, found {}", other.describe()),
                            ));
                        }
                    };
                    expr = Expr::Attribute {
                        value: Box::new(expr),
                        attr,
                    };
                }
                TokenKind::LParen => {
                    self.advance();
                    let (args, kwargs) = self.parse_arguments()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        kwargs,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_subscript()?;
                    expr = Expr::Subscript {
                        value: Box::new(expr),
                        index,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), ParseError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        loop {
            if self.consume(&TokenKind::RParen) {
                break;
            }
            let keyword = self.peek_next_kind() == &TokenKind::Assign;
            if let (TokenKind::Ident(name), true) = (self.peek_kind().clone(), keyword) {
                let token = self.advance();
                self.advance();
                if kwargs.iter().any(|(k, _)| *k == name) {
                    return Err(self.error_at(&token, format!("keyword argument repeated: {name}")));
                }
                kwargs.push((name, self.parse_expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error_at(
                        self.peek(),
                        "positional argument follows keyword argument",
                    ));
                }
                args.push(self.parse_expr()?);
            }
            if !self.consume(&TokenKind::Comma) {
                self.expect(TokenKind::RParen)?;
                break;
            }
        }
        Ok((args, kwargs))
    }

    fn parse_subscript(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        loop {
            items.push(self.parse_subscript_item()?);
            if !self.consume(&TokenKind::Comma) {
                break;
            }
            if self.check(&TokenKind::RBracket) {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(items)
    }

    fn parse_subscript_item(&mut self) -> Result<Expr, ParseError> {
        let start = if matches!(self.peek_kind(), TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        if !self.consume(&TokenKind::Colon) {
            return start.ok_or_else(|| self.unexpected());
        }
        let stop = if matches!(self.peek_kind(), TokenKind::Comma | TokenKind::RBracket) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        Ok(Expr::Slice {
            start: start.map(Box::new),
            stop,
        })
    }

    fn parse_sequence(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        loop {
            if self.consume(&close) {
                break;
            }
            items.push(self.parse_expr()?);
            if !self.consume(&TokenKind::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(*n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s.clone()))
            }
            TokenKind::Ident(word) => {
                if FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
                    return Err(self.error_at(&token, keyword_message(word)));
                }
                if matches!(word.as_str(), "and" | "or" | "not" | "in" | "is") {
                    return Err(self.unexpected());
                }
                self.advance();
                Ok(match word.as_str() {
                    "True" => Expr::Bool(true),
                    "False" => Expr::Bool(false),
                    "None" => Expr::None,
                    _ => Expr::Name(word.clone()),
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.consume(&TokenKind::RParen) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.consume(&TokenKind::RParen) {
                    return Ok(first);
                }
                self.expect(TokenKind::Comma)?;
                let mut items = vec![first];
                items.extend(self.parse_sequence(TokenKind::RParen)?);
                Ok(Expr::List(items))
            }
            TokenKind::LBracket => {
                self.advance();
                Ok(Expr::List(self.parse_sequence(TokenKind::RBracket)?))
            }
            _ => Err(self.unexpected()),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn to_target(expr: Expr) -> Option<Target> {
    match expr {
        Expr::Name(name) => Some(Target::Name(name)),
        Expr::Subscript { value, index } => match *value {
            Expr::Attribute { value: inner, attr } => {
                let Expr::Name(name) = *inner else {
                    return None;
                };
                match attr.as_str() {
                    "iloc" => Some(Target::Iloc { name, index }),
                    "loc" => Some(Target::Loc { name, index }),
                    _ => None,
                }
            }
            Expr::Name(name) if index.len() == 1 => {
                let key = index.into_iter().next()?;
                Some(Target::Item { name, key })
            }
            _ => None,
        },
        _ => None,
    }
}

pub fn parse(input: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}
