// Parser for the Mica language
// Recursive descent for statements, Pratt precedence climbing for
// expressions. The parser is panic-recovering: the first error in a
// statement is reported, further messages are suppressed until the parser
// resynchronizes at a statement boundary, and `had_error` stays sticky.

use crate::ParseError;
use mica_ast::{Ast, Block, Stmt, TypeRegistry};
use mica_diagnostics::{Category, Diagnostic, Location};
use mica_lexer::{Lexer, Token, TokenSpan};

mod expressions;
mod items;
mod statements;
mod types;

pub struct Parser<'src> {
    pub(crate) tokens: Vec<TokenSpan>,
    pub(crate) current: usize,
    pub(crate) source: &'src str,
    pub(crate) types: TypeRegistry,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) had_error: bool,
    pub(crate) panic: bool,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut tokens = Vec::new();
        let mut diagnostics = Vec::new();
        let mut had_error = false;

        // Scan everything up front. The scanner itself never fails:
        // unrecognisable input is surfaced here, once per bad token, and
        // comments are discarded.
        for item in Lexer::new(source) {
            match item {
                Ok(ts) if ts.token == Token::Comment => {}
                Ok(ts) => tokens.push(ts),
                Err(err) => {
                    had_error = true;
                    diagnostics.push(Diagnostic::error(
                        Category::Parse,
                        "Invalid token.",
                        err.span(),
                    ));
                }
            }
        }

        Self {
            tokens,
            current: 0,
            source,
            types: TypeRegistry::new(),
            diagnostics,
            had_error,
            panic: false,
        }
    }

    /// Parse a whole source file. The top level admits only function,
    /// native function, struct, and union declarations.
    pub fn parse(mut self) -> Result<Ast, Vec<Diagnostic>> {
        let mut statements = Vec::new();

        while !self.is_at_end() {
            let before = self.current;
            match self.parse_global() {
                Ok(stmt) => statements.push(stmt),
                Err(_) => {
                    self.synchronize();
                    // resynchronization must make progress
                    if self.current == before {
                        self.advance();
                    }
                }
            }
        }

        if self.had_error {
            return Err(self.diagnostics);
        }
        Ok(Ast {
            root: Block::new(statements),
            types: self.types,
        })
    }

    fn parse_global(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::Fn) => self.parse_function_decl(),
            Some(Token::Struct) => self.parse_struct_decl(),
            Some(Token::Type) => self.parse_union_decl(),
            _ => Err(self.error(
                "Expected a top-level declaration (fn, struct, or type).",
            )),
        }
    }

    // ==================== Helper Methods ====================

    pub(crate) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|ts| &ts.token)
    }

    pub(crate) fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.current + 1).map(|ts| &ts.token)
    }

    pub(crate) fn peek_span(&self) -> std::ops::Range<usize> {
        match self.tokens.get(self.current) {
            Some(ts) => ts.span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    pub(crate) fn previous_span(&self) -> std::ops::Range<usize> {
        match self.tokens.get(self.current.saturating_sub(1)) {
            Some(ts) => ts.span.clone(),
            None => 0..0,
        }
    }

    pub(crate) fn check(&self, kind: &Token) -> bool {
        match self.peek() {
            Some(token) => std::mem::discriminant(token) == std::mem::discriminant(kind),
            None => false,
        }
    }

    pub(crate) fn advance(&mut self) -> Option<TokenSpan> {
        let ts = self.tokens.get(self.current).cloned();
        if ts.is_some() {
            self.current += 1;
        }
        ts
    }

    pub(crate) fn match_token(&mut self, kind: &Token) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn consume(&mut self, kind: &Token, message: &str) -> Result<TokenSpan, ParseError> {
        if self.check(kind) {
            // the check guarantees a token is present
            self.advance().ok_or_else(|| self.error(message))
        } else {
            Err(self.error(message))
        }
    }

    pub(crate) fn consume_identifier(&mut self, message: &str) -> Result<(String, std::ops::Range<usize>), ParseError> {
        if let Some(Token::Ident(_)) = self.peek() {
            if let Some(TokenSpan {
                token: Token::Ident(name),
                span,
            }) = self.advance()
            {
                return Ok((name, span));
            }
        }
        Err(self.error(message))
    }

    /// Record one diagnostic unless already panicking; `had_error` is
    /// sticky either way.
    pub(crate) fn error(&mut self, message: &str) -> ParseError {
        self.had_error = true;
        if !self.panic {
            self.panic = true;
            self.diagnostics.push(Diagnostic::error(
                Category::Parse,
                message,
                self.peek_span(),
            ));
        }
        ParseError::SyntaxError {
            location: self.location(),
            message: message.to_string(),
        }
    }

    pub(crate) fn error_arg_limit(&mut self, what: &'static str) -> ParseError {
        self.had_error = true;
        if !self.panic {
            self.panic = true;
            self.diagnostics.push(Diagnostic::error(
                Category::Parse,
                format!("More than 255 {what}."),
                self.peek_span(),
            ));
        }
        ParseError::ArgLimitExceeded {
            location: self.location(),
            what,
        }
    }

    fn location(&self) -> String {
        let span = self.peek_span();
        if span.start >= self.source.len() {
            "end of file".to_string()
        } else {
            Location::of(self.source, span.start).to_string()
        }
    }

    /// Drop tokens until something that can start a statement (or a brace)
    /// comes up, then leave panic mode.
    pub(crate) fn synchronize(&mut self) {
        if !self.panic {
            return;
        }
        self.panic = false;

        while let Some(token) = self.peek() {
            match token {
                Token::Int
                | Token::Float
                | Token::Bool
                | Token::String
                | Token::Any
                | Token::Fn
                | Token::If
                | Token::While
                | Token::Return
                | Token::Struct
                | Token::Type
                | Token::LBrace
                | Token::RBrace => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}
