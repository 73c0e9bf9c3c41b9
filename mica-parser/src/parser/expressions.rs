// Expression parsing: Pratt precedence climbing
//
// Ladder, lowest to highest: Logic, Equality, Comparison, Term, Factor,
// Unary, Call. Call, subscript, and member access all bind at Call
// precedence and are left-associative.

use super::Parser;
use crate::ParseError;
use mica_ast::{
    Access, ArrayLiteral, BinOp, Binary, Call, Expr, Literal, LiteralValue, MapEntry, MapLiteral,
    Primary, Subscript, Symbol, TypeId, UnOp, Unary,
};
use mica_lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Precedence {
    None,
    Logic,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
}

impl Precedence {
    fn one_higher(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Logic,
            Precedence::Logic => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call => Precedence::Call,
        }
    }
}

fn infix_precedence(token: &Token) -> Precedence {
    match token {
        Token::AndAnd | Token::OrOr => Precedence::Logic,
        Token::Eq | Token::EqEq | Token::NotEq => Precedence::Equality,
        Token::Lt | Token::LtEq | Token::Gt | Token::GtEq => Precedence::Comparison,
        Token::Plus | Token::Minus => Precedence::Term,
        Token::Star | Token::Slash | Token::SlashSlash | Token::Percent => Precedence::Factor,
        Token::LParen | Token::LBracket | Token::Dot => Precedence::Call,
        _ => Precedence::None,
    }
}

fn binary_op(token: &Token) -> Option<BinOp> {
    match token {
        Token::Plus => Some(BinOp::Add),
        Token::Minus => Some(BinOp::Sub),
        Token::Star => Some(BinOp::Mul),
        Token::Slash => Some(BinOp::Div),
        Token::SlashSlash => Some(BinOp::FloorDiv),
        Token::Percent => Some(BinOp::Rem),
        Token::Lt => Some(BinOp::Less),
        Token::LtEq => Some(BinOp::LessEq),
        Token::Gt => Some(BinOp::Greater),
        Token::GtEq => Some(BinOp::GreaterEq),
        Token::Eq | Token::EqEq => Some(BinOp::Equal),
        Token::NotEq => Some(BinOp::NotEqual),
        Token::AndAnd => Some(BinOp::And),
        Token::OrOr => Some(BinOp::Or),
        _ => None,
    }
}

impl<'src> Parser<'src> {
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_precedence(Precedence::Logic)
    }

    fn parse_precedence(&mut self, min: Precedence) -> Result<Expr, ParseError> {
        let mut expr = self.parse_prefix()?;

        while let Some(token) = self.peek() {
            let precedence = infix_precedence(token);
            if precedence < min {
                break;
            }
            expr = self.parse_infix(expr, precedence)?;
        }

        Ok(expr)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let span = self.peek_span();
        match self.peek() {
            Some(Token::IntLiteral(_)) => {
                if let Some(mica_lexer::TokenSpan {
                    token: Token::IntLiteral(value),
                    span,
                }) = self.advance()
                {
                    return Ok(Expr::Literal(Literal {
                        value: LiteralValue::Int(value),
                        span,
                    }));
                }
                Err(self.error("Expected an expression."))
            }
            Some(Token::FloatLiteral(_)) => {
                if let Some(mica_lexer::TokenSpan {
                    token: Token::FloatLiteral(value),
                    span,
                }) = self.advance()
                {
                    return Ok(Expr::Literal(Literal {
                        value: LiteralValue::Float(value),
                        span,
                    }));
                }
                Err(self.error("Expected an expression."))
            }
            Some(Token::StringLiteral(_)) => {
                if let Some(mica_lexer::TokenSpan {
                    token: Token::StringLiteral(value),
                    span,
                }) = self.advance()
                {
                    return Ok(Expr::Literal(Literal {
                        value: LiteralValue::Str(value),
                        span,
                    }));
                }
                Err(self.error("Expected an expression."))
            }
            Some(Token::True) => {
                self.advance();
                Ok(Expr::Literal(Literal {
                    value: LiteralValue::Bool(true),
                    span,
                }))
            }
            Some(Token::False) => {
                self.advance();
                Ok(Expr::Literal(Literal {
                    value: LiteralValue::Bool(false),
                    span,
                }))
            }
            Some(Token::Ident(_)) => {
                let (name, span) = self.consume_identifier("Expected an expression.")?;
                Ok(Expr::Primary(Primary {
                    symbol: Symbol::new(name, span, TypeId::INVALID),
                }))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(&Token::RParen, "Expected ')' after expression.")?;
                Ok(Expr::Grouping(Box::new(inner)))
            }
            Some(Token::LBracket) => self.parse_array_literal(span),
            Some(Token::Type) => self.parse_map_literal(span),
            Some(Token::Minus) => {
                self.advance();
                let right = self.parse_precedence(Precedence::Unary)?;
                Ok(Expr::Unary(Unary {
                    op: UnOp::Neg,
                    op_span: span,
                    right: Box::new(right),
                    ty: TypeId::INVALID,
                }))
            }
            Some(Token::Bang) => {
                self.advance();
                let right = self.parse_precedence(Precedence::Unary)?;
                Ok(Expr::Unary(Unary {
                    op: UnOp::Not,
                    op_span: span,
                    right: Box::new(right),
                    ty: TypeId::INVALID,
                }))
            }
            _ => Err(self.error("Expected an expression.")),
        }
    }

    fn parse_infix(&mut self, left: Expr, precedence: Precedence) -> Result<Expr, ParseError> {
        let Some(ts) = self.advance() else {
            return Err(self.error("Expected an operator."));
        };

        match &ts.token {
            Token::LParen => self.parse_call(left, ts.span),
            Token::LBracket => {
                let index = self.parse_expression()?;
                self.consume(&Token::RBracket, "Expected ']' after subscript.")?;
                Ok(Expr::Subscript(Subscript {
                    object: Box::new(left),
                    index: Box::new(index),
                    span: ts.span,
                }))
            }
            Token::Dot => {
                let (name, span) =
                    self.consume_identifier("Expected a member name after '.'.")?;
                Ok(Expr::Access(Access {
                    object: Box::new(left),
                    element: Box::new(Expr::Primary(Primary {
                        symbol: Symbol::new(name, span, TypeId::INVALID),
                    })),
                    span: ts.span,
                }))
            }
            token => match binary_op(token) {
                Some(op) => {
                    let right = self.parse_precedence(precedence.one_higher())?;
                    Ok(Expr::Binary(Binary {
                        op,
                        op_span: ts.span,
                        left: Box::new(left),
                        right: Box::new(right),
                        ty: TypeId::INVALID,
                        operand_ty: TypeId::INVALID,
                    }))
                }
                None => Err(self.error("Expected an operator.")),
            },
        }
    }

    fn parse_call(&mut self, callable: Expr, span: std::ops::Range<usize>) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                if args.len() == 255 {
                    return Err(self.error_arg_limit("arguments"));
                }
                args.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "Expected ')' after arguments.")?;
        Ok(Expr::Call(Call {
            callable: Box::new(callable),
            args,
            span,
        }))
    }

    fn parse_array_literal(&mut self, span: std::ops::Range<usize>) -> Result<Expr, ParseError> {
        self.advance(); // consume '['
        let mut elements = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                if elements.len() == 255 {
                    return Err(self.error_arg_limit("array elements"));
                }
                elements.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RBracket, "Expected ']' after array literal.")?;
        Ok(Expr::ArrayLiteral(ArrayLiteral { elements, span }))
    }

    // `type { key: value, ... }`
    fn parse_map_literal(&mut self, span: std::ops::Range<usize>) -> Result<Expr, ParseError> {
        self.advance(); // consume 'type'
        self.consume(&Token::LBrace, "Expected '{' after 'type'.")?;
        let mut entries = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                if entries.len() == 255 {
                    return Err(self.error_arg_limit("map entries"));
                }
                let key = self.parse_expression()?;
                self.consume(&Token::Colon, "Expected ':' after map key.")?;
                let value = self.parse_expression()?;
                entries.push(MapEntry { key, value });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RBrace, "Expected '}' after map literal.")?;
        Ok(Expr::MapLiteral(MapLiteral { entries, span }))
    }
}
