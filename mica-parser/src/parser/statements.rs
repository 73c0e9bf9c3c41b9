// Statement parsing inside function bodies

use super::Parser;
use crate::ParseError;
use mica_ast::{
    Assignment, Block, ClosureDecl, Expr, If, Return, Stmt, Symbol, Variable, While,
};
use mica_lexer::Token;

impl<'src> Parser<'src> {
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        match self.peek() {
            Some(Token::LBrace) => {
                self.advance();
                Ok(Stmt::Block(self.parse_block()?))
            }
            Some(Token::If) => self.parse_if(),
            Some(Token::While) => self.parse_while(),
            Some(Token::Return) => self.parse_return(),
            Some(Token::Fn) => {
                // an inner function declares a closure over the enclosing
                // frame; captures are resolved later
                let function = self.parse_function()?;
                if function.body.is_none() {
                    return Err(
                        self.error("Native functions are only allowed at the top level.")
                    );
                }
                Ok(Stmt::Closure(ClosureDecl {
                    function,
                    upvalues: Vec::new(),
                }))
            }
            Some(Token::Int)
            | Some(Token::Float)
            | Some(Token::Bool)
            | Some(Token::String)
            | Some(Token::Any)
            | Some(Token::LBracket) => self.parse_variable_decl(),
            Some(Token::Ident(_)) if matches!(self.peek_next(), Some(Token::Ident(_))) => {
                self.parse_variable_decl()
            }
            _ => self.parse_assignment_or_call(),
        }
    }

    /// `{` has already been consumed.
    pub(crate) fn parse_block(&mut self) -> Result<Block, ParseError> {
        let mut statements = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let before = self.current;
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(_) => {
                    self.synchronize();
                    if self.current == before {
                        self.advance();
                    }
                }
            }
        }
        self.consume(&Token::RBrace, "Expected '}' after block.")?;
        Ok(Block::new(statements))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // consume 'if'
        self.consume(&Token::LParen, "Expected '(' after 'if'.")?;
        let condition = self.parse_expression()?;
        self.consume(&Token::RParen, "Expected ')' after condition.")?;

        let then = Box::new(self.parse_branch_body()?);
        let otherwise = if self.match_token(&Token::Else) {
            Some(Box::new(self.parse_branch_body()?))
        } else {
            None
        };

        Ok(Stmt::If(If {
            condition,
            then,
            otherwise,
        }))
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.advance(); // consume 'while'
        self.consume(&Token::LParen, "Expected '(' after 'while'.")?;
        let condition = self.parse_expression()?;
        self.consume(&Token::RParen, "Expected ')' after condition.")?;
        let body = Box::new(self.parse_branch_body()?);
        Ok(Stmt::While(While { condition, body }))
    }

    // if/while bodies always get their own block scope, so a single
    // statement body is wrapped; declarations it makes stay balanced
    fn parse_branch_body(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.parse_statement()?;
        match stmt {
            Stmt::Block(_) => Ok(stmt),
            other => Ok(Stmt::Block(Block::new(vec![other]))),
        }
    }

    fn parse_return(&mut self) -> Result<Stmt, ParseError> {
        let span = self.peek_span();
        self.advance(); // consume 'return'
        let value = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::Semicolon, "Expected ';' after return.")?;
        Ok(Stmt::Return(Return { value, span }))
    }

    /// `Type name;` or `Type name := expr;`
    pub(crate) fn parse_variable_decl(&mut self) -> Result<Stmt, ParseError> {
        let ty = self.parse_type()?;
        let (name, span) = self.consume_identifier("Expected a variable name.")?;

        let value = if self.match_token(&Token::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(&Token::Semicolon, "Expected ';' after declaration.")?;

        let mut symbol = Symbol::new(name, span, ty);
        symbol.assignable = true;
        Ok(Stmt::Variable(Variable { symbol, value }))
    }

    // `expr := expr ;` is an assignment (or an implicit declaration, the
    // validator decides); a bare expression statement must be a call.
    fn parse_assignment_or_call(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expression()?;

        if self.match_token(&Token::Assign) {
            match expr {
                Expr::Primary(_) | Expr::Subscript(_) | Expr::Access(_) => {}
                _ => return Err(self.error("Expression cannot be assigned to.")),
            }
            let value = self.parse_expression()?;
            self.consume(&Token::Semicolon, "Expected ';' after assignment.")?;
            return Ok(Stmt::Assignment(Assignment {
                target: expr,
                value,
            }));
        }

        self.consume(&Token::Semicolon, "Expected ';' after expression.")?;
        match expr {
            Expr::Call(_) => Ok(Stmt::Expression(expr)),
            _ => Err(self.error("Only call expressions can stand alone as statements.")),
        }
    }
}
