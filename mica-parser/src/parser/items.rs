// Top-level declarations: functions, native functions, structs, unions

use super::Parser;
use crate::ParseError;
use mica_ast::{
    FunctionDecl, Stmt, StructDecl, StructMember, Symbol, UnionDecl, Variable,
};
use mica_lexer::Token;

impl<'src> Parser<'src> {
    pub(crate) fn parse_function_decl(&mut self) -> Result<Stmt, ParseError> {
        let function = self.parse_function()?;
        if function.body.is_some() {
            Ok(Stmt::Function(function))
        } else {
            Ok(Stmt::NativeFunction(function))
        }
    }

    /// `fn name(T a, U b) -> R { ... }` — a trailing `;` instead of a body
    /// declares a native function.
    pub(crate) fn parse_function(&mut self) -> Result<FunctionDecl, ParseError> {
        self.consume(&Token::Fn, "Expected 'fn'.")?;
        let (name, name_span) = self.consume_identifier("Expected a function name.")?;

        self.consume(&Token::LParen, "Expected '(' after function name.")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                if params.len() == 255 {
                    return Err(self.error_arg_limit("parameters"));
                }
                let ty = self.parse_type()?;
                let (param_name, param_span) =
                    self.consume_identifier("Expected a parameter name.")?;
                let mut symbol = Symbol::new(param_name, param_span, ty);
                symbol.assignable = true;
                params.push(Variable {
                    symbol,
                    value: None,
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.consume(&Token::RParen, "Expected ')' after parameters.")?;

        let return_ty = if self.match_token(&Token::Arrow) {
            self.parse_type()?
        } else {
            self.types.void_id()
        };

        let param_tys: Vec<_> = params.iter().map(|p| p.symbol.ty).collect();
        let fn_ty = self.types.register_function(return_ty, param_tys);
        let symbol = Symbol::new(name, name_span, fn_ty);

        let body = if self.match_token(&Token::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.consume(
                &Token::Semicolon,
                "Expected a function body or ';' after the signature.",
            )?;
            None
        };

        Ok(FunctionDecl {
            symbol,
            params,
            body,
            return_ty,
        })
    }

    /// `struct Name { T member; ... }`
    pub(crate) fn parse_struct_decl(&mut self) -> Result<Stmt, ParseError> {
        self.consume(&Token::Struct, "Expected 'struct'.")?;
        let (name, name_span) = self.consume_identifier("Expected a struct name.")?;
        self.consume(&Token::LBrace, "Expected '{' after struct name.")?;

        let mut members = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let ty = self.parse_type()?;
            let (member_name, member_span) =
                self.consume_identifier("Expected a member name.")?;
            self.consume(&Token::Semicolon, "Expected ';' after struct member.")?;
            let mut symbol = Symbol::new(member_name, member_span, ty);
            symbol.assignable = true;
            members.push(Variable {
                symbol,
                value: None,
            });
        }
        self.consume(&Token::RBrace, "Expected '}' after struct members.")?;

        let member_tys: Vec<StructMember> = members
            .iter()
            .map(|m| StructMember {
                name: m.symbol.name.clone(),
                ty: m.symbol.ty,
            })
            .collect();
        let ty = self.types.register_struct(name.clone(), member_tys);

        Ok(Stmt::Struct(StructDecl {
            symbol: Symbol::new(name, name_span, ty),
            members,
        }))
    }

    /// `type Name := A | B | C;`
    pub(crate) fn parse_union_decl(&mut self) -> Result<Stmt, ParseError> {
        self.consume(&Token::Type, "Expected 'type'.")?;
        let (name, name_span) = self.consume_identifier("Expected a union name.")?;
        self.consume(&Token::Assign, "Expected ':=' after union name.")?;

        let mut variants = vec![self.parse_type()?];
        while self.match_token(&Token::Pipe) {
            variants.push(self.parse_type()?);
        }
        self.consume(&Token::Semicolon, "Expected ';' after union declaration.")?;

        let ty = self.types.register_union(name.clone(), variants);
        Ok(Stmt::Union(UnionDecl {
            symbol: Symbol::new(name, name_span, ty),
        }))
    }
}
