// Source type syntax
//
//   type := Int | Float | Bool | String | Any
//         | identifier          user struct/union, possibly forward
//         | [ type ]            array
//         | { type : type }     map
//
// Every type-bearing token resolves to a canonical registry handle here.

use super::Parser;
use crate::ParseError;
use mica_ast::TypeId;
use mica_lexer::Token;

impl<'src> Parser<'src> {
    pub(crate) fn parse_type(&mut self) -> Result<TypeId, ParseError> {
        match self.peek() {
            Some(Token::Int) => {
                self.advance();
                Ok(TypeId::INT)
            }
            Some(Token::Float) => {
                self.advance();
                Ok(TypeId::FLOAT)
            }
            Some(Token::Bool) => {
                self.advance();
                Ok(TypeId::BOOL)
            }
            Some(Token::String) => {
                self.advance();
                Ok(TypeId::STRING)
            }
            Some(Token::Any) => {
                self.advance();
                Ok(TypeId::ANY)
            }
            Some(Token::Ident(_)) => {
                let (name, _) = self.consume_identifier("Expected a type.")?;
                // a declared struct or union resolves directly; anything
                // else becomes a forward reference the validator resolves
                match self.types.lookup_user(&name) {
                    Some(id) => Ok(id),
                    None => Ok(self.types.register_user(name)),
                }
            }
            Some(Token::LBracket) => {
                self.advance();
                let element = self.parse_type()?;
                self.consume(&Token::RBracket, "Expected ']' after array element type.")?;
                Ok(self.types.register_array(element))
            }
            Some(Token::LBrace) => {
                self.advance();
                let key = self.parse_type()?;
                self.consume(&Token::Colon, "Expected ':' in map type.")?;
                let value = self.parse_type()?;
                self.consume(&Token::RBrace, "Expected '}' after map value type.")?;
                Ok(self.types.register_map(key, value))
            }
            _ => Err(self.error("Expected a type.")),
        }
    }
}
