use thiserror::Error;

// Modular parser structure
mod parser;
pub use parser::Parser;

/// Failure taxonomy of the parser. Every error is also recorded as a
/// rendered diagnostic on the parser; the enum mostly serves control flow
/// (an `Err` aborts the statement and triggers resynchronization).
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error at {location}: {message}")]
    SyntaxError { location: String, message: String },
    #[error("Parse error at {location}: more than 255 {what}")]
    ArgLimitExceeded {
        location: String,
        what: &'static str,
    },
    #[error("Invalid token at {location}")]
    InvalidToken { location: String },
}
