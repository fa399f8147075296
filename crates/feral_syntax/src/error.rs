//! Lex- and parse-time errors.
//!
//! Both kinds carry a [`Location`] so `feral_cli` can render the `spec.md`
//! §7 caret-pointer diagnostic without re-deriving where the problem was.

use feral_base::Location;
use std::fmt;

#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub message: String,
    pub loc: Location,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, loc: Location) -> Self {
        Self { message: message.into(), loc }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyntaxError {}

pub type Result<T> = std::result::Result<T, SyntaxError>;
