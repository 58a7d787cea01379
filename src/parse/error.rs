use std::fmt;

use crate::types::Position;

/// A syntax error found while parsing Data App source.
///
/// Parsing never stops at the first error; a [`ParsingResult`](super::ParsingResult)
/// carries every error in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    message: String,
    file: String,
    position: Position,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, file: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            position,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.position, self.message)
    }
}

impl std::error::Error for SyntaxError {}
