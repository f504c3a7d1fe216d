// quill-parser - Parse errors for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Parse error type.

use std::fmt;

use crate::source::{Pos, SourceFile};

/// An error produced by the lexer or parser, with a source position.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
}

impl ParseError {
    pub fn new(message: impl Into<String>, pos: Pos) -> ParseError {
        ParseError {
            message: message.into(),
            pos,
        }
    }

    /// Render the error with the position resolved through `file`.
    pub fn display_in(&self, file: &SourceFile) -> String {
        format!("{}: parse error: {}", file.display(self.pos), self.message)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Result type for parsing.
pub type Result<T> = std::result::Result<T, ParseError>;
