// quill-embed - Error type for the Quill embedding API
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! One error type across the parse → compile → run pipeline.

use std::fmt;

use quill_parser::{ParseError, SourceFile};
use quill_vm::{CompileError, VmError};

/// An error from any stage of running a script.
#[derive(Debug, Clone)]
pub enum ScriptError {
    Parse(ParseError),
    Compile(CompileError),
    Runtime(VmError),
}

impl ScriptError {
    /// Render with positions resolved through `file`.
    pub fn display_in(&self, file: &SourceFile) -> String {
        match self {
            ScriptError::Parse(e) => e.display_in(file),
            ScriptError::Compile(e) => e.display_in(file),
            ScriptError::Runtime(e) => e.display_in(file),
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Parse(e) => write!(f, "{}", e),
            ScriptError::Compile(e) => write!(f, "{}", e),
            ScriptError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<ParseError> for ScriptError {
    fn from(e: ParseError) -> ScriptError {
        ScriptError::Parse(e)
    }
}

impl From<CompileError> for ScriptError {
    fn from(e: CompileError) -> ScriptError {
        ScriptError::Compile(e)
    }
}

impl From<VmError> for ScriptError {
    fn from(e: VmError) -> ScriptError {
        ScriptError::Runtime(e)
    }
}
