// quill-core - Runtime error types for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Runtime errors.
//!
//! Every failure the VM or a built-in can produce is a variant here.
//! Mathematically undefined numeric operations (division by zero) are
//! deliberately *not* errors; they yield infinity per the value
//! model's rules.

use std::fmt;

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors raised during VM execution or by built-in functions.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// Wrong number of arguments in a call.
    WrongNumArguments,
    /// An argument had an unexpected type.
    InvalidArgumentType {
        name: &'static str,
        expected: &'static str,
        found: String,
    },
    /// The operator is not defined for the operand types.
    InvalidOperator,
    /// The value cannot be indexed.
    NotIndexable,
    /// The value cannot be index-assigned.
    NotIndexAssignable,
    /// The value cannot be called.
    NotCallable(String),
    /// The value cannot be iterated.
    NotIterable(String),
    /// The index has the wrong type for this collection.
    InvalidIndexType,
    /// Error values are only indexable at `value`.
    InvalidIndexOnError,
    /// The assigned value has the wrong type for this collection.
    InvalidIndexValueType,
    /// Index-assignment outside the collection bounds.
    IndexOutOfBounds,
    /// A bytes element was assigned a value outside 0..=255.
    ByteOutOfRange,
    /// A string operation would exceed `MAX_STRING_LEN`.
    StringLimit,
    /// A bytes operation would exceed `MAX_BYTES_LEN`.
    BytesLimit,
    /// `range` was given a non-positive step.
    InvalidRangeStep,
    /// Multi-assignment arity or type mismatch.
    DestructureMismatch { expected: usize, found: usize },
    /// The value stack ran out of slots.
    StackOverflow,
    /// The frame stack ran out of slots.
    FrameOverflow,
    /// A global slot was read before being defined.
    UndefinedGlobal(String),
    /// Decoding a unit referenced a module the map does not provide.
    MissingModule(String),
    /// The VM's abort signal was raised.
    Aborted,
    /// Anything else (formatting failures, host errors).
    Custom(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::WrongNumArguments => write!(f, "wrong number of arguments"),
            RuntimeError::InvalidArgumentType {
                name,
                expected,
                found,
            } => write!(
                f,
                "invalid type for argument '{}': expected {}, found {}",
                name, expected, found
            ),
            RuntimeError::InvalidOperator => write!(f, "invalid operator"),
            RuntimeError::NotIndexable => write!(f, "not indexable"),
            RuntimeError::NotIndexAssignable => write!(f, "not index-assignable"),
            RuntimeError::NotCallable(t) => write!(f, "not callable: {}", t),
            RuntimeError::NotIterable(t) => write!(f, "not iterable: {}", t),
            RuntimeError::InvalidIndexType => write!(f, "invalid index type"),
            RuntimeError::InvalidIndexOnError => write!(f, "invalid index on error"),
            RuntimeError::InvalidIndexValueType => write!(f, "invalid index value type"),
            RuntimeError::IndexOutOfBounds => write!(f, "index out of bounds"),
            RuntimeError::ByteOutOfRange => write!(f, "byte value out of range"),
            RuntimeError::StringLimit => {
                write!(f, "exceeding string size limit")
            }
            RuntimeError::BytesLimit => {
                write!(f, "exceeding bytes size limit")
            }
            RuntimeError::InvalidRangeStep => {
                write!(f, "range step must be greater than zero")
            }
            RuntimeError::DestructureMismatch { expected, found } => write!(
                f,
                "cannot destructure: expected {} values, found {}",
                expected, found
            ),
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::FrameOverflow => write!(f, "frame overflow"),
            RuntimeError::UndefinedGlobal(name) => {
                write!(f, "undefined global: {}", name)
            }
            RuntimeError::MissingModule(name) => {
                write!(f, "module '{}' is missing", name)
            }
            RuntimeError::Aborted => write!(f, "VM aborted"),
            RuntimeError::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl RuntimeError {
    /// Create an invalid-argument-type error.
    pub fn invalid_argument(
        name: &'static str,
        expected: &'static str,
        found: impl Into<String>,
    ) -> RuntimeError {
        RuntimeError::InvalidArgumentType {
            name,
            expected,
            found: found.into(),
        }
    }

    /// Create a custom error from a message.
    pub fn custom(message: impl Into<String>) -> RuntimeError {
        RuntimeError::Custom(message.into())
    }
}
