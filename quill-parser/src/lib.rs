// quill-parser - Lexer, AST and parser for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Front-end for Quill: tokens, source positions, the AST, and the
//! recursive-descent parser.
//!
//! The compiler in `quill-vm` consumes the [`ast`] types; everything
//! else here exists to produce them from source text.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod token;

pub use ast::{AssignOp, Block, Expr, File, Ident, Stmt, UnaryOp};
pub use error::ParseError;
pub use lexer::{Lexer, SpannedToken};
pub use parser::Parser;
pub use source::{Location, Pos, SourceFile};
pub use token::{BinOp, Token};
