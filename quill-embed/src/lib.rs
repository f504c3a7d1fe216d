// quill-embed - High-level embedding API for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Embed Quill in a Rust program.
//!
//! The [`Script`] type wraps the parse → compile → run pipeline:
//! declare variables, compile once, run (repeatedly if desired), and
//! read results back by name.
//!
//! # Thread safety
//!
//! A [`Compiled`] script is **not** thread-safe; values share state
//! through `Rc`. The only cross-thread channel is the abort handle.

pub mod convert;
pub mod error;
pub mod script;

pub use convert::{FromValue, IntoValue};
pub use error::ScriptError;
pub use script::{Compiled, Script};
