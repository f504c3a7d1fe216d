// quill-parser - Source positions for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Source positions and the per-file line index used to resolve them.

use std::fmt;

/// A position in a source file, as a byte offset from the start.
///
/// `Pos::NONE` marks the absence of position information (e.g. for
/// synthesized instructions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(pub u32);

impl Pos {
    /// The missing position.
    pub const NONE: Pos = Pos(u32::MAX);

    /// True unless this is `Pos::NONE`.
    pub fn is_valid(self) -> bool {
        self != Pos::NONE
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "@{}", self.0)
        } else {
            write!(f, "@-")
        }
    }
}

/// A resolved source location for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// 1-indexed line.
    pub line: u32,
    /// 1-indexed column (in bytes).
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A source file: name plus a line index for resolving positions.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// File name for error display.
    pub name: String,
    /// Byte offsets of the start of each line. `line_starts[0] == 0`.
    line_starts: Vec<u32>,
    len: u32,
}

impl SourceFile {
    /// Build a source file record from its text.
    pub fn new(name: impl Into<String>, input: &str) -> SourceFile {
        let mut line_starts = vec![0u32];
        for (i, b) in input.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        SourceFile {
            name: name.into(),
            line_starts,
            len: input.len() as u32,
        }
    }

    /// Resolve a byte offset to a line:column location. Offsets past
    /// the end of the file clamp to the last line.
    pub fn resolve(&self, pos: Pos) -> Option<Location> {
        if !pos.is_valid() {
            return None;
        }
        let offset = pos.0.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Some(Location {
            line: line as u32 + 1,
            column: offset - self.line_starts[line] + 1,
        })
    }

    /// Format a position as `name:line:column` (or just `name` when
    /// the position is missing).
    pub fn display(&self, pos: Pos) -> String {
        match self.resolve(pos) {
            Some(loc) => format!("{}:{}", self.name, loc),
            None => self.name.clone(),
        }
    }
}
