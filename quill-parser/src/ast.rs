// quill-parser - AST definitions for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Abstract syntax tree consumed by the bytecode compiler.

use crate::source::Pos;
use crate::token::BinOp;

/// An identifier with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub pos: Pos,
}

impl Ident {
    pub fn new(name: impl Into<String>, pos: Pos) -> Ident {
        Ident {
            name: name.into(),
            pos,
        }
    }
}

/// A parsed source file: a flat list of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub stmts: Vec<Stmt>,
}

/// A `{ ... }` statement block.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub pos: Pos,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-x`
    Neg,
    /// `!x`
    Not,
    /// `^x` (bitwise complement)
    BitNot,
}

/// Assignment flavors: plain `=` or a compound operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    /// `op=` compound assignment.
    Compound(BinOp),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `a := expr` or `a, b := expr`.
    Define {
        names: Vec<Ident>,
        value: Expr,
        pos: Pos,
    },
    /// `target = expr`, `target op= expr`, or `a, b = expr`.
    /// Multi-target form is only valid with plain `=`.
    Assign {
        targets: Vec<Expr>,
        op: AssignOp,
        value: Expr,
        pos: Pos,
    },
    /// A bare expression evaluated for its side effects.
    Expr(Expr),
    /// A `{ ... }` block introducing a scope.
    Block(Block),
    /// `if [init;] cond { ... } [else ...]` — `alt` is either another
    /// `If` (for `else if`) or a `Block`.
    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        body: Block,
        alt: Option<Box<Stmt>>,
        pos: Pos,
    },
    /// `for [init]; [cond]; [post] { ... }`, `for cond { ... }` or
    /// the bare `for { ... }`.
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
        pos: Pos,
    },
    /// `for k, v in expr { ... }` (value name optional).
    ForIn {
        key: Ident,
        value: Option<Ident>,
        iterable: Expr,
        body: Block,
        pos: Pos,
    },
    Break(Pos),
    Continue(Pos),
    /// `return [expr]`.
    Return { value: Option<Expr>, pos: Pos },
    /// `export expr` — the module's result value.
    Export { value: Expr, pos: Pos },
}

impl Stmt {
    /// Source position of the statement.
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::Define { pos, .. }
            | Stmt::Assign { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::For { pos, .. }
            | Stmt::ForIn { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::Export { pos, .. } => *pos,
            Stmt::Expr(e) => e.pos(),
            Stmt::Block(b) => b.pos,
            Stmt::Break(pos) | Stmt::Continue(pos) => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit { value: i64, pos: Pos },
    FloatLit { value: f64, pos: Pos },
    CharLit { value: char, pos: Pos },
    StringLit { value: String, pos: Pos },
    BoolLit { value: bool, pos: Pos },
    NullLit { pos: Pos },
    Ident(Ident),
    ArrayLit { elements: Vec<Expr>, pos: Pos },
    /// Map literal; keys are identifiers or string literals in the
    /// source but always strings in the AST.
    MapLit { entries: Vec<(String, Expr)>, pos: Pos },
    FuncLit {
        params: Vec<Ident>,
        /// Whether the final parameter is `...rest`.
        variadic: bool,
        body: Block,
        pos: Pos,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        pos: Pos,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// `==` / `!=`.
    Equality {
        negated: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// Short-circuit `&&` / `||`.
    Logical {
        and: bool,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    /// `a[i]`.
    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    /// `a.name` — sugar for `a["name"]`.
    Selector {
        expr: Box<Expr>,
        name: String,
        pos: Pos,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        /// Whether the final argument is `xs...`.
        spread: bool,
        pos: Pos,
    },
    /// `import("name")` — resolved at compile time.
    Import { name: String, pos: Pos },
}

impl Expr {
    /// Source position of the expression.
    pub fn pos(&self) -> Pos {
        match self {
            Expr::IntLit { pos, .. }
            | Expr::FloatLit { pos, .. }
            | Expr::CharLit { pos, .. }
            | Expr::StringLit { pos, .. }
            | Expr::BoolLit { pos, .. }
            | Expr::NullLit { pos }
            | Expr::ArrayLit { pos, .. }
            | Expr::MapLit { pos, .. }
            | Expr::FuncLit { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Equality { pos, .. }
            | Expr::Logical { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Selector { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Import { pos, .. } => *pos,
            Expr::Ident(id) => id.pos,
        }
    }

    /// True if the expression can appear on the left of an assignment.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Ident(_) | Expr::Index { .. } | Expr::Selector { .. }
        )
    }
}
