// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The bytecode compiler: AST → compiled unit.
//!
//! One `Compiler` walks one function body; function literals compile
//! in a nested scope sharing the constant pool. Loops keep explicit
//! lists of pending break/continue jumps patched when the loop
//! closes. Imports resolve at compile time through the module map
//! (builtin modules become constants, source and file modules become
//! zero-argument functions cached per canonical path).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use quill_core::value::{FuncProto, Value};
use quill_parser::ast::{AssignOp, Block, Expr, File, Ident, Stmt, UnaryOp};
use quill_parser::source::SourceFile;
use quill_parser::{Parser, Pos};

use crate::bytecode::Unit;
use crate::module_map::{Module, ModuleMap};
use crate::opcode::{emit_instruction, read_operands, Opcode};
use crate::symbol_table::{Symbol, SymbolScope, SymbolTable, SymbolTableExt, SymbolTableRef};

/// Default source-file extension for file imports.
pub const SOURCE_FILE_EXT: &str = ".ql";

/// A compile error with its source position.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
    pub pos: Pos,
}

impl CompileError {
    pub fn new(message: impl Into<String>, pos: Pos) -> CompileError {
        CompileError {
            message: message.into(),
            pos,
        }
    }

    /// Render with the position resolved through `file`.
    pub fn display_in(&self, file: &SourceFile) -> String {
        format!("{}: compile error: {}", file.display(self.pos), self.message)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compile error: {}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Per-function compilation state.
struct Scope {
    instructions: Vec<u8>,
    source_map: Vec<(u32, Pos)>,
    last_op: Option<Opcode>,
}

impl Scope {
    fn new() -> Scope {
        Scope {
            instructions: Vec::new(),
            source_map: Vec::new(),
            last_op: None,
        }
    }
}

/// An open loop: where `continue` goes and the jumps to patch on
/// close.
struct LoopFrame {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// Shared state across nested compilers: the constant pool and the
/// per-path cache of compiled file modules.
struct SharedState {
    constants: RefCell<Vec<Value>>,
    module_cache: RefCell<HashMap<PathBuf, Rc<FuncProto>>>,
    /// Paths currently being compiled, for cyclic-import detection.
    compiling: RefCell<Vec<PathBuf>>,
}

/// The bytecode compiler.
pub struct Compiler {
    symbol_table: SymbolTableRef,
    shared: Rc<SharedState>,
    module_map: Rc<ModuleMap>,
    source: Rc<SourceFile>,
    scopes: Vec<Scope>,
    loops: Vec<LoopFrame>,
    file_import: bool,
    import_dir: PathBuf,
    /// Set while compiling a module body; enables `export`.
    in_module: bool,
    /// Counter for hidden helper variables.
    hidden_counter: RefCell<usize>,
}

impl Compiler {
    /// Create a compiler with an explicit symbol table, constant
    /// pool, module map and source-file reference. Builtin symbols
    /// must already be registered in the table (see
    /// [`Compiler::with_builtins`]).
    pub fn new(
        symbol_table: SymbolTableRef,
        constants: Vec<Value>,
        module_map: Rc<ModuleMap>,
        source: Rc<SourceFile>,
    ) -> Compiler {
        Compiler {
            symbol_table,
            shared: Rc::new(SharedState {
                constants: RefCell::new(constants),
                module_cache: RefCell::new(HashMap::new()),
                compiling: RefCell::new(Vec::new()),
            }),
            module_map,
            source,
            scopes: vec![Scope::new()],
            loops: Vec::new(),
            file_import: false,
            import_dir: PathBuf::from("."),
            in_module: false,
            hidden_counter: RefCell::new(0),
        }
    }

    /// Create a compiler with a fresh symbol table pre-loaded with
    /// the builtin registry.
    pub fn with_builtins(module_map: Rc<ModuleMap>, source: Rc<SourceFile>) -> Compiler {
        let table = SymbolTable::new();
        for (index, builtin) in quill_core::BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        Compiler::new(table, Vec::new(), module_map, source)
    }

    /// Declare an embedder-supplied global before compilation. Slots
    /// are assigned in declaration order starting at zero.
    pub fn define_global(&mut self, name: &str) -> Result<Symbol> {
        self.symbol_table.define(name).ok_or_else(|| {
            CompileError::new(format!("'{}' is already defined", name), Pos::NONE)
        })
    }

    /// Allow `import` to read source files from disk.
    pub fn enable_file_import(&mut self, enable: bool) {
        self.file_import = enable;
    }

    /// Root directory for file imports.
    pub fn set_import_dir(&mut self, dir: impl Into<PathBuf>) {
        self.import_dir = dir.into();
    }

    /// Compile a parsed file into a unit.
    pub fn compile(mut self, file: &File) -> Result<Unit> {
        debug!(source = %self.source.name, "compile start");
        for stmt in &file.stmts {
            self.compile_stmt(stmt)?;
        }
        let num_locals = self.symbol_table.max_definitions();
        let scope = self.scopes.pop().expect("main scope");
        let main = Rc::new(FuncProto {
            instructions: scope.instructions,
            num_locals,
            num_params: 0,
            variadic: false,
            source_map: scope.source_map,
        });
        let constants = self.shared.constants.borrow().clone();
        debug!(
            constants = constants.len(),
            code_bytes = main.instructions.len(),
            "compile done"
        );
        Ok(Unit { main, constants })
    }

    // ------------------------------------------------------------------
    // Emission helpers
    // ------------------------------------------------------------------

    fn scope(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("at least one scope")
    }

    fn emit(&mut self, op: Opcode, operands: &[usize], pos: Pos) -> usize {
        let scope = self.scope();
        let offset = emit_instruction(&mut scope.instructions, op, operands);
        if pos.is_valid() {
            match scope.source_map.last() {
                Some((_, last)) if *last == pos => {}
                _ => scope.source_map.push((offset as u32, pos)),
            }
        }
        scope.last_op = Some(op);
        offset
    }

    fn current_offset(&mut self) -> usize {
        self.scope().instructions.len()
    }

    /// Rewrite the jump target of the instruction at `offset` to
    /// point at the current position.
    fn patch_jump(&mut self, offset: usize) {
        let target = self.current_offset();
        self.patch_jump_to(offset, target);
    }

    fn patch_jump_to(&mut self, offset: usize, target: usize) {
        let scope = self.scope();
        let op = Opcode::from_u8(scope.instructions[offset]).expect("patching a real opcode");
        debug_assert!(
            matches!(
                op,
                Opcode::Jump | Opcode::JumpFalsy | Opcode::AndJump | Opcode::OrJump
            ),
            "patch target is not a jump: {:?}",
            op
        );
        let bytes = (target as u16).to_le_bytes();
        scope.instructions[offset + 1] = bytes[0];
        scope.instructions[offset + 2] = bytes[1];
    }

    /// Add a constant to the shared pool, reusing an existing slot
    /// for structurally equal primitives. Functions and containers
    /// are never deduplicated.
    fn add_constant(&mut self, value: Value) -> usize {
        let mut pool = self.shared.constants.borrow_mut();
        if constant_dedupable(&value) {
            if let Some(i) = pool.iter().position(|c| constants_equal(c, &value)) {
                return i;
            }
        }
        pool.push(value);
        pool.len() - 1
    }

    fn hidden_name(&self, kind: &str) -> String {
        let mut counter = self.hidden_counter.borrow_mut();
        *counter += 1;
        // '#' cannot appear in source identifiers, so hidden names
        // never collide with user symbols.
        format!("#{}{}", kind, *counter)
    }

    // ------------------------------------------------------------------
    // Symbol helpers
    // ------------------------------------------------------------------

    fn define_symbol(&mut self, ident: &Ident) -> Result<Symbol> {
        self.symbol_table.define(&ident.name).ok_or_else(|| {
            CompileError::new(
                format!("'{}' is already defined in this scope", ident.name),
                ident.pos,
            )
        })
    }

    fn emit_load(&mut self, symbol: &Symbol, pos: Pos) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index], pos),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[symbol.index], pos),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index], pos),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[symbol.index], pos),
        };
    }

    /// Store for a fresh definition: locals bypass capture cells.
    fn emit_define(&mut self, symbol: &Symbol, pos: Pos) -> Result<()> {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index], pos),
            SymbolScope::Local => self.emit(Opcode::DefineLocal, &[symbol.index], pos),
            _ => {
                return Err(CompileError::new("cannot define this symbol", pos));
            }
        };
        Ok(())
    }

    /// Store for an assignment to an existing symbol.
    fn emit_store(&mut self, symbol: &Symbol, pos: Pos) -> Result<()> {
        match symbol.scope {
            SymbolScope::Global => self.emit(Opcode::SetGlobal, &[symbol.index], pos),
            SymbolScope::Local => self.emit(Opcode::SetLocal, &[symbol.index], pos),
            SymbolScope::Free => self.emit(Opcode::SetFree, &[symbol.index], pos),
            SymbolScope::Builtin => {
                return Err(CompileError::new(
                    format!("cannot assign to builtin '{}'", symbol.name),
                    pos,
                ));
            }
        };
        Ok(())
    }

    fn enter_block(&mut self) {
        self.symbol_table = SymbolTable::fork(&self.symbol_table, true);
    }

    fn leave_block(&mut self) {
        let parent = self
            .symbol_table
            .parent()
            .expect("leaving a block scope requires a parent");
        self.symbol_table = parent;
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(Opcode::Pop, &[], expr.pos());
                Ok(())
            }
            Stmt::Define { names, value, pos } => self.compile_define(names, value, *pos),
            Stmt::Assign {
                targets,
                op,
                value,
                pos,
            } => self.compile_assign(targets, *op, value, *pos),
            Stmt::Block(block) => {
                self.enter_block();
                let result = self.compile_block_stmts(block);
                self.leave_block();
                result
            }
            Stmt::If {
                init,
                cond,
                body,
                alt,
                pos,
            } => self.compile_if(init.as_deref(), cond, body, alt.as_deref(), *pos),
            Stmt::For {
                init,
                cond,
                post,
                body,
                pos,
            } => self.compile_for(init.as_deref(), cond.as_ref(), post.as_deref(), body, *pos),
            Stmt::ForIn {
                key,
                value,
                iterable,
                body,
                pos,
            } => self.compile_for_in(key, value.as_ref(), iterable, body, *pos),
            Stmt::Break(pos) => {
                let jump = self.emit(Opcode::Jump, &[0], *pos);
                match self.loops.last_mut() {
                    Some(frame) => {
                        frame.break_jumps.push(jump);
                        Ok(())
                    }
                    None => Err(CompileError::new("break outside loop", *pos)),
                }
            }
            Stmt::Continue(pos) => {
                let jump = self.emit(Opcode::Jump, &[0], *pos);
                match self.loops.last_mut() {
                    Some(frame) => {
                        frame.continue_jumps.push(jump);
                        Ok(())
                    }
                    None => Err(CompileError::new("continue outside loop", *pos)),
                }
            }
            Stmt::Return { value, pos } => {
                if self.scopes.len() == 1 && !self.in_module {
                    return Err(CompileError::new("return outside function", *pos));
                }
                match value {
                    Some(expr) => {
                        self.compile_expr(expr)?;
                        self.emit(Opcode::Return, &[1], *pos);
                    }
                    None => {
                        self.emit(Opcode::Return, &[0], *pos);
                    }
                }
                Ok(())
            }
            Stmt::Export { value, pos } => {
                if !self.in_module {
                    return Err(CompileError::new("export outside module", *pos));
                }
                if self.scopes.len() > 1 {
                    return Err(CompileError::new(
                        "export must be at the top level of a module",
                        *pos,
                    ));
                }
                self.compile_expr(value)?;
                self.emit(Opcode::Immutable, &[], *pos);
                self.emit(Opcode::Return, &[1], *pos);
                Ok(())
            }
        }
    }

    fn compile_block_stmts(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_define(&mut self, names: &[Ident], value: &Expr, pos: Pos) -> Result<()> {
        if names.len() == 1 {
            // Function literals see their own name, so
            // `f := func() { f() }` can recurse. Everything else
            // defines after the value: `x := x` reads the outer x.
            let symbol = if matches!(value, Expr::FuncLit { .. }) {
                let symbol = self.define_symbol(&names[0])?;
                self.compile_expr(value)?;
                symbol
            } else {
                self.compile_expr(value)?;
                self.define_symbol(&names[0])?
            };
            return self.emit_define(&symbol, pos);
        }

        // a, b := rhs — destructure through a hidden slot.
        let hidden = self.define_hidden(pos)?;
        self.compile_expr(value)?;
        self.emit_define(&hidden, pos)?;
        self.emit_load(&hidden, pos);
        self.emit(Opcode::Destructure, &[names.len()], pos);
        for (i, name) in names.iter().enumerate() {
            let symbol = self.define_symbol(name)?;
            self.emit_load(&hidden, pos);
            let idx = self.add_constant(Value::Int(i as i64));
            self.emit(Opcode::Constant, &[idx], pos);
            self.emit(Opcode::IndexGet, &[], pos);
            self.emit_define(&symbol, pos)?;
        }
        Ok(())
    }

    fn define_hidden(&mut self, pos: Pos) -> Result<Symbol> {
        let name = self.hidden_name("tmp");
        self.symbol_table
            .define(&name)
            .ok_or_else(|| CompileError::new("internal: hidden symbol collision", pos))
    }

    fn compile_assign(
        &mut self,
        targets: &[Expr],
        op: AssignOp,
        value: &Expr,
        pos: Pos,
    ) -> Result<()> {
        if targets.len() == 1 {
            return self.compile_single_assign(&targets[0], op, value, pos);
        }

        // a, b = rhs — plain multi-assignment only.
        let hidden = self.define_hidden(pos)?;
        self.compile_expr(value)?;
        self.emit_define(&hidden, pos)?;
        self.emit_load(&hidden, pos);
        self.emit(Opcode::Destructure, &[targets.len()], pos);
        for (i, target) in targets.iter().enumerate() {
            let element = |c: &mut Compiler| -> Result<()> {
                c.emit_load(&hidden, pos);
                let idx = c.add_constant(Value::Int(i as i64));
                c.emit(Opcode::Constant, &[idx], pos);
                c.emit(Opcode::IndexGet, &[], pos);
                Ok(())
            };
            self.compile_store_into(target, element, pos)?;
        }
        Ok(())
    }

    fn compile_single_assign(
        &mut self,
        target: &Expr,
        op: AssignOp,
        value: &Expr,
        pos: Pos,
    ) -> Result<()> {
        match op {
            AssignOp::Assign => {
                self.compile_store_into(target, |c| c.compile_expr(value), pos)
            }
            AssignOp::Compound(binop) => self.compile_store_into(
                target,
                |c| {
                    // load-op-store; index targets re-evaluate their
                    // collection and index expressions
                    c.compile_expr(target)?;
                    c.compile_expr(value)?;
                    c.emit(Opcode::BinaryOp, &[binop as usize], pos);
                    Ok(())
                },
                pos,
            ),
        }
    }

    /// Compile a store of `produce_value()` into an assignable
    /// target.
    fn compile_store_into(
        &mut self,
        target: &Expr,
        produce_value: impl FnOnce(&mut Compiler) -> Result<()>,
        pos: Pos,
    ) -> Result<()> {
        match target {
            Expr::Ident(ident) => {
                let symbol = self.symbol_table.resolve(&ident.name).ok_or_else(|| {
                    CompileError::new(
                        format!("unresolved reference '{}'", ident.name),
                        ident.pos,
                    )
                })?;
                produce_value(self)?;
                self.emit_store(&symbol, pos)
            }
            Expr::Index { expr, index, .. } => {
                self.compile_expr(expr)?;
                self.compile_expr(index)?;
                produce_value(self)?;
                self.emit(Opcode::IndexSet, &[], pos);
                Ok(())
            }
            Expr::Selector { expr, name, .. } => {
                self.compile_expr(expr)?;
                let idx = self.add_constant(Value::string(name.clone()));
                self.emit(Opcode::Constant, &[idx], pos);
                produce_value(self)?;
                self.emit(Opcode::IndexSet, &[], pos);
                Ok(())
            }
            other => Err(CompileError::new(
                "cannot assign to this expression",
                other.pos(),
            )),
        }
    }

    fn compile_if(
        &mut self,
        init: Option<&Stmt>,
        cond: &Expr,
        body: &Block,
        alt: Option<&Stmt>,
        pos: Pos,
    ) -> Result<()> {
        self.enter_block();
        let result = (|| {
            if let Some(init) = init {
                self.compile_stmt(init)?;
            }
            self.compile_expr(cond)?;
            let jump_else = self.emit(Opcode::JumpFalsy, &[0], pos);
            self.enter_block();
            let body_result = self.compile_block_stmts(body);
            self.leave_block();
            body_result?;
            match alt {
                Some(alt) => {
                    let jump_end = self.emit(Opcode::Jump, &[0], pos);
                    self.patch_jump(jump_else);
                    self.compile_stmt(alt)?;
                    self.patch_jump(jump_end);
                }
                None => {
                    self.patch_jump(jump_else);
                }
            }
            Ok(())
        })();
        self.leave_block();
        result
    }

    fn compile_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        post: Option<&Stmt>,
        body: &Block,
        pos: Pos,
    ) -> Result<()> {
        self.enter_block();
        let result = (|| {
            if let Some(init) = init {
                self.compile_stmt(init)?;
            }
            let loop_start = self.current_offset();
            let exit_jump = match cond {
                Some(cond) => {
                    self.compile_expr(cond)?;
                    Some(self.emit(Opcode::JumpFalsy, &[0], pos))
                }
                None => None,
            };

            self.loops.push(LoopFrame {
                break_jumps: Vec::new(),
                continue_jumps: Vec::new(),
            });
            self.enter_block();
            let body_result = self.compile_block_stmts(body);
            self.leave_block();
            let frame = self.loops.pop().expect("loop frame");
            body_result?;

            // continue lands on the post statement
            let post_offset = self.current_offset();
            if let Some(post) = post {
                self.compile_stmt(post)?;
            }
            self.emit(Opcode::Jump, &[loop_start], pos);

            let exit = self.current_offset();
            if let Some(offset) = exit_jump {
                self.patch_jump_to(offset, exit);
            }
            for offset in frame.break_jumps {
                self.patch_jump_to(offset, exit);
            }
            for offset in frame.continue_jumps {
                self.patch_jump_to(offset, post_offset);
            }
            Ok(())
        })();
        self.leave_block();
        result
    }

    fn compile_for_in(
        &mut self,
        key: &Ident,
        value: Option<&Ident>,
        iterable: &Expr,
        body: &Block,
        pos: Pos,
    ) -> Result<()> {
        self.enter_block();
        let result = (|| {
            // iterator lives in a hidden slot for the loop's duration
            let iterator = {
                let name = self.hidden_name("it");
                self.symbol_table
                    .define(&name)
                    .ok_or_else(|| CompileError::new("internal: hidden symbol collision", pos))?
            };
            self.compile_expr(iterable)?;
            self.emit(Opcode::IteratorInit, &[], pos);
            self.emit_define(&iterator, pos)?;

            // `for v in xs` binds the value; `for k, v in xs` binds
            // both.
            let (key_symbol, value_symbol) = match value {
                Some(value) => (Some(self.define_symbol(key)?), self.define_symbol(value)?),
                None => (None, self.define_symbol(key)?),
            };

            let loop_start = self.current_offset();
            self.emit_load(&iterator, pos);
            self.emit(Opcode::IteratorNext, &[], pos);
            let exit_jump = self.emit(Opcode::JumpFalsy, &[0], pos);

            if let Some(key_symbol) = &key_symbol {
                self.emit_load(&iterator, pos);
                self.emit(Opcode::IteratorKey, &[], pos);
                self.emit_define(key_symbol, pos)?;
            }
            self.emit_load(&iterator, pos);
            self.emit(Opcode::IteratorValue, &[], pos);
            self.emit_define(&value_symbol, pos)?;

            self.loops.push(LoopFrame {
                break_jumps: Vec::new(),
                continue_jumps: Vec::new(),
            });
            self.enter_block();
            let body_result = self.compile_block_stmts(body);
            self.leave_block();
            let frame = self.loops.pop().expect("loop frame");
            body_result?;

            self.emit(Opcode::Jump, &[loop_start], pos);
            let exit = self.current_offset();
            self.patch_jump_to(exit_jump, exit);
            for offset in frame.break_jumps {
                self.patch_jump_to(offset, exit);
            }
            for offset in frame.continue_jumps {
                self.patch_jump_to(offset, loop_start);
            }
            Ok(())
        })();
        self.leave_block();
        result
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::IntLit { value, pos } => {
                let idx = self.add_constant(Value::Int(*value));
                self.emit(Opcode::Constant, &[idx], *pos);
                Ok(())
            }
            Expr::FloatLit { value, pos } => {
                let idx = self.add_constant(Value::Float(*value));
                self.emit(Opcode::Constant, &[idx], *pos);
                Ok(())
            }
            Expr::CharLit { value, pos } => {
                let idx = self.add_constant(Value::Char(*value));
                self.emit(Opcode::Constant, &[idx], *pos);
                Ok(())
            }
            Expr::StringLit { value, pos } => {
                let idx = self.add_constant(Value::string(value.clone()));
                self.emit(Opcode::Constant, &[idx], *pos);
                Ok(())
            }
            Expr::BoolLit { value, pos } => {
                self.emit(
                    if *value { Opcode::True } else { Opcode::False },
                    &[],
                    *pos,
                );
                Ok(())
            }
            Expr::NullLit { pos } => {
                self.emit(Opcode::Null, &[], *pos);
                Ok(())
            }
            Expr::Ident(ident) => {
                let symbol = self.symbol_table.resolve(&ident.name).ok_or_else(|| {
                    CompileError::new(
                        format!("unresolved reference '{}'", ident.name),
                        ident.pos,
                    )
                })?;
                self.emit_load(&symbol, ident.pos);
                Ok(())
            }
            Expr::ArrayLit { elements, pos } => {
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()], *pos);
                Ok(())
            }
            Expr::MapLit { entries, pos } => {
                for (key, value) in entries {
                    let idx = self.add_constant(Value::string(key.clone()));
                    self.emit(Opcode::Constant, &[idx], *pos);
                    self.compile_expr(value)?;
                }
                self.emit(Opcode::Map, &[entries.len()], *pos);
                Ok(())
            }
            Expr::FuncLit {
                params,
                variadic,
                body,
                pos,
            } => self.compile_func_lit(params, *variadic, body, *pos),
            Expr::Unary { op, expr, pos } => {
                self.compile_expr(expr)?;
                let opcode = match op {
                    UnaryOp::Neg => Opcode::Minus,
                    UnaryOp::Not => Opcode::LNot,
                    UnaryOp::BitNot => Opcode::BNot,
                };
                self.emit(opcode, &[], *pos);
                Ok(())
            }
            Expr::Binary { op, lhs, rhs, pos } => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(Opcode::BinaryOp, &[*op as usize], *pos);
                Ok(())
            }
            Expr::Equality {
                negated,
                lhs,
                rhs,
                pos,
            } => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                self.emit(
                    if *negated {
                        Opcode::NotEqual
                    } else {
                        Opcode::Equal
                    },
                    &[],
                    *pos,
                );
                Ok(())
            }
            Expr::Logical { and, lhs, rhs, pos } => {
                self.compile_expr(lhs)?;
                let jump = self.emit(
                    if *and { Opcode::AndJump } else { Opcode::OrJump },
                    &[0],
                    *pos,
                );
                self.compile_expr(rhs)?;
                self.patch_jump(jump);
                Ok(())
            }
            Expr::Index { expr, index, pos } => {
                self.compile_expr(expr)?;
                self.compile_expr(index)?;
                self.emit(Opcode::IndexGet, &[], *pos);
                Ok(())
            }
            Expr::Selector { expr, name, pos } => {
                self.compile_expr(expr)?;
                let idx = self.add_constant(Value::string(name.clone()));
                self.emit(Opcode::Constant, &[idx], *pos);
                self.emit(Opcode::IndexGet, &[], *pos);
                Ok(())
            }
            Expr::Call {
                func,
                args,
                spread,
                pos,
            } => self.compile_call(func, args, *spread, *pos),
            Expr::Import { name, pos } => self.compile_import(name, *pos),
        }
    }

    fn compile_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        spread: bool,
        pos: Pos,
    ) -> Result<()> {
        // `error(x)` and `immutable(x)` are compiler intrinsics
        // unless the name is bound to something else.
        if let Expr::Ident(ident) = func {
            if self.symbol_table.resolve(&ident.name).is_none() {
                let intrinsic = match ident.name.as_str() {
                    "error" => Some(Opcode::Error),
                    "immutable" => Some(Opcode::Immutable),
                    _ => None,
                };
                if let Some(opcode) = intrinsic {
                    if args.len() != 1 || spread {
                        return Err(CompileError::new(
                            format!("{} takes exactly one argument", ident.name),
                            pos,
                        ));
                    }
                    self.compile_expr(&args[0])?;
                    self.emit(opcode, &[], pos);
                    return Ok(());
                }
            }
        }

        self.compile_expr(func)?;
        for arg in args {
            self.compile_expr(arg)?;
        }
        self.emit(Opcode::Call, &[args.len(), spread as usize], pos);
        Ok(())
    }

    fn compile_func_lit(
        &mut self,
        params: &[Ident],
        variadic: bool,
        body: &Block,
        pos: Pos,
    ) -> Result<()> {
        self.symbol_table = SymbolTable::fork(&self.symbol_table, false);
        self.scopes.push(Scope::new());

        let result = (|| {
            for param in params {
                self.define_symbol(param)?;
            }
            self.compile_block_stmts(body)
        })();

        // Fall off the end of the body → return null.
        if self.scope().last_op != Some(Opcode::Return) {
            self.emit(Opcode::Return, &[0], pos);
        }

        let scope = self.scopes.pop().expect("function scope");
        let free_symbols = self.symbol_table.free_symbols();
        let num_locals = self.symbol_table.max_definitions();
        self.symbol_table = self
            .symbol_table
            .parent()
            .expect("function scope has a parent");
        result?;

        let proto = Rc::new(FuncProto {
            instructions: scope.instructions,
            num_locals,
            num_params: params.len(),
            variadic,
            source_map: scope.source_map,
        });
        let fn_index = self.add_constant(Value::CompiledFunction(Rc::new(
            quill_core::CompiledFunction::new(proto),
        )));

        // Push capture cells in recorded order, then wrap.
        for free in &free_symbols {
            match free.scope {
                SymbolScope::Local => self.emit(Opcode::GetLocalPtr, &[free.index], pos),
                SymbolScope::Free => self.emit(Opcode::GetFreePtr, &[free.index], pos),
                _ => {
                    return Err(CompileError::new(
                        "internal: invalid free symbol scope",
                        pos,
                    ));
                }
            };
        }
        self.emit(Opcode::Closure, &[fn_index, free_symbols.len()], pos);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------

    fn compile_import(&mut self, name: &str, pos: Pos) -> Result<()> {
        match self.module_map.get(name) {
            Some(Module::Builtin(_)) => {
                let value = self
                    .module_map
                    .import_value(name)
                    .expect("builtin module import value");
                let idx = self.add_constant(value);
                self.emit(Opcode::Constant, &[idx], pos);
                Ok(())
            }
            Some(Module::Source(src)) => {
                let key = PathBuf::from(format!("<module:{}>", name));
                let cached = self.shared.module_cache.borrow().get(&key).cloned();
                if let Some(proto) = cached {
                    self.emit_module_call(proto, pos);
                    return Ok(());
                }
                if self.shared.compiling.borrow().contains(&key) {
                    return Err(CompileError::new(
                        format!("cyclic import of '{}'", name),
                        pos,
                    ));
                }
                let src = src.clone();
                self.shared.compiling.borrow_mut().push(key.clone());
                let result = self.compile_module(&src, key.clone(), pos);
                self.shared.compiling.borrow_mut().pop();
                let proto = result?;
                self.shared
                    .module_cache
                    .borrow_mut()
                    .insert(key, Rc::clone(&proto));
                self.emit_module_call(proto, pos);
                Ok(())
            }
            None => {
                if !self.file_import {
                    return Err(CompileError::new(
                        format!("module '{}' not found", name),
                        pos,
                    ));
                }
                self.compile_file_import(name, pos)
            }
        }
    }

    fn compile_file_import(&mut self, name: &str, pos: Pos) -> Result<()> {
        let mut path = self.import_dir.join(name);
        if path.extension().is_none() {
            path.set_extension(SOURCE_FILE_EXT.trim_start_matches('.'));
        }
        let path = path
            .canonicalize()
            .map_err(|e| CompileError::new(format!("cannot import '{}': {}", name, e), pos))?;

        // Per-path cache: repeated imports share one compiled module.
        let cached = self.shared.module_cache.borrow().get(&path).cloned();
        if let Some(proto) = cached {
            self.emit_module_call(proto, pos);
            return Ok(());
        }
        if self.shared.compiling.borrow().contains(&path) {
            return Err(CompileError::new(
                format!("cyclic import of '{}'", name),
                pos,
            ));
        }

        let src = std::fs::read_to_string(&path)
            .map_err(|e| CompileError::new(format!("cannot import '{}': {}", name, e), pos))?;

        self.shared.compiling.borrow_mut().push(path.clone());
        let result = self.compile_module(&src, path.clone(), pos);
        self.shared.compiling.borrow_mut().pop();
        let proto = result?;

        self.shared
            .module_cache
            .borrow_mut()
            .insert(path, Rc::clone(&proto));
        self.emit_module_call(proto, pos);
        Ok(())
    }

    /// Compile module source into a zero-argument function sharing
    /// this compiler's constant pool and caches.
    fn compile_module(&mut self, src: &str, path: PathBuf, pos: Pos) -> Result<Rc<FuncProto>> {
        debug!(module = %path.display(), "compile module");
        let file = Parser::parse_file(src).map_err(|e| {
            CompileError::new(
                format!("in module '{}': {}", path.display(), e.message),
                pos,
            )
        })?;

        // Modules get a fresh symbol table (builtins only); their
        // top-level names are locals of the module function.
        let table = SymbolTable::new();
        for (index, builtin) in quill_core::BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        let module_table = SymbolTable::fork(&table, false);

        let mut module_compiler = Compiler {
            symbol_table: module_table,
            shared: Rc::clone(&self.shared),
            module_map: Rc::clone(&self.module_map),
            source: Rc::new(SourceFile::new(path.display().to_string(), src)),
            scopes: vec![Scope::new()],
            loops: Vec::new(),
            file_import: self.file_import,
            import_dir: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.import_dir.clone()),
            in_module: true,
            hidden_counter: RefCell::new(0),
        };
        for stmt in &file.stmts {
            module_compiler
                .compile_stmt(stmt)
                .map_err(|e| CompileError::new(
                    format!("in module '{}': {}", path.display(), e.message),
                    pos,
                ))?;
        }
        if module_compiler.scope().last_op != Some(Opcode::Return) {
            module_compiler.emit(Opcode::Return, &[0], pos);
        }
        let num_locals = module_compiler.symbol_table.max_definitions();
        let scope = module_compiler.scopes.pop().expect("module scope");
        Ok(Rc::new(FuncProto {
            instructions: scope.instructions,
            num_locals,
            num_params: 0,
            variadic: false,
            source_map: scope.source_map,
        }))
    }

    fn emit_module_call(&mut self, proto: Rc<FuncProto>, pos: Pos) {
        let fn_index = self.add_constant(Value::CompiledFunction(Rc::new(
            quill_core::CompiledFunction::new(proto),
        )));
        self.emit(Opcode::Constant, &[fn_index], pos);
        self.emit(Opcode::Call, &[0, 0], pos);
    }
}

/// Whether a constant participates in pool deduplication.
fn constant_dedupable(value: &Value) -> bool {
    matches!(
        value,
        Value::Int(_) | Value::Float(_) | Value::Char(_) | Value::Str(_)
    )
}

/// Structural equality for dedupable constants. Floats compare by
/// bit pattern so `0.0` and `-0.0` stay distinct.
fn constants_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::Char(a), Value::Char(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a.borrow().text == b.borrow().text,
        _ => false,
    }
}

/// Disassemble a unit's main function (tests and the CLI).
pub fn disassemble(unit: &Unit) -> String {
    crate::opcode::format_instructions(&unit.main.instructions)
}

/// Walk an instruction buffer, yielding `(offset, opcode, operands)`.
pub fn iterate_instructions(
    code: &[u8],
) -> impl Iterator<Item = (usize, Opcode, Vec<usize>)> + '_ {
    let mut ip = 0;
    std::iter::from_fn(move || {
        if ip >= code.len() {
            return None;
        }
        let op = Opcode::from_u8(code[ip])?;
        let (operands, read) = read_operands(op, code, ip + 1);
        let at = ip;
        ip += 1 + read;
        Some((at, op, operands))
    })
}
