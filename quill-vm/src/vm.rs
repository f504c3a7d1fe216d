// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The stack virtual machine.
//!
//! A `Vm` owns a value stack, a frame stack and the globals area, and
//! runs a dispatch loop over the current frame's instruction buffer.
//! Globals are per-slot shared cells so `pointer` can hand out live
//! references. The abort flag is observed on every backward jump.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use quill_core::value::{new_cell, CellRef, CompiledFunction, Value};
use quill_core::vm_access::{VmAccess, VmHandle};
use quill_core::{RuntimeError, ValueIterator};
use quill_parser::{BinOp, Pos, SourceFile};

use crate::bytecode::Unit;
use crate::frame::Frame;
use crate::opcode::Opcode;

/// Maximum number of value-stack slots.
pub const STACK_SIZE: usize = 20480;

/// Maximum number of call frames.
pub const MAX_FRAMES: usize = 10240;

/// Number of global slots.
pub const GLOBALS_SIZE: usize = 10240;

/// A runtime error annotated with the source position of the
/// faulting instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct VmError {
    pub error: RuntimeError,
    pub pos: Pos,
}

impl VmError {
    /// Render with the position resolved through `file`.
    pub fn display_in(&self, file: &SourceFile) -> String {
        format!("{}: runtime error: {}", file.display(self.pos), self.error)
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime error: {}", self.error)
    }
}

impl std::error::Error for VmError {}

/// State shared with VM-aware builtins through [`VmHandle`].
struct VmShared {
    globals: RefCell<Vec<Option<CellRef>>>,
    args: Vec<String>,
}

impl VmAccess for VmShared {
    fn find_global_cell(&self, v: &Value) -> Option<CellRef> {
        let globals = self.globals.borrow();
        // Reference identity first; scalar values fall back to the
        // first slot holding an equal value.
        if let Some(id) = v.identity() {
            for cell in globals.iter().flatten() {
                if cell.borrow().identity() == Some(id) {
                    return Some(Rc::clone(cell));
                }
            }
            return None;
        }
        for cell in globals.iter().flatten() {
            if cell.borrow().equals(v) {
                return Some(Rc::clone(cell));
            }
        }
        None
    }

    fn vm_args(&self) -> Vec<String> {
        self.args.clone()
    }
}

/// The virtual machine.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    shared: Rc<VmShared>,
    aborting: Arc<AtomicBool>,
    main: Rc<CompiledFunction>,
}

impl Vm {
    /// Construct a VM over a compiled unit with a pre-populated
    /// globals buffer (slot-indexed) and process arguments.
    pub fn new(unit: Unit, globals: Vec<Option<CellRef>>, args: Vec<String>) -> Vm {
        let mut globals = globals;
        globals.resize(GLOBALS_SIZE, None);
        Vm {
            main: Rc::new(CompiledFunction::new(Rc::clone(&unit.main))),
            constants: unit.constants,
            stack: Vec::with_capacity(256),
            frames: Vec::new(),
            shared: Rc::new(VmShared {
                globals: RefCell::new(globals),
                args,
            }),
            aborting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Construct a VM with empty globals and no arguments.
    pub fn with_unit(unit: Unit) -> Vm {
        Vm::new(unit, Vec::new(), Vec::new())
    }

    /// The abort flag. Raising it stops execution at the next
    /// backward jump; the stop is permanent for this VM.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.aborting)
    }

    /// Share an externally owned abort flag (embedder use).
    pub fn set_abort_flag(&mut self, flag: Arc<AtomicBool>) {
        self.aborting = flag;
    }

    /// Read a global slot after (or during) a run.
    pub fn global(&self, index: usize) -> Option<Value> {
        self.shared
            .globals
            .borrow()
            .get(index)?
            .as_ref()
            .map(|cell| cell.borrow().clone())
    }

    /// Write a global slot (embedder pre-population).
    pub fn set_global(&self, index: usize, value: Value) {
        let mut globals = self.shared.globals.borrow_mut();
        if index >= globals.len() {
            return;
        }
        match &globals[index] {
            Some(cell) => *cell.borrow_mut() = value,
            None => globals[index] = Some(new_cell(value)),
        }
    }

    /// Run the unit's main function to completion.
    pub fn run(&mut self) -> Result<(), VmError> {
        debug!(code_bytes = self.main.proto.instructions.len(), "vm run");
        let num_locals = self.main.proto.num_locals;
        self.frames.push(Frame::new(Rc::clone(&self.main), 0));
        for _ in 0..num_locals {
            self.stack.push(Value::Null);
        }
        let result = self.run_loop();
        if let Err(e) = &result {
            debug!(error = %e.error, "vm exit with error");
        }
        result
    }

    // ------------------------------------------------------------------
    // Dispatch loop
    // ------------------------------------------------------------------

    fn run_loop(&mut self) -> Result<(), VmError> {
        loop {
            let frame = self.frames.last().expect("active frame");
            let code = frame.code();
            if frame.ip >= code.len() {
                // Only the main frame may fall off the end; function
                // bodies always end with Return.
                if self.frames.len() == 1 {
                    return Ok(());
                }
                return Err(self.error_at(RuntimeError::custom("instruction pointer overrun")));
            }
            let op_ip = frame.ip;
            let op = match Opcode::from_u8(code[op_ip]) {
                Some(op) => op,
                None => {
                    return Err(
                        self.error_at(RuntimeError::custom(format!(
                            "bad opcode {} at {}",
                            code[op_ip], op_ip
                        ))),
                    );
                }
            };

            match self.execute(op, op_ip) {
                Ok(()) => {}
                Err(error) => return Err(self.annotate(error, op_ip)),
            }
        }
    }

    /// Execute one instruction. The frame's ip is advanced here.
    fn execute(&mut self, op: Opcode, op_ip: usize) -> Result<(), RuntimeError> {
        match op {
            Opcode::Constant => {
                let idx = self.read_u16(op_ip);
                let value = self.constants[idx].clone();
                self.push(value)?;
            }
            Opcode::Pop => {
                self.pop()?;
            }
            Opcode::True => self.push(Value::Bool(true))?,
            Opcode::False => self.push(Value::Bool(false))?,
            Opcode::Null => self.push(Value::Null)?,
            Opcode::BinaryOp => {
                let op_byte = self.read_u8(op_ip);
                let binop = BinOp::from_u8(op_byte as u8)
                    .ok_or_else(|| RuntimeError::custom("bad binary-op operand"))?;
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                // Int-Int add/sub/compare stay off the general
                // dispatch path.
                let result = match (&lhs, &rhs, binop) {
                    (Value::Int(a), Value::Int(b), BinOp::Add) => {
                        Value::Int(a.wrapping_add(*b))
                    }
                    (Value::Int(a), Value::Int(b), BinOp::Sub) => {
                        Value::Int(a.wrapping_sub(*b))
                    }
                    (Value::Int(a), Value::Int(b), BinOp::Less) => Value::Bool(a < b),
                    _ => lhs.binary_op(binop, &rhs)?,
                };
                self.push(result)?;
            }
            Opcode::Equal => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(Value::Bool(lhs.equals(&rhs)))?;
            }
            Opcode::NotEqual => {
                let rhs = self.pop()?;
                let lhs = self.pop()?;
                self.push(Value::Bool(!lhs.equals(&rhs)))?;
            }
            Opcode::LNot => {
                let v = self.pop()?;
                self.push(Value::Bool(v.is_falsy()))?;
            }
            Opcode::BNot => {
                let v = self.pop()?;
                let result = match v {
                    Value::Int(v) => Value::Int(!v),
                    Value::BigInt(v) => Value::bigint(!(*v).clone()),
                    _ => return Err(RuntimeError::InvalidOperator),
                };
                self.push(result)?;
            }
            Opcode::Minus => {
                let v = self.pop()?;
                let result = match v {
                    Value::Int(v) => Value::Int(v.wrapping_neg()),
                    Value::Float(v) => Value::Float(-v),
                    Value::BigInt(v) => Value::bigint(-(*v).clone()),
                    Value::BigFloat(v) => Value::bigfloat(-(*v).clone()),
                    Value::Complex(v) => Value::Complex(-v),
                    _ => return Err(RuntimeError::InvalidOperator),
                };
                self.push(result)?;
            }
            Opcode::JumpFalsy => {
                let target = self.read_u16(op_ip);
                let v = self.pop()?;
                if v.is_falsy() {
                    return self.jump(target, op_ip);
                }
            }
            Opcode::AndJump => {
                let target = self.read_u16(op_ip);
                if self.peek()?.is_falsy() {
                    return self.jump(target, op_ip);
                }
                self.pop()?;
            }
            Opcode::OrJump => {
                let target = self.read_u16(op_ip);
                if !self.peek()?.is_falsy() {
                    return self.jump(target, op_ip);
                }
                self.pop()?;
            }
            Opcode::Jump => {
                let target = self.read_u16(op_ip);
                return self.jump(target, op_ip);
            }
            Opcode::Array => {
                let n = self.read_u16(op_ip);
                let elements = self.pop_n(n)?;
                self.push(Value::array(elements))?;
            }
            Opcode::Map => {
                let n = self.read_u16(op_ip);
                let flat = self.pop_n(n * 2)?;
                let entries = flat.chunks_exact(2).map(|pair| {
                    (
                        quill_core::convert::to_raw_string(&pair[0]),
                        pair[1].clone(),
                    )
                });
                let map = Value::map(entries.collect::<Vec<_>>());
                self.push(map)?;
            }
            Opcode::IndexGet => {
                let index = self.pop()?;
                let collection = self.pop()?;
                let result = collection.index_get(&index)?;
                self.push(result)?;
            }
            Opcode::IndexSet => {
                let value = self.pop()?;
                let index = self.pop()?;
                let collection = self.pop()?;
                collection.index_set(&index, value)?;
            }
            Opcode::Call => {
                let argc = self.read_u8(op_ip);
                let spread = self.read_u8_at(op_ip, 1) != 0;
                self.advance(op_ip, op);
                self.call(argc, spread)?;
                return Ok(());
            }
            Opcode::Return => {
                let has_value = self.read_u8(op_ip) != 0;
                let value = if has_value { self.pop()? } else { Value::Null };
                let frame = self.frames.pop().expect("returning frame");
                self.stack.truncate(frame.base - 1);
                self.push(value)?;
                return Ok(());
            }
            Opcode::GetGlobal => {
                let idx = self.read_u16(op_ip);
                let value = {
                    let globals = self.shared.globals.borrow();
                    match globals.get(idx).and_then(|c| c.as_ref()) {
                        Some(cell) => cell.borrow().clone(),
                        None => {
                            return Err(RuntimeError::UndefinedGlobal(format!("slot {}", idx)));
                        }
                    }
                };
                self.push(value)?;
            }
            Opcode::SetGlobal => {
                let idx = self.read_u16(op_ip);
                let value = self.pop()?;
                let mut globals = self.shared.globals.borrow_mut();
                match &globals[idx] {
                    // Writing through the existing cell keeps live
                    // pointers valid.
                    Some(cell) => *cell.borrow_mut() = value,
                    None => globals[idx] = Some(new_cell(value)),
                }
            }
            Opcode::GetLocal => {
                let slot = self.base() + self.read_u8(op_ip);
                let value = match &self.stack[slot] {
                    Value::Cell(cell) => cell.borrow().clone(),
                    other => other.clone(),
                };
                self.push(value)?;
            }
            Opcode::SetLocal => {
                let slot = self.base() + self.read_u8(op_ip);
                let value = self.pop()?;
                match &self.stack[slot] {
                    Value::Cell(cell) => *cell.borrow_mut() = value,
                    _ => self.stack[slot] = value,
                }
            }
            Opcode::DefineLocal => {
                let slot = self.base() + self.read_u8(op_ip);
                let value = self.pop()?;
                // Writing through a promoted cell lets
                // `f := func() { f() }` observe its own definition.
                match &self.stack[slot] {
                    Value::Cell(cell) => *cell.borrow_mut() = value,
                    _ => self.stack[slot] = value,
                }
            }
            Opcode::GetBuiltin => {
                let idx = self.read_u8(op_ip);
                self.push(Value::Builtin(&quill_core::BUILTINS[idx]))?;
            }
            Opcode::Closure => {
                let fn_idx = self.read_u16(op_ip);
                let num_free = self.read_u8_at(op_ip, 2);
                let mut cells = Vec::with_capacity(num_free);
                for value in self.pop_n(num_free)? {
                    match value {
                        Value::Cell(cell) => cells.push(cell),
                        _ => {
                            return Err(RuntimeError::custom(
                                "closure capture is not a cell",
                            ));
                        }
                    }
                }
                let Value::CompiledFunction(proto_fn) = &self.constants[fn_idx] else {
                    return Err(RuntimeError::custom("closure constant is not a function"));
                };
                let closure = CompiledFunction {
                    proto: Rc::clone(&proto_fn.proto),
                    free: cells,
                };
                self.push(Value::CompiledFunction(Rc::new(closure)))?;
            }
            Opcode::GetFree => {
                let idx = self.read_u8(op_ip);
                let value = self.frame().func.free[idx].borrow().clone();
                self.push(value)?;
            }
            Opcode::SetFree => {
                let idx = self.read_u8(op_ip);
                let value = self.pop()?;
                *self.frame().func.free[idx].borrow_mut() = value;
            }
            Opcode::GetLocalPtr => {
                let slot = self.base() + self.read_u8(op_ip);
                let cell = match &self.stack[slot] {
                    Value::Cell(cell) => Rc::clone(cell),
                    other => {
                        let cell = new_cell(other.clone());
                        self.stack[slot] = Value::Cell(Rc::clone(&cell));
                        cell
                    }
                };
                self.push(Value::Cell(cell))?;
            }
            Opcode::GetFreePtr => {
                let idx = self.read_u8(op_ip);
                let cell = Rc::clone(&self.frame().func.free[idx]);
                self.push(Value::Cell(cell))?;
            }
            Opcode::IteratorInit => {
                let value = self.pop()?;
                let iterator = ValueIterator::open(&value)
                    .ok_or_else(|| RuntimeError::NotIterable(value.type_name().into_owned()))?;
                self.push(Value::Iterator(Rc::new(RefCell::new(iterator))))?;
            }
            Opcode::IteratorNext => {
                let iterator = self.pop_iterator()?;
                let more = iterator.borrow_mut().next();
                self.push(Value::Bool(more))?;
            }
            Opcode::IteratorKey => {
                let iterator = self.pop_iterator()?;
                let key = iterator.borrow().key();
                self.push(key)?;
            }
            Opcode::IteratorValue => {
                let iterator = self.pop_iterator()?;
                let value = iterator.borrow().value();
                self.push(value)?;
            }
            Opcode::Error => {
                let value = self.pop()?;
                self.push(Value::error(value))?;
            }
            Opcode::Immutable => {
                let value = self.pop()?;
                self.push(make_immutable(value))?;
            }
            Opcode::Destructure => {
                let n = self.read_u8(op_ip);
                let value = self.pop()?;
                match value.as_array_payload() {
                    Some(payload) if payload.len() == n => {}
                    Some(payload) => {
                        return Err(RuntimeError::DestructureMismatch {
                            expected: n,
                            found: payload.len(),
                        });
                    }
                    None => {
                        return Err(RuntimeError::custom(format!(
                            "cannot destructure {}",
                            value.type_name()
                        )));
                    }
                }
            }
        }
        self.advance(op_ip, op);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn call(&mut self, argc: usize, spread: bool) -> Result<(), RuntimeError> {
        let mut argc = argc;
        if spread {
            let last = self.pop()?;
            let Some(elements) = last.as_array_payload() else {
                return Err(RuntimeError::invalid_argument(
                    "last",
                    "array",
                    last.type_name(),
                ));
            };
            argc = argc - 1 + elements.len();
            for element in elements {
                self.push(element)?;
            }
        }

        let callee_index = self.stack.len() - argc - 1;
        let callee = self.stack[callee_index].clone();
        match callee {
            Value::CompiledFunction(func) => self.call_compiled(func, argc, callee_index),
            Value::Builtin(builtin) => {
                let mut args = self.pop_n(argc)?;
                self.pop()?; // the callee itself
                if builtin.vm_aware {
                    let handle: Rc<dyn VmAccess> = Rc::clone(&self.shared) as Rc<dyn VmAccess>;
                    args.insert(0, Value::VmHandle(VmHandle::new(handle)));
                }
                let result = (builtin.func)(&args)?;
                self.push(result)
            }
            Value::UserFunction(func) => {
                let args = self.pop_n(argc)?;
                self.pop()?;
                let result = (func.func)(&args)?;
                self.push(result)
            }
            other => Err(RuntimeError::NotCallable(other.type_name().into_owned())),
        }
    }

    fn call_compiled(
        &mut self,
        func: Rc<CompiledFunction>,
        argc: usize,
        callee_index: usize,
    ) -> Result<(), RuntimeError> {
        let num_params = func.proto.num_params;
        if func.proto.variadic {
            // The final parameter packs the excess arguments.
            if argc < num_params - 1 {
                return Err(RuntimeError::WrongNumArguments);
            }
            let rest: Vec<Value> = self.stack.drain(callee_index + num_params..).collect();
            self.push(Value::array(rest))?;
        } else if argc != num_params {
            return Err(RuntimeError::WrongNumArguments);
        }

        if self.frames.len() >= MAX_FRAMES {
            return Err(RuntimeError::FrameOverflow);
        }
        let base = callee_index + 1;
        if base + func.proto.num_locals > STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        // Reserve and clear the remaining local slots.
        while self.stack.len() < base + func.proto.num_locals {
            self.stack.push(Value::Null);
        }
        self.frames.push(Frame::new(func, base));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn frame(&self) -> &Frame {
        self.frames.last().expect("active frame")
    }

    fn base(&self) -> usize {
        self.frame().base
    }

    fn read_u8(&self, op_ip: usize) -> usize {
        self.frame().code()[op_ip + 1] as usize
    }

    fn read_u8_at(&self, op_ip: usize, offset: usize) -> usize {
        self.frame().code()[op_ip + 1 + offset] as usize
    }

    fn read_u16(&self, op_ip: usize) -> usize {
        let code = self.frame().code();
        u16::from_le_bytes([code[op_ip + 1], code[op_ip + 2]]) as usize
    }

    fn advance(&mut self, op_ip: usize, op: Opcode) {
        let frame = self.frames.last_mut().expect("active frame");
        frame.ip = op_ip + crate::opcode::instruction_len(op);
    }

    /// Transfer control to `target`. Backward jumps are the abort
    /// checkpoints.
    fn jump(&mut self, target: usize, op_ip: usize) -> Result<(), RuntimeError> {
        if target <= op_ip && self.aborting.load(Ordering::Relaxed) {
            return Err(RuntimeError::Aborted);
        }
        self.frames.last_mut().expect("active frame").ip = target;
        Ok(())
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::custom("stack underflow"))
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::custom("stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        if n > self.stack.len() {
            return Err(RuntimeError::custom("stack underflow"));
        }
        let at = self.stack.len() - n;
        Ok(self.stack.drain(at..).collect())
    }

    fn pop_iterator(&mut self) -> Result<Rc<RefCell<ValueIterator>>, RuntimeError> {
        match self.pop()? {
            Value::Iterator(it) => Ok(it),
            other => Err(RuntimeError::NotIterable(other.type_name().into_owned())),
        }
    }

    fn error_at(&self, error: RuntimeError) -> VmError {
        VmError {
            error,
            pos: Pos::NONE,
        }
    }

    /// Attach the innermost source position to a runtime error.
    fn annotate(&self, error: RuntimeError, op_ip: usize) -> VmError {
        let pos = self
            .frames
            .last()
            .map(|f| f.func.proto.source_pos(op_ip))
            .unwrap_or(Pos::NONE);
        VmError { error, pos }
    }
}

/// Deep immutable conversion for `immutable(x)` and `export`.
fn make_immutable(value: Value) -> Value {
    match value {
        Value::Array(a) => {
            Value::immutable_array(a.borrow().iter().map(|v| make_immutable(v.clone())))
        }
        Value::Map(m) => Value::immutable_map(
            m.borrow()
                .iter()
                .map(|(k, v)| (k.clone(), make_immutable(v.clone()))),
        ),
        other => other,
    }
}
