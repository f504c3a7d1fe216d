// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Bytecode instruction definitions and encoding.
//!
//! The instruction stream is a flat byte sequence: a one-byte opcode
//! followed by zero to two little-endian fixed-width operands. Jump
//! operands are absolute instruction offsets. Opcode values are part
//! of the serialized-unit contract and must not be reordered.

use std::fmt::Write;

/// Bytecode opcodes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Push constants[u16].
    Constant = 0,
    /// Pop the top of stack.
    Pop = 1,
    /// Push `true`.
    True = 2,
    /// Push `false`.
    False = 3,
    /// Push `null`.
    Null = 4,
    /// Pop rhs, pop lhs, push `lhs op rhs`; the u8 operand is a
    /// `BinOp` discriminant.
    BinaryOp = 5,
    /// Pop two values, push equality.
    Equal = 6,
    /// Pop two values, push inequality.
    NotEqual = 7,
    /// Pop, push logical negation.
    LNot = 8,
    /// Pop, push bitwise complement (ints only).
    BNot = 9,
    /// Pop, push arithmetic negation.
    Minus = 10,
    /// Pop; jump to u16 if the value was falsy.
    JumpFalsy = 11,
    /// Short-circuit `&&`: if TOS is falsy jump to u16 keeping it,
    /// else pop it.
    AndJump = 12,
    /// Short-circuit `||`: if TOS is truthy jump to u16 keeping it,
    /// else pop it.
    OrJump = 13,
    /// Unconditional jump to u16.
    Jump = 14,
    /// Pop u16 values, push an array of them.
    Array = 15,
    /// Pop u16 key/value pairs, push a map.
    Map = 16,
    /// Pop index, pop collection, push `collection[index]`.
    IndexGet = 17,
    /// Pop value, pop index, pop collection, do
    /// `collection[index] = value`.
    IndexSet = 18,
    /// Call with u8 arguments; second u8 operand is the spread flag.
    Call = 19,
    /// Return; the u8 operand is 1 when a value is on the stack.
    Return = 20,
    /// Push globals[u16].
    GetGlobal = 21,
    /// Pop into globals[u16].
    SetGlobal = 22,
    /// Push the local at slot u8 (reading through a capture cell).
    GetLocal = 23,
    /// Pop into the local at slot u8 (writing through a capture
    /// cell).
    SetLocal = 24,
    /// Pop into the local at slot u8, bypassing capture cells.
    DefineLocal = 25,
    /// Push builtin function u8.
    GetBuiltin = 26,
    /// Pop u8 capture cells; push a closure over the function
    /// prototype in constants[u16].
    Closure = 27,
    /// Push free-variable u8 of the current closure.
    GetFree = 28,
    /// Pop into free-variable u8 of the current closure.
    SetFree = 29,
    /// Promote the local at slot u8 to a heap cell and push the
    /// cell.
    GetLocalPtr = 30,
    /// Push the cell behind free-variable u8.
    GetFreePtr = 31,
    /// Pop a value, push an iterator over it.
    IteratorInit = 32,
    /// Pop an iterator, advance it, push whether an element is
    /// available. (The iterator lives in a local slot.)
    IteratorNext = 33,
    /// Pop an iterator, push its current key.
    IteratorKey = 34,
    /// Pop an iterator, push its current value.
    IteratorValue = 35,
    /// Pop a value, push `error(value)`.
    Error = 36,
    /// Pop an array or map, push its deep-immutable counterpart.
    Immutable = 37,
    /// Pop a value; fail unless it is an array of exactly u8
    /// elements. Used by multi-assignment.
    Destructure = 38,
}

impl Opcode {
    /// Decode a raw byte.
    pub fn from_u8(byte: u8) -> Option<Opcode> {
        Some(match byte {
            0 => Opcode::Constant,
            1 => Opcode::Pop,
            2 => Opcode::True,
            3 => Opcode::False,
            4 => Opcode::Null,
            5 => Opcode::BinaryOp,
            6 => Opcode::Equal,
            7 => Opcode::NotEqual,
            8 => Opcode::LNot,
            9 => Opcode::BNot,
            10 => Opcode::Minus,
            11 => Opcode::JumpFalsy,
            12 => Opcode::AndJump,
            13 => Opcode::OrJump,
            14 => Opcode::Jump,
            15 => Opcode::Array,
            16 => Opcode::Map,
            17 => Opcode::IndexGet,
            18 => Opcode::IndexSet,
            19 => Opcode::Call,
            20 => Opcode::Return,
            21 => Opcode::GetGlobal,
            22 => Opcode::SetGlobal,
            23 => Opcode::GetLocal,
            24 => Opcode::SetLocal,
            25 => Opcode::DefineLocal,
            26 => Opcode::GetBuiltin,
            27 => Opcode::Closure,
            28 => Opcode::GetFree,
            29 => Opcode::SetFree,
            30 => Opcode::GetLocalPtr,
            31 => Opcode::GetFreePtr,
            32 => Opcode::IteratorInit,
            33 => Opcode::IteratorNext,
            34 => Opcode::IteratorKey,
            35 => Opcode::IteratorValue,
            36 => Opcode::Error,
            37 => Opcode::Immutable,
            38 => Opcode::Destructure,
            _ => return None,
        })
    }

    /// Operand byte-widths, in operand order.
    pub fn operand_widths(self) -> &'static [usize] {
        match self {
            Opcode::Constant
            | Opcode::JumpFalsy
            | Opcode::AndJump
            | Opcode::OrJump
            | Opcode::Jump
            | Opcode::Array
            | Opcode::Map
            | Opcode::GetGlobal
            | Opcode::SetGlobal => &[2],
            Opcode::BinaryOp
            | Opcode::Return
            | Opcode::GetLocal
            | Opcode::SetLocal
            | Opcode::DefineLocal
            | Opcode::GetBuiltin
            | Opcode::GetFree
            | Opcode::SetFree
            | Opcode::GetLocalPtr
            | Opcode::GetFreePtr
            | Opcode::Destructure => &[1],
            Opcode::Call => &[1, 1],
            Opcode::Closure => &[2, 1],
            _ => &[],
        }
    }

    /// Mnemonic for disassembly.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Constant => "CONST",
            Opcode::Pop => "POP",
            Opcode::True => "TRUE",
            Opcode::False => "FALSE",
            Opcode::Null => "NULL",
            Opcode::BinaryOp => "BINOP",
            Opcode::Equal => "EQ",
            Opcode::NotEqual => "NEQ",
            Opcode::LNot => "LNOT",
            Opcode::BNot => "BNOT",
            Opcode::Minus => "NEG",
            Opcode::JumpFalsy => "JMPF",
            Opcode::AndJump => "ANDJMP",
            Opcode::OrJump => "ORJMP",
            Opcode::Jump => "JMP",
            Opcode::Array => "ARRAY",
            Opcode::Map => "MAP",
            Opcode::IndexGet => "IDXGET",
            Opcode::IndexSet => "IDXSET",
            Opcode::Call => "CALL",
            Opcode::Return => "RET",
            Opcode::GetGlobal => "GETG",
            Opcode::SetGlobal => "SETG",
            Opcode::GetLocal => "GETL",
            Opcode::SetLocal => "SETL",
            Opcode::DefineLocal => "DEFL",
            Opcode::GetBuiltin => "GETB",
            Opcode::Closure => "CLOSURE",
            Opcode::GetFree => "GETF",
            Opcode::SetFree => "SETF",
            Opcode::GetLocalPtr => "GETLP",
            Opcode::GetFreePtr => "GETFP",
            Opcode::IteratorInit => "ITER",
            Opcode::IteratorNext => "ITNXT",
            Opcode::IteratorKey => "ITKEY",
            Opcode::IteratorValue => "ITVAL",
            Opcode::Error => "ERROR",
            Opcode::Immutable => "IMMUT",
            Opcode::Destructure => "DESTR",
        }
    }
}

/// Append an encoded instruction to `buf` and return its offset.
pub fn emit_instruction(buf: &mut Vec<u8>, op: Opcode, operands: &[usize]) -> usize {
    let offset = buf.len();
    buf.push(op as u8);
    for (operand, width) in operands.iter().zip(op.operand_widths()) {
        match width {
            1 => buf.push(*operand as u8),
            2 => buf.extend_from_slice(&(*operand as u16).to_le_bytes()),
            _ => unreachable!("unsupported operand width"),
        }
    }
    offset
}

/// Decode the operands of `op` at `offset` (which points just past
/// the opcode byte). Returns the operands and the number of bytes
/// read.
pub fn read_operands(op: Opcode, code: &[u8], offset: usize) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(2);
    let mut read = 0;
    for width in op.operand_widths() {
        match width {
            1 => {
                operands.push(code[offset + read] as usize);
                read += 1;
            }
            2 => {
                let bytes = [code[offset + read], code[offset + read + 1]];
                operands.push(u16::from_le_bytes(bytes) as usize);
                read += 2;
            }
            _ => unreachable!("unsupported operand width"),
        }
    }
    (operands, read)
}

/// Render an instruction buffer one instruction per line, for tests
/// and the CLI disassembler.
pub fn format_instructions(code: &[u8]) -> String {
    let mut out = String::new();
    let mut ip = 0;
    while ip < code.len() {
        let Some(op) = Opcode::from_u8(code[ip]) else {
            let _ = writeln!(out, "{:04} <bad opcode {}>", ip, code[ip]);
            break;
        };
        let (operands, read) = read_operands(op, code, ip + 1);
        let _ = write!(out, "{:04} {}", ip, op.name());
        for operand in &operands {
            let _ = write!(out, " {}", operand);
        }
        let _ = writeln!(out);
        ip += 1 + read;
    }
    out
}

/// The byte length of the instruction starting at `ip`.
pub fn instruction_len(op: Opcode) -> usize {
    1 + op.operand_widths().iter().sum::<usize>()
}
