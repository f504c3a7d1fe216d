// quill-core - Value model for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The runtime value universe.
//!
//! `Value` is the central enum with one case per language type.
//! Reference types (`String`, `Bytes`, `Array`, `Map`) share their
//! payload through `Rc<RefCell<..>>` so aliases observe mutation;
//! the immutable variants share a frozen payload through a plain
//! `Rc`. The `Cell`, `Iterator` and `VmHandle` variants are VM
//! plumbing and never reachable from program-visible data.

use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Local};
use im::{OrdMap, Vector};
use num_bigint::BigInt;
use num_complex::Complex64;
use num_traits::Zero;

use quill_parser::Pos;

use crate::error::{Result, RuntimeError};
use crate::iter::ValueIterator;
use crate::vm_access::VmHandle;

/// Maximum byte length of a string value.
pub const MAX_STRING_LEN: usize = 2147483647;

/// Maximum length of a bytes value.
pub const MAX_BYTES_LEN: usize = 2147483647;

/// A shared mutable slot. Globals, closure captures and pointer
/// targets are all cells.
pub type CellRef = Rc<RefCell<Value>>;

/// Allocate a fresh cell holding `value`.
pub fn new_cell(value: Value) -> CellRef {
    Rc::new(RefCell::new(value))
}

/// String payload: the text plus a lazily built Unicode-scalar index
/// used for `Char` indexing.
#[derive(Debug, Clone)]
pub struct StrValue {
    pub text: String,
    chars: Option<Vec<char>>,
}

impl StrValue {
    pub fn new(text: impl Into<String>) -> StrValue {
        StrValue {
            text: text.into(),
            chars: None,
        }
    }

    /// The scalar index, built on first use and invalidated on write.
    pub fn chars(&mut self) -> &[char] {
        if self.chars.is_none() {
            self.chars = Some(self.text.chars().collect());
        }
        self.chars.as_deref().unwrap()
    }

    /// Replace the scalar at `index` and rebuild the text.
    pub fn set_char(&mut self, index: usize, c: char) -> Result<()> {
        let mut chars: Vec<char> = self.text.chars().collect();
        if index >= chars.len() {
            return Err(RuntimeError::IndexOutOfBounds);
        }
        chars[index] = c;
        self.text = chars.iter().collect();
        self.chars = Some(chars);
        Ok(())
    }
}

/// The shared, per-function part of a compiled function.
#[derive(Debug, Clone)]
pub struct FuncProto {
    /// Flat instruction buffer.
    pub instructions: Vec<u8>,
    /// Number of local slots (parameters included).
    pub num_locals: usize,
    /// Number of declared parameters.
    pub num_params: usize,
    /// Whether the final parameter packs excess arguments.
    pub variadic: bool,
    /// Instruction offset → source position, sorted by offset. Only
    /// offsets that begin a new AST node are recorded.
    pub source_map: Vec<(u32, Pos)>,
}

impl FuncProto {
    /// The source position of the instruction at `ip`: the innermost
    /// recorded offset at or before it.
    pub fn source_pos(&self, ip: usize) -> Pos {
        let ip = ip as u32;
        match self.source_map.binary_search_by_key(&ip, |(off, _)| *off) {
            Ok(i) => self.source_map[i].1,
            Err(0) => Pos::NONE,
            Err(i) => self.source_map[i - 1].1,
        }
    }
}

/// A compiled function value: shared prototype plus this closure's
/// captured cells.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub proto: Rc<FuncProto>,
    /// Captured free-variable cells, shared with the frame (and any
    /// sibling closures) that created them.
    pub free: Vec<CellRef>,
}

impl CompiledFunction {
    pub fn new(proto: Rc<FuncProto>) -> CompiledFunction {
        CompiledFunction {
            proto,
            free: Vec::new(),
        }
    }
}

/// A built-in function registry entry. The registry is process-wide
/// and read-only; values reference entries by `&'static`.
pub struct BuiltinFunction {
    pub name: &'static str,
    pub func: fn(&[Value]) -> Result<Value>,
    /// When set, the VM prepends a `VmHandle` to the arguments.
    pub vm_aware: bool,
}

impl fmt::Debug for BuiltinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltinFunction({})", self.name)
    }
}

/// A native function supplied by the embedder (or synthesized as a
/// bound method such as `array.push`).
pub struct UserFunction {
    pub name: String,
    pub func: Box<dyn Fn(&[Value]) -> Result<Value>>,
}

impl UserFunction {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> UserFunction {
        UserFunction {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserFunction({})", self.name)
    }
}

/// A pointer value: a reference cell plus its opaque address.
#[derive(Debug)]
pub struct PointerValue {
    /// The referenced slot. For globals this is the global's own
    /// cell; for the fallback path it is a detached cell.
    pub slot: CellRef,
    /// Opaque address for display and equality.
    pub address: usize,
}

impl PointerValue {
    pub fn new(slot: CellRef) -> PointerValue {
        let address = Rc::as_ptr(&slot) as usize;
        PointerValue { slot, address }
    }
}

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    BigInt(Rc<BigInt>),
    BigFloat(Rc<BigDecimal>),
    Complex(Complex64),
    Bool(bool),
    Char(char),
    Str(Rc<RefCell<StrValue>>),
    Bytes(Rc<RefCell<Vec<u8>>>),
    Time(DateTime<Local>),
    Null,
    Array(Rc<RefCell<Vector<Value>>>),
    ImmutableArray(Rc<Vector<Value>>),
    Map(Rc<RefCell<OrdMap<String, Value>>>),
    ImmutableMap(Rc<OrdMap<String, Value>>),
    /// Always-falsy error wrapper around an inner value.
    Error(Rc<Value>),
    CompiledFunction(Rc<CompiledFunction>),
    Builtin(&'static BuiltinFunction),
    UserFunction(Rc<UserFunction>),
    Pointer(Rc<PointerValue>),
    /// A closure capture cell. VM plumbing; never program-visible.
    Cell(CellRef),
    /// Iteration state. VM plumbing; never program-visible.
    Iterator(Rc<RefCell<ValueIterator>>),
    /// Handle to the running VM for VM-aware builtins.
    VmHandle(VmHandle),
}

// ----------------------------------------------------------------------
// Constructors
// ----------------------------------------------------------------------

impl Value {
    pub fn string(text: impl Into<String>) -> Value {
        Value::Str(Rc::new(RefCell::new(StrValue::new(text))))
    }

    pub fn bytes(bytes: Vec<u8>) -> Value {
        Value::Bytes(Rc::new(RefCell::new(bytes)))
    }

    pub fn array(elements: impl IntoIterator<Item = Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements.into_iter().collect())))
    }

    pub fn immutable_array(elements: impl IntoIterator<Item = Value>) -> Value {
        Value::ImmutableArray(Rc::new(elements.into_iter().collect()))
    }

    pub fn map(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries.into_iter().collect())))
    }

    pub fn immutable_map(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::ImmutableMap(Rc::new(entries.into_iter().collect()))
    }

    pub fn error(inner: Value) -> Value {
        Value::Error(Rc::new(inner))
    }

    /// Wrap a host error message as an error value.
    pub fn error_msg(message: impl Into<String>) -> Value {
        Value::error(Value::string(message.into()))
    }

    pub fn bigint(v: BigInt) -> Value {
        Value::BigInt(Rc::new(v))
    }

    pub fn bigfloat(v: BigDecimal) -> Value {
        Value::BigFloat(Rc::new(v))
    }

    pub fn user_function(
        name: impl Into<String>,
        func: impl Fn(&[Value]) -> Result<Value> + 'static,
    ) -> Value {
        Value::UserFunction(Rc::new(UserFunction::new(name, func)))
    }

    pub fn from_bool(b: bool) -> Value {
        Value::Bool(b)
    }
}

// ----------------------------------------------------------------------
// Capability contract
// ----------------------------------------------------------------------

impl Value {
    /// The language-level type name.
    pub fn type_name(&self) -> Cow<'static, str> {
        match self {
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::BigInt(_) => "bigint".into(),
            Value::BigFloat(_) => "bigfloat".into(),
            Value::Complex(_) => "complex".into(),
            Value::Bool(_) => "bool".into(),
            Value::Char(_) => "char".into(),
            Value::Str(_) => "string".into(),
            Value::Bytes(_) => "bytes".into(),
            Value::Time(_) => "time".into(),
            Value::Null => "null".into(),
            Value::Array(_) => "array".into(),
            Value::ImmutableArray(_) => "immutable-array".into(),
            Value::Map(_) => "map".into(),
            Value::ImmutableMap(_) => "immutable-map".into(),
            Value::Error(_) => "error".into(),
            Value::CompiledFunction(_) => "compiled-function".into(),
            Value::Builtin(b) => format!("builtin-function:{}", b.name).into(),
            Value::UserFunction(u) => format!("user-function:{}", u.name).into(),
            Value::Pointer(_) => "pointer".into(),
            Value::Cell(_) => "<free-var>".into(),
            Value::Iterator(_) => "<iterator>".into(),
            Value::VmHandle(_) => "<vm>".into(),
        }
    }

    /// Falsiness per the language rules: empty collections, zero
    /// numbers, NaN floats, the zero char, `false`, `null` and every
    /// error value are falsy.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Int(v) => *v == 0,
            Value::Float(v) => v.is_nan(),
            Value::BigInt(v) => v.is_zero(),
            Value::BigFloat(v) => v.is_zero(),
            Value::Complex(v) => v.re == 0.0 && v.im == 0.0,
            Value::Bool(v) => !v,
            Value::Char(c) => *c == '\0',
            Value::Str(s) => s.borrow().text.is_empty(),
            Value::Bytes(b) => b.borrow().is_empty(),
            Value::Time(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
            Value::Null => true,
            Value::Array(a) => a.borrow().is_empty(),
            Value::ImmutableArray(a) => a.is_empty(),
            Value::Map(m) => m.borrow().is_empty(),
            Value::ImmutableMap(m) => m.is_empty(),
            Value::Error(_) => true,
            _ => false,
        }
    }

    /// Equality per the language rules. Numeric equality does not
    /// cross type boundaries; arrays and maps compare against their
    /// immutable counterparts elementwise; errors compare by
    /// identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::BigFloat(a), Value::BigFloat(b)) => a == b,
            (Value::Complex(a), Value::Complex(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a.borrow().text == b.borrow().text,
            (Value::Bytes(a), Value::Bytes(b)) => *a.borrow() == *b.borrow(),
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Array(_), _)
            | (Value::ImmutableArray(_), _)
            | (Value::Map(_), _)
            | (Value::ImmutableMap(_), _) => self.sequence_equals(other),
            (Value::Pointer(a), Value::Pointer(b)) => Rc::ptr_eq(&a.slot, &b.slot),
            (Value::Cell(a), Value::Cell(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn sequence_equals(&self, other: &Value) -> bool {
        match (self.as_array_payload(), other.as_array_payload()) {
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            _ => match (self.as_map_payload(), other.as_map_payload()) {
                (Some(a), Some(b)) => {
                    a.len() == b.len()
                        && a.iter().all(|(k, v)| {
                            b.get(k).map(|other_v| v.equals(other_v)).unwrap_or(false)
                        })
                }
                _ => false,
            },
        }
    }

    /// Snapshot of the element sequence for array-like values.
    pub fn as_array_payload(&self) -> Option<Vector<Value>> {
        match self {
            Value::Array(a) => Some(a.borrow().clone()),
            Value::ImmutableArray(a) => Some((**a).clone()),
            _ => None,
        }
    }

    /// Snapshot of the mapping for map-like values.
    pub fn as_map_payload(&self) -> Option<OrdMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m.borrow().clone()),
            Value::ImmutableMap(m) => Some((**m).clone()),
            _ => None,
        }
    }

    /// Deep copy. Reference-cell semantics are preserved: pointer
    /// and cell variants copy as themselves, and a copy of an
    /// immutable container is the corresponding mutable container.
    pub fn copy_value(&self) -> Value {
        match self {
            Value::Str(s) => Value::string(s.borrow().text.clone()),
            Value::Bytes(b) => Value::bytes(b.borrow().clone()),
            Value::Array(a) => {
                Value::array(a.borrow().iter().map(|v| v.copy_value()))
            }
            Value::ImmutableArray(a) => Value::array(a.iter().map(|v| v.copy_value())),
            Value::Map(m) => Value::map(
                m.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.copy_value())),
            ),
            Value::ImmutableMap(m) => {
                Value::map(m.iter().map(|(k, v)| (k.clone(), v.copy_value())))
            }
            Value::Error(inner) => Value::error(inner.copy_value()),
            Value::CompiledFunction(f) => {
                // Free cells are shared, not copied; they are variable
                // references.
                Value::CompiledFunction(Rc::new(CompiledFunction {
                    proto: Rc::clone(&f.proto),
                    free: f.free.clone(),
                }))
            }
            other => other.clone(),
        }
    }

    /// Whether the value supports `call`.
    pub fn can_call(&self) -> bool {
        matches!(
            self,
            Value::CompiledFunction(_) | Value::Builtin(_) | Value::UserFunction(_)
        )
    }

    /// Whether the value supports iteration.
    pub fn can_iterate(&self) -> bool {
        matches!(
            self,
            Value::Array(_)
                | Value::ImmutableArray(_)
                | Value::Map(_)
                | Value::ImmutableMap(_)
                | Value::Str(_)
                | Value::Bytes(_)
                | Value::Null
        )
    }

    /// Reference identity, used by pointer lookup and the pretty
    /// printer's visited set. Non-reference variants have no
    /// identity.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(Rc::as_ptr(s) as usize),
            Value::Bytes(b) => Some(Rc::as_ptr(b) as usize),
            Value::Array(a) => Some(Rc::as_ptr(a) as usize),
            Value::ImmutableArray(a) => Some(Rc::as_ptr(a) as usize),
            Value::Map(m) => Some(Rc::as_ptr(m) as usize),
            Value::ImmutableMap(m) => Some(Rc::as_ptr(m) as usize),
            Value::Error(e) => Some(Rc::as_ptr(e) as usize),
            Value::BigInt(v) => Some(Rc::as_ptr(v) as usize),
            Value::BigFloat(v) => Some(Rc::as_ptr(v) as usize),
            Value::CompiledFunction(f) => Some(Rc::as_ptr(f) as usize),
            Value::UserFunction(u) => Some(Rc::as_ptr(u) as usize),
            Value::Pointer(p) => Some(Rc::as_ptr(p) as usize),
            Value::Cell(c) => Some(Rc::as_ptr(c) as usize),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------
// Display
// ----------------------------------------------------------------------

/// Default Time display format: `DD/MM/YYYY H:MMAM/PM`.
pub const TIME_FORMAT: &str = "%d/%m/%Y %-I:%M%p";

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::BigFloat(v) => write!(f, "{}", v.normalized()),
            Value::Complex(v) => {
                if v.im < 0.0 {
                    write!(f, "({}-{}i)", format_float(v.re), format_float(-v.im))
                } else {
                    write!(f, "({}+{}i)", format_float(v.re), format_float(v.im))
                }
            }
            Value::Bool(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            Value::Char(c) => write!(f, "{}", c),
            Value::Str(s) => write!(f, "{:?}", s.borrow().text),
            Value::Bytes(b) => {
                let b = b.borrow();
                write!(f, "[")?;
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", byte)?;
                }
                write!(f, "]")
            }
            Value::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
            Value::Null => write!(f, "null"),
            Value::Array(a) => write_sequence(f, a.borrow().iter()),
            Value::ImmutableArray(a) => write_sequence(f, a.iter()),
            Value::Map(m) => write_mapping(f, m.borrow().iter()),
            Value::ImmutableMap(m) => write_mapping(f, m.iter()),
            Value::Error(inner) => write!(f, "error: {}", inner),
            Value::CompiledFunction(_) => write!(f, "<compiled-function>"),
            Value::Builtin(_) => write!(f, "<builtin-function>"),
            Value::UserFunction(_) => write!(f, "<user-function>"),
            Value::Pointer(p) => write!(f, "<pointer:0x{:x}>", p.address),
            Value::Cell(_) => write!(f, "free-var"),
            Value::Iterator(_) => write!(f, "<iterator>"),
            Value::VmHandle(_) => write!(f, "<vm>"),
        }
    }
}

/// Shortest round-trip rendering for floats, with a trailing `.0`
/// never added (`1` prints as `1`).
pub fn format_float(v: f64) -> String {
    if v.is_infinite() {
        return if v > 0.0 { "+Inf".into() } else { "-Inf".into() };
    }
    if v.is_nan() {
        return "NaN".into();
    }
    format!("{}", v)
}

fn write_sequence<'a>(
    f: &mut fmt::Formatter<'_>,
    elements: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    write!(f, "[")?;
    for (i, e) in elements.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", e)?;
    }
    write!(f, "]")
}

fn write_mapping<'a>(
    f: &mut fmt::Formatter<'_>,
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (i, (k, v)) in entries.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", k, v)?;
    }
    write!(f, "}}")
}
