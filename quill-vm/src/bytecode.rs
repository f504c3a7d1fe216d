// quill-vm - Bytecode compiler and virtual machine for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Compiled units and their serialized form.
//!
//! A persisted unit is self-describing: magic, format version, the
//! main function, and the constant pool with one tag per entry.
//! Function constants encode recursively; builtin-module constants
//! encode as their module name and are rebound through the module
//! map at decode time. The byte layout is an implementation detail —
//! only the encode/decode round-trip is contractual.

use std::rc::Rc;
use std::str::FromStr;

use num_bigint::{BigInt, Sign};

use quill_core::value::{CompiledFunction, FuncProto, Value};
use quill_core::{Result, RuntimeError};
use quill_parser::Pos;

use crate::module_map::{ModuleMap, MODULE_NAME_KEY};

/// Serialized-unit magic bytes.
pub const MAGIC: &[u8; 4] = b"QLBC";

/// Serialized-unit format version.
pub const FORMAT_VERSION: u16 = 1;

/// A compiled unit: the main function plus the constant pool it (and
/// every nested function) indexes into.
#[derive(Debug, Clone)]
pub struct Unit {
    pub main: Rc<FuncProto>,
    pub constants: Vec<Value>,
}

// Constant tags.
const TAG_INT: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_CHAR: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_BIGINT: u8 = 4;
const TAG_BIGFLOAT: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_BOOL: u8 = 7;
const TAG_NULL: u8 = 8;
const TAG_FUNCTION: u8 = 9;
const TAG_MODULE: u8 = 10;

impl Unit {
    /// Serialize the unit.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        encode_proto(&mut out, &self.main);
        write_u32(&mut out, self.constants.len() as u32);
        for constant in &self.constants {
            encode_constant(&mut out, constant)?;
        }
        Ok(out)
    }

    /// Deserialize a unit, rebinding module references through
    /// `modules`.
    pub fn decode(bytes: &[u8], modules: &ModuleMap) -> Result<Unit> {
        let mut r = Reader { bytes, at: 0 };
        let magic = r.take(4)?;
        if magic != MAGIC {
            return Err(RuntimeError::custom("not a compiled unit"));
        }
        let version = r.read_u16()?;
        if version != FORMAT_VERSION {
            return Err(RuntimeError::custom(format!(
                "unsupported unit format version {}",
                version
            )));
        }
        let main = Rc::new(decode_proto(&mut r)?);
        let count = r.read_u32()? as usize;
        let mut constants = Vec::with_capacity(count);
        for _ in 0..count {
            constants.push(decode_constant(&mut r, modules)?);
        }
        if r.at != bytes.len() {
            return Err(RuntimeError::custom("trailing bytes after unit"));
        }
        Ok(Unit { main, constants })
    }
}

fn write_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

fn encode_proto(out: &mut Vec<u8>, proto: &FuncProto) {
    write_bytes(out, &proto.instructions);
    write_u32(out, proto.num_locals as u32);
    write_u32(out, proto.num_params as u32);
    out.push(proto.variadic as u8);
    write_u32(out, proto.source_map.len() as u32);
    for (offset, pos) in &proto.source_map {
        write_u32(out, *offset);
        write_u32(out, pos.0);
    }
}

fn encode_constant(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Int(v) => {
            out.push(TAG_INT);
            out.extend_from_slice(&v.to_le_bytes());
        }
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        Value::Char(c) => {
            out.push(TAG_CHAR);
            write_u32(out, *c as u32);
        }
        Value::Str(s) => {
            out.push(TAG_STRING);
            write_bytes(out, s.borrow().text.as_bytes());
        }
        Value::BigInt(v) => {
            out.push(TAG_BIGINT);
            let (sign, mag) = v.to_bytes_le();
            out.push(match sign {
                Sign::Minus => 0,
                Sign::NoSign => 1,
                Sign::Plus => 2,
            });
            write_bytes(out, &mag);
        }
        Value::BigFloat(v) => {
            out.push(TAG_BIGFLOAT);
            write_bytes(out, v.to_string().as_bytes());
        }
        Value::Bytes(b) => {
            out.push(TAG_BYTES);
            write_bytes(out, &b.borrow());
        }
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(*v as u8);
        }
        Value::Null => out.push(TAG_NULL),
        Value::CompiledFunction(f) => {
            out.push(TAG_FUNCTION);
            encode_proto(out, &f.proto);
        }
        Value::ImmutableMap(m) => {
            // Builtin modules are encoded by name only.
            let name = m.get(MODULE_NAME_KEY).map(|v| match v {
                Value::Str(s) => s.borrow().text.clone(),
                other => other.to_string(),
            });
            match name {
                Some(name) => {
                    out.push(TAG_MODULE);
                    write_bytes(out, name.as_bytes());
                }
                None => {
                    return Err(RuntimeError::custom(
                        "cannot encode constant: immutable map is not a module",
                    ));
                }
            }
        }
        other => {
            return Err(RuntimeError::custom(format!(
                "cannot encode constant of type {}",
                other.type_name()
            )));
        }
    }
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.at + n > self.bytes.len() {
            return Err(RuntimeError::custom("truncated unit"));
        }
        let slice = &self.bytes[self.at..self.at + n];
        self.at += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("eight bytes")))
    }

    fn read_blob(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    fn read_string(&mut self) -> Result<String> {
        let blob = self.read_blob()?;
        String::from_utf8(blob.to_vec())
            .map_err(|_| RuntimeError::custom("invalid UTF-8 in unit"))
    }
}

fn decode_proto(r: &mut Reader<'_>) -> Result<FuncProto> {
    let instructions = r.read_blob()?.to_vec();
    let num_locals = r.read_u32()? as usize;
    let num_params = r.read_u32()? as usize;
    let variadic = r.read_u8()? != 0;
    let map_len = r.read_u32()? as usize;
    let mut source_map = Vec::with_capacity(map_len);
    for _ in 0..map_len {
        let offset = r.read_u32()?;
        let pos = Pos(r.read_u32()?);
        source_map.push((offset, pos));
    }
    Ok(FuncProto {
        instructions,
        num_locals,
        num_params,
        variadic,
        source_map,
    })
}

fn decode_constant(r: &mut Reader<'_>, modules: &ModuleMap) -> Result<Value> {
    let tag = r.read_u8()?;
    match tag {
        TAG_INT => Ok(Value::Int(r.read_u64()? as i64)),
        TAG_FLOAT => Ok(Value::Float(f64::from_bits(r.read_u64()?))),
        TAG_CHAR => {
            let code = r.read_u32()?;
            char::from_u32(code)
                .map(Value::Char)
                .ok_or_else(|| RuntimeError::custom("invalid char in unit"))
        }
        TAG_STRING => Ok(Value::string(r.read_string()?)),
        TAG_BIGINT => {
            let sign = match r.read_u8()? {
                0 => Sign::Minus,
                1 => Sign::NoSign,
                2 => Sign::Plus,
                _ => return Err(RuntimeError::custom("invalid bigint sign in unit")),
            };
            let mag = r.read_blob()?;
            Ok(Value::bigint(BigInt::from_bytes_le(sign, mag)))
        }
        TAG_BIGFLOAT => {
            let text = r.read_string()?;
            bigdecimal::BigDecimal::from_str(&text)
                .map(Value::bigfloat)
                .map_err(|_| RuntimeError::custom("invalid bigfloat in unit"))
        }
        TAG_BYTES => Ok(Value::bytes(r.read_blob()?.to_vec())),
        TAG_BOOL => Ok(Value::Bool(r.read_u8()? != 0)),
        TAG_NULL => Ok(Value::Null),
        TAG_FUNCTION => {
            let proto = Rc::new(decode_proto(r)?);
            Ok(Value::CompiledFunction(Rc::new(CompiledFunction::new(
                proto,
            ))))
        }
        TAG_MODULE => {
            let name = r.read_string()?;
            modules
                .import_value(&name)
                .ok_or(RuntimeError::MissingModule(name))
        }
        _ => Err(RuntimeError::custom(format!(
            "unknown constant tag {} in unit",
            tag
        ))),
    }
}
