// quill-core - Binary operator dispatch for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! Binary operator semantics.
//!
//! Dispatch is resolved on the left operand first. Numeric promotion:
//! Int⊕Float → Float, anything⊕BigInt → BigInt (floats truncate),
//! anything⊕BigFloat → BigFloat. Division by zero is not an error —
//! it yields Float `+Inf` on every numeric path, BigInt and BigFloat
//! included.

use std::rc::Rc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use quill_parser::BinOp;

use crate::error::{Result, RuntimeError};
use crate::value::{Value, MAX_BYTES_LEN, MAX_STRING_LEN};

impl Value {
    /// Apply `self op rhs`. Returns `InvalidOperator` when the
    /// combination is not defined.
    pub fn binary_op(&self, op: BinOp, rhs: &Value) -> Result<Value> {
        match self {
            Value::Int(a) => int_binary_op(*a, op, rhs),
            Value::Float(a) => float_binary_op(*a, op, rhs),
            Value::BigInt(a) => match rhs {
                Value::BigInt(b) => bigint_binary_op(op, a, b),
                Value::Int(b) => bigint_binary_op(op, a, &BigInt::from(*b)),
                Value::Float(b) => bigint_binary_op(op, a, &float_to_bigint(*b)),
                Value::BigFloat(b) => {
                    bigfloat_binary_op(op, &BigDecimal::from((**a).clone()), b)
                }
                _ => Err(RuntimeError::InvalidOperator),
            },
            Value::BigFloat(a) => match rhs {
                Value::BigFloat(b) => bigfloat_binary_op(op, a, b),
                Value::Float(b) => match BigDecimal::try_from(*b) {
                    Ok(b) => bigfloat_binary_op(op, a, &b),
                    Err(_) => Err(RuntimeError::InvalidOperator),
                },
                Value::Int(b) => bigfloat_binary_op(op, a, &BigDecimal::from(*b)),
                Value::BigInt(b) => {
                    bigfloat_binary_op(op, a, &BigDecimal::from((**b).clone()))
                }
                _ => Err(RuntimeError::InvalidOperator),
            },
            Value::Complex(a) => {
                let b = match rhs {
                    Value::Complex(b) => *b,
                    Value::Int(b) => (*b as f64).into(),
                    Value::Float(b) => (*b).into(),
                    _ => return Err(RuntimeError::InvalidOperator),
                };
                let r = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Quo => a / b,
                    _ => return Err(RuntimeError::InvalidOperator),
                };
                Ok(Value::Complex(r))
            }
            Value::Char(a) => char_binary_op(*a, op, rhs),
            Value::Str(a) => match op {
                BinOp::Add => {
                    let lhs = a.borrow().text.clone();
                    let rhs_str = match rhs {
                        Value::Str(b) => b.borrow().text.clone(),
                        other => other.to_string(),
                    };
                    if lhs.len() + rhs_str.len() > MAX_STRING_LEN {
                        return Err(RuntimeError::StringLimit);
                    }
                    Ok(Value::string(lhs + &rhs_str))
                }
                BinOp::Less | BinOp::Greater | BinOp::LessEq | BinOp::GreaterEq => match rhs {
                    Value::Str(b) => {
                        let a = &a.borrow().text;
                        let b = &b.borrow().text;
                        Ok(Value::Bool(match op {
                            BinOp::Less => a < b,
                            BinOp::Greater => a > b,
                            BinOp::LessEq => a <= b,
                            _ => a >= b,
                        }))
                    }
                    _ => Err(RuntimeError::InvalidOperator),
                },
                _ => Err(RuntimeError::InvalidOperator),
            },
            Value::Bytes(a) => match (op, rhs) {
                (BinOp::Add, Value::Bytes(b)) => {
                    let mut out = a.borrow().clone();
                    let b = b.borrow();
                    if out.len() + b.len() > MAX_BYTES_LEN {
                        return Err(RuntimeError::BytesLimit);
                    }
                    out.extend_from_slice(&b);
                    Ok(Value::bytes(out))
                }
                _ => Err(RuntimeError::InvalidOperator),
            },
            Value::Time(a) => match rhs {
                Value::Int(ns) => match op {
                    // time ± int treats the int as nanoseconds
                    BinOp::Add => Ok(Value::Time(*a + chrono::Duration::nanoseconds(*ns))),
                    BinOp::Sub => Ok(Value::Time(*a - chrono::Duration::nanoseconds(*ns))),
                    _ => Err(RuntimeError::InvalidOperator),
                },
                Value::Time(b) => match op {
                    BinOp::Sub => {
                        let d = (*a - *b).num_nanoseconds().unwrap_or(i64::MAX);
                        Ok(Value::Int(d))
                    }
                    BinOp::Less => Ok(Value::Bool(a < b)),
                    BinOp::Greater => Ok(Value::Bool(a > b)),
                    BinOp::LessEq => Ok(Value::Bool(a <= b)),
                    BinOp::GreaterEq => Ok(Value::Bool(a >= b)),
                    _ => Err(RuntimeError::InvalidOperator),
                },
                _ => Err(RuntimeError::InvalidOperator),
            },
            Value::Array(a) => match (op, rhs) {
                (BinOp::Add, Value::Array(b)) => {
                    let mut out = a.borrow().clone();
                    out.append(b.borrow().clone());
                    Ok(Value::Array(Rc::new(std::cell::RefCell::new(out))))
                }
                _ => Err(RuntimeError::InvalidOperator),
            },
            Value::ImmutableArray(a) => match (op, rhs) {
                // concatenation of two frozen arrays yields a mutable one
                (BinOp::Add, Value::ImmutableArray(b)) => {
                    let mut out = (**a).clone();
                    out.append((**b).clone());
                    Ok(Value::Array(Rc::new(std::cell::RefCell::new(out))))
                }
                _ => Err(RuntimeError::InvalidOperator),
            },
            _ => Err(RuntimeError::InvalidOperator),
        }
    }
}

fn int_binary_op(a: i64, op: BinOp, rhs: &Value) -> Result<Value> {
    match rhs {
        Value::Int(b) => {
            let b = *b;
            let r = match op {
                BinOp::Add => Value::Int(a.wrapping_add(b)),
                BinOp::Sub => Value::Int(a.wrapping_sub(b)),
                BinOp::Mul => Value::Int(a.wrapping_mul(b)),
                BinOp::Quo => {
                    if b == 0 {
                        Value::Float(f64::INFINITY)
                    } else {
                        Value::Int(a.wrapping_div(b))
                    }
                }
                BinOp::Rem => {
                    if b == 0 {
                        Value::Float(f64::INFINITY)
                    } else {
                        Value::Int(a.wrapping_rem(b))
                    }
                }
                BinOp::And => Value::Int(a & b),
                BinOp::Or => Value::Int(a | b),
                BinOp::Xor => Value::Int(a ^ b),
                BinOp::AndNot => Value::Int(a & !b),
                BinOp::Shl => Value::Int(shift_left(a, b)?),
                BinOp::Shr => Value::Int(shift_right(a, b)?),
                BinOp::Less => Value::Bool(a < b),
                BinOp::Greater => Value::Bool(a > b),
                BinOp::LessEq => Value::Bool(a <= b),
                BinOp::GreaterEq => Value::Bool(a >= b),
            };
            Ok(r)
        }
        Value::Float(b) => float_binary_op_pair(a as f64, op, *b),
        Value::Char(c) => match op {
            BinOp::Add => Ok(Value::Char(int_to_char(a + *c as i64))),
            BinOp::Sub => Ok(Value::Char(int_to_char(a - *c as i64))),
            BinOp::Less => Ok(Value::Bool(a < *c as i64)),
            BinOp::Greater => Ok(Value::Bool(a > *c as i64)),
            BinOp::LessEq => Ok(Value::Bool(a <= *c as i64)),
            BinOp::GreaterEq => Ok(Value::Bool(a >= *c as i64)),
            _ => Err(RuntimeError::InvalidOperator),
        },
        Value::BigInt(b) => bigint_binary_op(op, &BigInt::from(a), b),
        Value::BigFloat(b) => bigfloat_binary_op(op, &BigDecimal::from(a), b),
        _ => Err(RuntimeError::InvalidOperator),
    }
}

fn int_to_char(v: i64) -> char {
    char::from_u32(v as u32).unwrap_or('\u{FFFD}')
}

fn shift_left(a: i64, b: i64) -> Result<i64> {
    if b < 0 {
        return Err(RuntimeError::InvalidOperator);
    }
    if b >= 64 {
        return Ok(0);
    }
    Ok(a.wrapping_shl(b as u32))
}

fn shift_right(a: i64, b: i64) -> Result<i64> {
    if b < 0 {
        return Err(RuntimeError::InvalidOperator);
    }
    if b >= 64 {
        return Ok(if a < 0 { -1 } else { 0 });
    }
    Ok(a.wrapping_shr(b as u32))
}

fn float_binary_op(a: f64, op: BinOp, rhs: &Value) -> Result<Value> {
    match rhs {
        Value::Float(b) => float_binary_op_pair(a, op, *b),
        Value::Int(b) => float_binary_op_pair(a, op, *b as f64),
        Value::BigInt(b) => bigint_binary_op(op, &float_to_bigint(a), b),
        Value::BigFloat(b) => match BigDecimal::try_from(a) {
            Ok(a) => bigfloat_binary_op(op, &a, b),
            Err(_) => Err(RuntimeError::InvalidOperator),
        },
        _ => Err(RuntimeError::InvalidOperator),
    }
}

fn float_binary_op_pair(a: f64, op: BinOp, b: f64) -> Result<Value> {
    let r = match op {
        BinOp::Add => Value::Float(a + b),
        BinOp::Sub => Value::Float(a - b),
        BinOp::Mul => Value::Float(a * b),
        BinOp::Quo => {
            if b == 0.0 {
                Value::Float(f64::INFINITY)
            } else {
                Value::Float(a / b)
            }
        }
        BinOp::Less => Value::Bool(a < b),
        BinOp::Greater => Value::Bool(a > b),
        BinOp::LessEq => Value::Bool(a <= b),
        BinOp::GreaterEq => Value::Bool(a >= b),
        _ => return Err(RuntimeError::InvalidOperator),
    };
    Ok(r)
}

fn char_binary_op(a: char, op: BinOp, rhs: &Value) -> Result<Value> {
    match rhs {
        Value::Char(b) => match op {
            BinOp::Add => Ok(Value::Char(int_to_char(a as i64 + *b as i64))),
            BinOp::Sub => Ok(Value::Char(int_to_char(a as i64 - *b as i64))),
            BinOp::Less => Ok(Value::Bool(a < *b)),
            BinOp::Greater => Ok(Value::Bool(a > *b)),
            BinOp::LessEq => Ok(Value::Bool(a <= *b)),
            BinOp::GreaterEq => Ok(Value::Bool(a >= *b)),
            _ => Err(RuntimeError::InvalidOperator),
        },
        Value::Int(b) => match op {
            BinOp::Add => Ok(Value::Char(int_to_char(a as i64 + b))),
            BinOp::Sub => Ok(Value::Char(int_to_char(a as i64 - b))),
            BinOp::Less => Ok(Value::Bool((a as i64) < *b)),
            BinOp::Greater => Ok(Value::Bool(a as i64 > *b)),
            BinOp::LessEq => Ok(Value::Bool(a as i64 <= *b)),
            BinOp::GreaterEq => Ok(Value::Bool(a as i64 >= *b)),
            _ => Err(RuntimeError::InvalidOperator),
        },
        _ => Err(RuntimeError::InvalidOperator),
    }
}

/// Truncate a float to its integer part as a BigInt.
fn float_to_bigint(v: f64) -> BigInt {
    BigInt::from(v.trunc() as i64)
}

/// Euclidean quotient/remainder: the remainder is always >= 0.
fn bigint_div_rem_euclid(a: &BigInt, b: &BigInt) -> (BigInt, BigInt) {
    let q = a / b;
    let r = a - &q * b;
    if r.is_negative() {
        if b.is_positive() {
            (q - 1, r + b)
        } else {
            (q + 1, r - b)
        }
    } else {
        (q, r)
    }
}

fn bigint_binary_op(op: BinOp, a: &BigInt, b: &BigInt) -> Result<Value> {
    let r = match op {
        BinOp::Add => Value::bigint(a + b),
        BinOp::Sub => Value::bigint(a - b),
        BinOp::Mul => Value::bigint(a * b),
        BinOp::Quo => {
            if b.is_zero() {
                Value::Float(f64::INFINITY)
            } else {
                Value::bigint(bigint_div_rem_euclid(a, b).0)
            }
        }
        BinOp::Rem => {
            if b.is_zero() {
                Value::Float(f64::INFINITY)
            } else {
                Value::bigint(bigint_div_rem_euclid(a, b).1)
            }
        }
        BinOp::And => Value::bigint(a & b),
        BinOp::Or => Value::bigint(a | b),
        BinOp::Xor => Value::bigint(a ^ b),
        BinOp::AndNot => Value::bigint(a & &!b),
        BinOp::Shl => {
            let s = b.to_u64().ok_or(RuntimeError::InvalidOperator)?;
            Value::bigint(a << s)
        }
        BinOp::Shr => {
            let s = b.to_u64().ok_or(RuntimeError::InvalidOperator)?;
            Value::bigint(a >> s)
        }
        BinOp::Less => Value::Bool(a < b),
        BinOp::Greater => Value::Bool(a > b),
        BinOp::LessEq => Value::Bool(a <= b),
        BinOp::GreaterEq => Value::Bool(a >= b),
    };
    Ok(r)
}

fn bigfloat_binary_op(op: BinOp, a: &BigDecimal, b: &BigDecimal) -> Result<Value> {
    let r = match op {
        BinOp::Add => Value::bigfloat(a + b),
        BinOp::Sub => Value::bigfloat(a - b),
        BinOp::Mul => Value::bigfloat(a * b),
        BinOp::Quo => {
            if b.is_zero() {
                Value::Float(f64::INFINITY)
            } else {
                Value::bigfloat(a / b)
            }
        }
        BinOp::Less => Value::Bool(a < b),
        BinOp::Greater => Value::Bool(a > b),
        BinOp::LessEq => Value::Bool(a <= b),
        BinOp::GreaterEq => Value::Bool(a >= b),
        _ => return Err(RuntimeError::InvalidOperator),
    };
    Ok(r)
}
