// quill-core - printf-style formatting for the Quill programming language
// Copyright (c) 2025 The Quill Authors. MIT licensed.

//! The `format` builtin's verb formatter.
//!
//! Supported verbs: `%v %s %q %d %b %o %x %X %f %e %g %c %t %%` with
//! optional `-`/`+`/`0` flags, width and precision. Unknown verbs and
//! argument over/underflow are formatting errors.

use std::fmt::Write;

use crate::convert::{to_f64, to_i64, to_raw_string};
use crate::error::{Result, RuntimeError};
use crate::value::{format_float, Value};

#[derive(Debug, Default)]
struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Format `fmt` with `args`, printf-style.
pub fn format_values(fmt: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut next_arg = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&f) = chars.peek() {
            match f {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                '0' => spec.zero = true,
                _ => break,
            }
            chars.next();
        }
        let mut width = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() {
                width.push(d);
                chars.next();
            } else {
                break;
            }
        }
        if !width.is_empty() {
            spec.width = width.parse().ok();
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut prec = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit() {
                    prec.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            spec.precision = Some(prec.parse().unwrap_or(0));
        }

        let verb = chars
            .next()
            .ok_or_else(|| RuntimeError::custom("format: missing verb after '%'"))?;
        let arg = args.get(next_arg).ok_or_else(|| {
            RuntimeError::custom(format!("format: missing argument for '%{}'", verb))
        })?;
        next_arg += 1;

        let rendered = render(verb, &spec, arg)?;
        pad(&mut out, &rendered, &spec);
    }

    if next_arg < args.len() {
        return Err(RuntimeError::custom(format!(
            "format: {} extra argument(s)",
            args.len() - next_arg
        )));
    }
    Ok(out)
}

fn render(verb: char, spec: &Spec, arg: &Value) -> Result<String> {
    match verb {
        'v' => Ok(arg.to_string()),
        's' => Ok(to_raw_string(arg)),
        'q' => Ok(format!("{:?}", to_raw_string(arg))),
        'd' => {
            let v = require_int(verb, arg)?;
            Ok(if spec.plus && v >= 0 {
                format!("+{}", v)
            } else {
                format!("{}", v)
            })
        }
        'b' => Ok(format!("{:b}", require_int(verb, arg)?)),
        'o' => Ok(format!("{:o}", require_int(verb, arg)?)),
        'x' => Ok(format!("{:x}", require_int(verb, arg)?)),
        'X' => Ok(format!("{:X}", require_int(verb, arg)?)),
        'f' => {
            let v = require_float(verb, arg)?;
            let prec = spec.precision.unwrap_or(6);
            Ok(format!("{:.*}", prec, v))
        }
        'e' => {
            let v = require_float(verb, arg)?;
            let mut s = String::new();
            match spec.precision {
                Some(p) => write!(s, "{:.*e}", p, v).unwrap(),
                None => write!(s, "{:e}", v).unwrap(),
            }
            Ok(s)
        }
        'g' => Ok(format_float(require_float(verb, arg)?)),
        'c' => match arg {
            Value::Char(c) => Ok(c.to_string()),
            Value::Int(i) => Ok(char::from_u32(*i as u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "\u{FFFD}".to_string())),
            other => Err(bad_verb_arg(verb, other)),
        },
        't' => Ok(if arg.is_falsy() { "false" } else { "true" }.to_string()),
        other => Err(RuntimeError::custom(format!(
            "format: unknown verb '%{}'",
            other
        ))),
    }
}

fn require_int(verb: char, arg: &Value) -> Result<i64> {
    to_i64(arg).ok_or_else(|| bad_verb_arg(verb, arg))
}

fn require_float(verb: char, arg: &Value) -> Result<f64> {
    to_f64(arg).ok_or_else(|| bad_verb_arg(verb, arg))
}

fn bad_verb_arg(verb: char, arg: &Value) -> RuntimeError {
    RuntimeError::custom(format!(
        "format: cannot format {} with '%{}'",
        arg.type_name(),
        verb
    ))
}

fn pad(out: &mut String, rendered: &str, spec: &Spec) {
    let Some(width) = spec.width else {
        out.push_str(rendered);
        return;
    };
    let len = rendered.chars().count();
    if len >= width {
        out.push_str(rendered);
        return;
    }
    let fill = width - len;
    if spec.minus {
        out.push_str(rendered);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if spec.zero {
        // Zero padding goes between the sign and the digits.
        if let Some(rest) = rendered.strip_prefix('-') {
            out.push('-');
            out.extend(std::iter::repeat('0').take(fill));
            out.push_str(rest);
        } else {
            out.extend(std::iter::repeat('0').take(fill));
            out.push_str(rendered);
        }
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(rendered);
    }
}
