//! A canonical subset of the CBOR binary format, used for cell payloads.
//!
//! Payloads only ever contain maps with small unsigned keys, arrays of
//! scalars, integers and UTF-8 text, so the codec implements exactly the
//! major types it needs: unsigned integer (0), negative integer (1), text
//! string (3), array (4) and map (5). Every head is emitted in its shortest
//! form, so equal payloads always produce equal bytes.

use crate::errors::Error;
use crate::store::values::{Tuple, Value};

pub const MAJOR_UINT: u8 = 0;
pub const MAJOR_NEGINT: u8 = 1;
pub const MAJOR_TEXT: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;

/// Writes a head byte (major type + argument) in canonical shortest form.
pub fn write_head(out: &mut Vec<u8>, major: u8, arg: u64) {
    let high = major << 5;
    if arg < 24 {
        out.push(high | arg as u8);
    } else if arg <= u8::MAX as u64 {
        out.push(high | 24);
        out.push(arg as u8);
    } else if arg <= u16::MAX as u64 {
        out.push(high | 25);
        out.extend_from_slice(&(arg as u16).to_be_bytes());
    } else if arg <= u32::MAX as u64 {
        out.push(high | 26);
        out.extend_from_slice(&(arg as u32).to_be_bytes());
    } else {
        out.push(high | 27);
        out.extend_from_slice(&arg.to_be_bytes());
    }
}

pub fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Int(v) if *v >= 0 => write_head(out, MAJOR_UINT, *v as u64),
        Value::Int(v) => write_head(out, MAJOR_NEGINT, !(*v) as u64),
        Value::UInt(v) => write_head(out, MAJOR_UINT, *v),
        Value::Text(s) => {
            write_head(out, MAJOR_TEXT, s.len() as u64);
            out.extend_from_slice(s.as_bytes());
        }
    }
}

pub fn write_array(out: &mut Vec<u8>, values: &[Value]) {
    write_head(out, MAJOR_ARRAY, values.len() as u64);
    for v in values {
        write_value(out, v);
    }
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8], Error> {
    if input.len() < n {
        return Err(err!(CorruptPage, "truncated payload item"));
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

/// Reads one head, returning `(major, argument)`. Indefinite lengths and the
/// reserved argument encodings are rejected.
pub fn read_head(input: &mut &[u8]) -> Result<(u8, u64), Error> {
    let first = take(input, 1)?[0];
    let major = first >> 5;
    let info = first & 0x1f;
    let arg = match info {
        0..=23 => info as u64,
        24 => take(input, 1)?[0] as u64,
        25 => u16::from_be_bytes(take(input, 2)?.try_into().unwrap()) as u64,
        26 => u32::from_be_bytes(take(input, 4)?.try_into().unwrap()) as u64,
        27 => u64::from_be_bytes(take(input, 8)?.try_into().unwrap()),
        _ => return Err(err!(CorruptPage, "unsupported payload head 0x{:02x}", first)),
    };
    Ok((major, arg))
}

/// Reads a head that must be an unsigned integer (map keys, page numbers).
pub fn read_uint(input: &mut &[u8]) -> Result<u64, Error> {
    match read_head(input)? {
        (MAJOR_UINT, arg) => Ok(arg),
        (major, _) => Err(err!(CorruptPage, "expected unsigned item, got major type {}", major)),
    }
}

pub fn read_value(input: &mut &[u8]) -> Result<Value, Error> {
    let (major, arg) = read_head(input)?;
    match major {
        // A non-negative integer stays signed as long as it fits; only the
        // upper half of the u64 range surfaces as unsigned.
        MAJOR_UINT if arg <= i64::MAX as u64 => Ok(Value::Int(arg as i64)),
        MAJOR_UINT => Ok(Value::UInt(arg)),
        MAJOR_NEGINT if arg <= i64::MAX as u64 => Ok(Value::Int(!(arg as i64))),
        MAJOR_NEGINT => Err(err!(CorruptPage, "negative integer out of range")),
        MAJOR_TEXT => {
            let bytes = take(input, arg as usize)?;
            let text = std::str::from_utf8(bytes)
                .map_err(|e| err!(CorruptPage, "text item is not UTF-8: {}", e))?;
            Ok(Value::Text(text.to_string()))
        }
        _ => Err(err!(CorruptPage, "unsupported payload major type {}", major)),
    }
}

pub fn read_array(input: &mut &[u8]) -> Result<Tuple, Error> {
    let (major, len) = read_head(input)?;
    if major != MAJOR_ARRAY {
        return Err(err!(CorruptPage, "expected array item, got major type {}", major));
    }
    let mut values = Vec::with_capacity(len.min(64) as usize);
    for _ in 0..len {
        values.push(read_value(input)?);
    }
    Ok(values)
}
