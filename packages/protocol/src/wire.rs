//! Primitive encodings shared by every message.
//!
//! Multi-byte integers are big-endian. Varints are 7-bit little-endian groups
//! with the high bit set on every byte but the last.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{ProtocolError, Result};

pub const MAX_VAR_INT_LEN: usize = 5;

/// Fail unless `buf` holds at least `needed` more bytes.
pub fn ensure(buf: &impl Buf, needed: usize) -> Result<()> {
    match needed.checked_sub(buf.remaining()) {
        Some(missing) if missing > 0 => Err(ProtocolError::Truncated { needed: missing }),
        _ => Ok(()),
    }
}

pub fn read_u8(buf: &mut impl Buf) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_bool(buf: &mut impl Buf) -> Result<bool> {
    Ok(read_u8(buf)? != 0)
}

pub fn read_u16(buf: &mut impl Buf) -> Result<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_i32(buf: &mut impl Buf) -> Result<i32> {
    ensure(buf, 4)?;
    Ok(buf.get_i32())
}

pub fn write_bool(buf: &mut impl BufMut, value: bool) {
    buf.put_u8(u8::from(value));
}

pub fn write_var_int(buf: &mut impl BufMut, value: i32) {
    let mut value = value as u32;
    while value & !0x7F != 0 {
        buf.put_u8((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub fn read_var_int(buf: &mut impl Buf) -> Result<i32> {
    let mut value = 0u32;
    for i in 0..MAX_VAR_INT_LEN {
        let byte = read_u8(buf)?;
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(ProtocolError::VarIntTooLong)
}

/// Encoded size of a varint.
pub fn var_int_len(value: i32) -> usize {
    let bits = 32 - (value as u32).leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Write a non-negative length as a varint.
pub fn write_length(buf: &mut impl BufMut, length: usize) -> Result<()> {
    let length = i32::try_from(length).map_err(|_| ProtocolError::Overflow(length))?;
    write_var_int(buf, length);
    Ok(())
}

pub fn read_length(buf: &mut impl Buf) -> Result<usize> {
    let length = read_var_int(buf)?;
    usize::try_from(length).map_err(|_| ProtocolError::NegativeLength(length))
}

pub fn read_bytes(buf: &mut impl Buf, length: usize) -> Result<Bytes> {
    ensure(buf, length)?;
    Ok(buf.copy_to_bytes(length))
}

/// Write a string of at most `max` characters.
pub fn write_string(buf: &mut impl BufMut, value: &str, max: usize) -> Result<()> {
    let length = value.chars().count();
    if length > max {
        return Err(ProtocolError::StringTooLong { length, max });
    }
    write_length(buf, value.len())?;
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Read a string of at most `max` characters.
pub fn read_string(buf: &mut impl Buf, max: usize) -> Result<String> {
    let length = read_length(buf)?;
    if length > max * 4 {
        return Err(ProtocolError::StringTooLong { length, max });
    }
    let value = String::from_utf8(read_bytes(buf, length)?.to_vec())?;
    let chars = value.chars().count();
    if chars > max {
        return Err(ProtocolError::StringTooLong { length: chars, max });
    }
    Ok(value)
}
