//! Variable-length integer decoding.
//!
//! EBML encodes both element ids and element lengths as self-terminating
//! var-ints. The position of the highest set bit in the first byte gives
//! the number of bytes that follow:
//!
//! ```text
//! 1xxxxxxx                               1 byte
//! 01xxxxxx xxxxxxxx                      2 bytes
//! 001xxxxx xxxxxxxx xxxxxxxx             3 bytes
//! 0001xxxx xxxxxxxx xxxxxxxx xxxxxxxx    4 bytes
//! 00000001 xxxxxxxx ... (7 more)         8 bytes
//! ```
//!
//! Ids keep the marker bit as part of their value, lengths strip it.

use crate::error::{Error, Result};
use std::io::{Read, Seek};

/// First byte announcing an 8-byte encoding
const WIDE_MARKER: u8 = 0x01;

/// Mask applied to 8-byte lengths (marker byte stripped)
const WIDE_LENGTH_MASK: u64 = 0x00FF_FFFF_FFFF_FFFF;

/// Decode a var-int from the reader's current position.
///
/// Returns the decoded value and the number of bytes consumed. With
/// `as_length` set, the width marker is stripped from the value; otherwise
/// it is kept (id semantics).
pub fn read_varint<R: Read + Seek>(reader: &mut R, as_length: bool) -> Result<(u64, usize)> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first)?;
    let b1 = first[0];

    let extra = if b1 & 0x80 != 0 {
        0
    } else if b1 & 0x40 != 0 {
        1
    } else if b1 & 0x20 != 0 {
        2
    } else if b1 & 0x10 != 0 {
        3
    } else if b1 == WIDE_MARKER {
        let mut rest = [0u8; 7];
        reader.read_exact(&mut rest)?;
        let value = rest
            .iter()
            .fold(b1 as u64, |acc, &byte| (acc << 8) | byte as u64);
        let value = if as_length {
            value & WIDE_LENGTH_MASK
        } else {
            value
        };
        return Ok((value, 8));
    } else {
        let offset = reader.stream_position()?.saturating_sub(1);
        return Err(Error::VarintDecode { offset, byte: b1 });
    };

    let marker = 0x80u8 >> extra;
    let head = if as_length { b1 & !marker } else { b1 };

    let mut rest = [0u8; 3];
    reader.read_exact(&mut rest[..extra])?;
    let value = rest[..extra]
        .iter()
        .fold(head as u64, |acc, &byte| (acc << 8) | byte as u64);

    Ok((value, extra + 1))
}

/// Read an element id (marker bits kept).
pub fn read_id<R: Read + Seek>(reader: &mut R) -> Result<u32> {
    let (value, _) = read_varint(reader, false)?;
    Ok(value as u32)
}

/// Read an element length (marker bit stripped).
pub fn read_length<R: Read + Seek>(reader: &mut R) -> Result<u64> {
    let (value, _) = read_varint(reader, true)?;
    Ok(value)
}
