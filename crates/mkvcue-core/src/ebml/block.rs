//! Block frame header decoding.
//!
//! The payload of a Block or SimpleBlock element starts with a small header:
//!
//! ```text
//! +-----------------+------------------+-------+--------------------+
//! | track (var-int) | timecode (i16 BE)| flags | frame payload ...  |
//! +-----------------+------------------+-------+--------------------+
//! ```
//!
//! Only the header is decoded; the frame payload is recorded as a
//! [`ByteSpan`] and skipped.

use crate::ebml::element::ByteSpan;
use crate::ebml::vint;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use std::io::{Read, Seek, SeekFrom};

/// Keyframe bit of a SimpleBlock
pub const FLAG_KEYFRAME: u8 = 0x80;

/// Lacing bits of the flag byte
pub const FLAG_LACING: u8 = 0x06;

/// Flag values at or above this (keyframe bit masked off) are rejected
const FLAGS_LIMIT: u8 = 5;

/// Decoded block header with a lazy payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    track_number: u64,
    timecode: i16,
    flags: u8,
    payload: ByteSpan,
}

impl Block {
    /// Creates a block from already decoded header fields
    pub fn new(track_number: u64, timecode: i16, flags: u8, payload: ByteSpan) -> Self {
        Self {
            track_number,
            timecode,
            flags,
            payload,
        }
    }

    /// Decodes a block whose payload region starts at the current position
    /// and spans `length` bytes. On success the cursor sits at the end of
    /// the region.
    pub fn read<R: Read + Seek>(reader: &mut R, length: u64) -> Result<Self> {
        let start = reader.stream_position()?;
        let track_number = vint::read_length(reader)?;
        let timecode = reader.read_i16::<BigEndian>()?;
        let flags = reader.read_u8()?;

        if (flags & !FLAG_KEYFRAME) >= FLAGS_LIMIT || flags & FLAG_LACING != 0 {
            return Err(Error::Lacing {
                flags,
                offset: start,
            });
        }

        let header = reader.stream_position()? - start;
        if header > length {
            return Err(Error::ElementOverrun {
                id: 0,
                offset: start,
                end: start + header,
                limit: start + length,
            });
        }

        let payload = ByteSpan::new(start + header, length - header);
        reader.seek(SeekFrom::Start(payload.end()))?;

        Ok(Self {
            track_number,
            timecode,
            flags,
            payload,
        })
    }

    /// Reads the track number at the current position without moving the
    /// cursor.
    pub fn peek_track_number<R: Read + Seek>(reader: &mut R) -> Result<u64> {
        let start = reader.stream_position()?;
        let track_number = vint::read_length(reader)?;
        reader.seek(SeekFrom::Start(start))?;
        Ok(track_number)
    }

    pub fn track_number(&self) -> u64 {
        self.track_number
    }

    /// Timecode relative to the enclosing cluster
    pub fn timecode(&self) -> i16 {
        self.timecode
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags & FLAG_KEYFRAME != 0
    }

    pub fn payload(&self) -> ByteSpan {
        self.payload
    }

    /// Reads the frame payload, restoring the cursor afterwards
    pub fn read_payload<R: Read + Seek>(&self, reader: &mut R) -> Result<Bytes> {
        self.payload.read(reader)
    }
}
