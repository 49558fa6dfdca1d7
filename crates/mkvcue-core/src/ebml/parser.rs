//! Schema-driven recursive descent over EBML elements.
//!
//! The parser is bound to one master [`SchemaNode`] and reads an element of
//! that id from the current position of a `Read + Seek` handle. Children are
//! looked up in the schema of their enclosing master; an id that is neither
//! known there nor the Void padding id fails the whole parse.
//!
//! Every successful call leaves the cursor at the end of the element it
//! decoded. A call that finds a different id at the cursor returns `None`
//! and leaves the cursor where it was.

use crate::ebml::block::Block;
use crate::ebml::element::{ByteSpan, Element, Master, Value};
use crate::ebml::vint;
use crate::error::{Error, Result};
use crate::schema::{ids, DefaultValue, SchemaNode, ValueKind};
use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::trace;

/// Optional restrictions applied while descending
///
/// Filters are inherited by every nested master.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseFilter<'a> {
    /// Blocks whose track number is outside this set are skipped unread
    pub track_numbers: Option<&'a HashSet<u64>>,
    /// Elements whose id is outside this set are skipped
    pub ids: Option<&'a HashSet<u32>>,
}

impl<'a> ParseFilter<'a> {
    /// No filtering
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_track_numbers(mut self, track_numbers: &'a HashSet<u64>) -> Self {
        self.track_numbers = Some(track_numbers);
        self
    }

    pub fn with_ids(mut self, ids: &'a HashSet<u32>) -> Self {
        self.ids = Some(ids);
        self
    }

    fn skips_id(&self, id: u32) -> bool {
        self.ids.map_or(false, |allowed| !allowed.contains(&id))
    }

    fn skips_track(&self, track_number: u64) -> bool {
        self.track_numbers
            .map_or(false, |allowed| !allowed.contains(&track_number))
    }
}

/// Parser bound to one master schema node
#[derive(Debug, Clone)]
pub struct ElementParser {
    schema: Arc<SchemaNode>,
}

impl ElementParser {
    /// Creates a parser for elements of the given master node
    pub fn new(schema: &Arc<SchemaNode>) -> Self {
        Self {
            schema: Arc::clone(schema),
        }
    }

    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    /// Parses the element at the cursor and its whole subtree.
    ///
    /// Returns `Ok(None)` with the cursor untouched when the id at the
    /// cursor is not this parser's id.
    pub fn parse<R: Read + Seek>(
        &self,
        reader: &mut R,
        filter: ParseFilter<'_>,
    ) -> Result<Option<Element>> {
        let Some(header) = self.read_header(reader)? else {
            return Ok(None);
        };
        self.check_within_stream(reader, &header)?;

        let mut master = Master::new(Arc::clone(&self.schema));
        read_section(reader, &self.schema, &mut master, header.end(), filter, None)?;
        Ok(Some(header.into_element(self.schema.id(), master)))
    }

    /// Reads only the id and length of the element at the cursor.
    ///
    /// On a match the cursor is left at the first payload byte and the
    /// payload length is returned.
    pub fn peek_id_and_length<R: Read + Seek>(&self, reader: &mut R) -> Result<Option<u64>> {
        Ok(self.read_header(reader)?.map(|header| header.length))
    }

    /// Parses depth first and stops at the first element with `target`.
    ///
    /// The cursor is left at the end of the returned element. Elements
    /// decoded on the way are discarded.
    pub fn search_once<R: Read + Seek>(
        &self,
        reader: &mut R,
        target: u32,
    ) -> Result<Option<Element>> {
        let Some(header) = self.read_header(reader)? else {
            return Ok(None);
        };
        self.check_within_stream(reader, &header)?;

        let mut master = Master::new(Arc::clone(&self.schema));
        let found = read_section(
            reader,
            &self.schema,
            &mut master,
            header.end(),
            ParseFilter::none(),
            Some(target),
        )?;
        if found.is_some() {
            return Ok(found);
        }
        if self.schema.id() == target {
            return Ok(Some(header.into_element(target, master)));
        }
        Ok(None)
    }

    /// Rejects a declared length running past the end of the stream.
    ///
    /// Children are bounded by their parent, so checking the outermost
    /// element keeps every decoded range inside the stream.
    fn check_within_stream<R: Read + Seek>(&self, reader: &mut R, header: &Header) -> Result<()> {
        let limit = stream_len(reader)?;
        if header.end() > limit {
            return Err(Error::ElementOverrun {
                id: self.schema.id(),
                offset: header.offset,
                end: header.end(),
                limit,
            });
        }
        Ok(())
    }

    fn read_header<R: Read + Seek>(&self, reader: &mut R) -> Result<Option<Header>> {
        let offset = reader.stream_position()?;
        let id = vint::read_id(reader)?;
        if id != self.schema.id() {
            trace!(
                "Expected {:#x} at offset {}, found {:#x}",
                self.schema.id(),
                offset,
                id
            );
            reader.seek(SeekFrom::Start(offset))?;
            return Ok(None);
        }
        let length = vint::read_length(reader)?;
        let payload = reader.stream_position()?;
        Ok(Some(Header {
            offset,
            payload,
            length,
        }))
    }
}

/// Length of the stream; the cursor is left where it was
pub(crate) fn stream_len<R: Seek>(reader: &mut R) -> Result<u64> {
    let saved = reader.stream_position()?;
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(saved))?;
    Ok(len)
}

struct Header {
    offset: u64,
    payload: u64,
    length: u64,
}

impl Header {
    fn end(&self) -> u64 {
        self.payload + self.length
    }

    fn into_element(self, id: u32, master: Master) -> Element {
        Element::new(
            id,
            self.offset,
            self.payload - self.offset,
            self.length,
            Value::Master(master),
        )
    }
}

/// Fills `master` with the children found up to `end`.
///
/// With a `target`, returns as soon as an element with that id has been
/// decoded anywhere below.
fn read_section<R: Read + Seek>(
    reader: &mut R,
    schema: &SchemaNode,
    master: &mut Master,
    end: u64,
    filter: ParseFilter<'_>,
    target: Option<u32>,
) -> Result<Option<Element>> {
    loop {
        let offset = reader.stream_position()?;
        if offset >= end {
            return Ok(None);
        }

        let id = vint::read_id(reader)?;
        let node = match schema.child(id) {
            Some(node) => Some(node),
            None if id == ids::VOID => None,
            None => return Err(Error::schema_violation(id, schema.id(), offset)),
        };

        let length = vint::read_length(reader)?;
        let payload = reader.stream_position()?;
        let element_end = payload + length;
        if element_end > end {
            return Err(Error::ElementOverrun {
                id,
                offset,
                end: element_end,
                limit: end,
            });
        }

        let Some(node) = node else {
            trace!("Skipping {} bytes of void at offset {}", length, offset);
            reader.seek(SeekFrom::Start(element_end))?;
            continue;
        };

        if filter.skips_id(id) {
            trace!("Filtered out {:#x} at offset {}", id, offset);
            reader.seek(SeekFrom::Start(element_end))?;
            continue;
        }

        if node.kind() == ValueKind::Block && filter.track_numbers.is_some() {
            let track_number = Block::peek_track_number(reader)?;
            if filter.skips_track(track_number) {
                trace!("Skipping block of track {} at offset {}", track_number, offset);
                reader.seek(SeekFrom::Start(element_end))?;
                continue;
            }
        }

        let header_length = payload - offset;
        let element = if node.is_master() {
            let mut child = Master::new(Arc::clone(node));
            if let Some(found) = read_section(reader, node, &mut child, element_end, filter, target)?
            {
                return Ok(Some(found));
            }
            Element::new(id, offset, header_length, length, Value::Master(child))
        } else {
            let value = read_leaf(reader, node, offset, length)?;
            Element::new(id, offset, header_length, length, value)
        };

        if target == Some(id) {
            return Ok(Some(element));
        }
        master.push(element);
    }
}

/// Decodes a non-master payload of `length` bytes at the cursor
fn read_leaf<R: Read + Seek>(
    reader: &mut R,
    node: &Arc<SchemaNode>,
    offset: u64,
    length: u64,
) -> Result<Value> {
    let id = node.id();
    let unsupported = || Error::UnsupportedWidth {
        id,
        offset,
        width: length,
    };

    let value = match node.kind() {
        ValueKind::Int => match length {
            0 => Value::Int(default_uint(node)),
            1..=4 | 8 => Value::Int(reader.read_uint::<BigEndian>(length as usize)?),
            _ => return Err(unsupported()),
        },
        ValueKind::Long => match length {
            0 => Value::Long(default_uint(node)),
            1..=8 => Value::Long(reader.read_uint::<BigEndian>(length as usize)?),
            _ => return Err(unsupported()),
        },
        ValueKind::Float => match length {
            0 => Value::Float(default_float(node) as f32),
            4 => Value::Float(reader.read_f32::<BigEndian>()?),
            8 => Value::Float(reader.read_f64::<BigEndian>()? as f32),
            _ => return Err(unsupported()),
        },
        ValueKind::Double => match length {
            0 => Value::Double(default_float(node)),
            4 => Value::Double(reader.read_f32::<BigEndian>()? as f64),
            8 => Value::Double(reader.read_f64::<BigEndian>()?),
            _ => return Err(unsupported()),
        },
        ValueKind::String => {
            let mut buf = Vec::new();
            reader.by_ref().take(length).read_to_end(&mut buf)?;
            if (buf.len() as u64) < length {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            // Strings may be zero padded
            let text = String::from_utf8_lossy(&buf);
            Value::String(text.trim_end_matches('\0').to_owned())
        }
        ValueKind::Bytes => {
            let payload = reader.stream_position()?;
            reader.seek(SeekFrom::Start(payload + length))?;
            Value::Bytes(ByteSpan::new(payload, length))
        }
        ValueKind::Block => Value::Block(Block::read(reader, length)?),
        // read_section descends into masters before reaching here
        ValueKind::Master => unreachable!("master {:#x} decoded as a leaf", id),
    };
    Ok(value)
}

fn default_uint(node: &SchemaNode) -> u64 {
    match node.default() {
        Some(DefaultValue::Uint(v)) => *v,
        _ => 0,
    }
}

fn default_float(node: &SchemaNode) -> f64 {
    match node.default() {
        Some(DefaultValue::Float(v)) => *v,
        _ => 0.0,
    }
}
