//! Parsed element tree.
//!
//! An [`Element`] is produced by the [`ElementParser`](super::ElementParser)
//! for every id it decodes. Leaves hold their decoded value; masters own
//! their children in file order together with the schema node they were
//! parsed against, so that typed lookups can fall back to a declared
//! default when a child is absent.
//!
//! Binary payloads are never copied while parsing. A [`ByteSpan`] records
//! where the bytes live and reads them on request, leaving the handle's
//! cursor exactly where it was.

use crate::ebml::block::Block;
use crate::error::Result;
use crate::schema::{DefaultValue, SchemaNode, ValueKind};
use bytes::Bytes;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

/// A lazily read byte range of the underlying file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteSpan {
    /// Absolute offset of the first byte
    pub offset: u64,
    /// Number of bytes
    pub length: u64,
}

impl ByteSpan {
    /// Creates a span
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// One past the last byte
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Reads the bytes of this span.
    ///
    /// The reader's position on return equals its position on entry, on
    /// success and on failure alike.
    pub fn read<R: Read + Seek>(&self, reader: &mut R) -> Result<Bytes> {
        let saved = reader.stream_position()?;
        let outcome = self.read_at(reader);
        reader.seek(SeekFrom::Start(saved))?;
        outcome
    }

    fn read_at<R: Read + Seek>(&self, reader: &mut R) -> Result<Bytes> {
        reader.seek(SeekFrom::Start(self.offset))?;
        let mut buf = vec![0u8; self.length as usize];
        reader.read_exact(&mut buf)?;
        Ok(Bytes::from(buf))
    }
}

/// Children of a master element and the schema they were parsed against
#[derive(Debug, Clone)]
pub struct Master {
    schema: Arc<SchemaNode>,
    children: Vec<Element>,
}

impl Master {
    pub(crate) fn new(schema: Arc<SchemaNode>) -> Self {
        Self {
            schema,
            children: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Schema node of this master
    pub fn schema(&self) -> &Arc<SchemaNode> {
        &self.schema
    }

    /// Children in file order
    pub fn children(&self) -> &[Element] {
        &self.children
    }
}

/// Decoded value of an element
#[derive(Debug, Clone)]
pub enum Value {
    /// Unsigned integer of at most 4 bytes (or 8)
    Int(u64),
    /// Unsigned integer of up to 8 bytes
    Long(u64),
    /// Single precision float
    Float(f32),
    /// Double precision float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// Binary payload, not yet read
    Bytes(ByteSpan),
    /// Block header with its payload span
    Block(Block),
    /// Master with its children
    Master(Master),
}

impl Value {
    /// Kind of the value, matching the schema kind it was decoded from
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Block(_) => ValueKind::Block,
            Value::Master(_) => ValueKind::Master,
        }
    }
}

/// One parsed element
#[derive(Debug, Clone)]
pub struct Element {
    id: u32,
    offset: u64,
    header_length: u64,
    payload_length: u64,
    value: Value,
}

impl Element {
    pub(crate) fn new(
        id: u32,
        offset: u64,
        header_length: u64,
        payload_length: u64,
        value: Value,
    ) -> Self {
        Self {
            id,
            offset,
            header_length,
            payload_length,
            value,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Absolute offset of the element's id
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Absolute offset of the first payload byte
    pub fn payload_offset(&self) -> u64 {
        self.offset + self.header_length
    }

    pub fn payload_length(&self) -> u64 {
        self.payload_length
    }

    /// Id, length and payload together
    pub fn total_length(&self) -> u64 {
        self.header_length + self.payload_length
    }

    /// Offset one past the element's last byte
    pub fn end(&self) -> u64 {
        self.offset + self.total_length()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn as_master(&self) -> Option<&Master> {
        match &self.value {
            Value::Master(master) => Some(master),
            _ => None,
        }
    }

    /// Integer value of an Int or Long leaf
    pub fn as_uint(&self) -> Option<u64> {
        match self.value {
            Value::Int(v) | Value::Long(v) => Some(v),
            _ => None,
        }
    }

    /// Float value of a Float or Double leaf
    pub fn as_float(&self) -> Option<f64> {
        match self.value {
            Value::Float(v) => Some(v as f64),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_span(&self) -> Option<ByteSpan> {
        match self.value {
            Value::Bytes(span) => Some(span),
            _ => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match &self.value {
            Value::Block(block) => Some(block),
            _ => None,
        }
    }

    /// Children in file order; empty for leaves
    pub fn children(&self) -> &[Element] {
        match &self.value {
            Value::Master(master) => master.children(),
            _ => &[],
        }
    }

    /// First direct child with the given id
    pub fn child(&self, id: u32) -> Option<&Element> {
        self.children().iter().find(|el| el.id == id)
    }

    /// All direct children with the given id
    pub fn children_with_id(&self, id: u32) -> impl Iterator<Item = &Element> + '_ {
        self.children().iter().filter(move |el| el.id == id)
    }

    /// Follows a chain of direct-child lookups
    pub fn path(&self, ids: &[u32]) -> Option<&Element> {
        ids.iter().try_fold(self, |el, &id| el.child(id))
    }

    /// Depth-first search of the subtree for the first element with `id`
    pub fn find(&self, id: u32) -> Option<&Element> {
        for child in self.children() {
            if child.id == id {
                return Some(child);
            }
            if let Some(found) = child.find(id) {
                return Some(found);
            }
        }
        None
    }

    fn declared_default(&self, id: u32) -> Option<&DefaultValue> {
        self.as_master()
            .and_then(|master| master.schema().child(id))
            .and_then(|node| node.default())
    }

    /// Integer child, or the schema default when the child is absent
    pub fn uint(&self, id: u32) -> Option<u64> {
        match self.child(id) {
            Some(el) => el.as_uint(),
            None => match self.declared_default(id) {
                Some(DefaultValue::Uint(v)) => Some(*v),
                _ => None,
            },
        }
    }

    /// Integer child, or `fallback` when neither the child nor a default exists
    pub fn uint_or(&self, id: u32, fallback: u64) -> u64 {
        self.uint(id).unwrap_or(fallback)
    }

    pub fn float(&self, id: u32) -> Option<f64> {
        match self.child(id) {
            Some(el) => el.as_float(),
            None => match self.declared_default(id) {
                Some(DefaultValue::Float(v)) => Some(*v),
                _ => None,
            },
        }
    }

    pub fn string(&self, id: u32) -> Option<&str> {
        match self.child(id) {
            Some(el) => el.as_str(),
            None => match self.declared_default(id) {
                Some(DefaultValue::Text(v)) => Some(*v),
                _ => None,
            },
        }
    }

    pub fn span(&self, id: u32) -> Option<ByteSpan> {
        self.child(id).and_then(Element::as_span)
    }

    pub fn block(&self, id: u32) -> Option<&Block> {
        self.child(id).and_then(Element::as_block)
    }

    /// Writes an indented dump of the subtree, one element per line
    pub fn dump(&self, out: &mut impl std::fmt::Write) -> std::fmt::Result {
        self.dump_at(out, 0)
    }

    fn dump_at(&self, out: &mut impl std::fmt::Write, depth: usize) -> std::fmt::Result {
        write!(
            out,
            "{:indent$}{:#x} {} @{} +{}",
            "",
            self.id,
            self.kind().label(),
            self.offset,
            self.total_length(),
            indent = depth * 2
        )?;
        match &self.value {
            Value::Int(v) | Value::Long(v) => writeln!(out, " = {}", v)?,
            Value::Float(v) => writeln!(out, " = {}", v)?,
            Value::Double(v) => writeln!(out, " = {}", v)?,
            Value::String(s) => writeln!(out, " = {:?}", s)?,
            Value::Bytes(span) => writeln!(out, " [{} bytes]", span.length)?,
            Value::Block(block) => writeln!(
                out,
                " track {} t{:+} [{} bytes]",
                block.track_number(),
                block.timecode(),
                block.payload().length
            )?,
            Value::Master(master) => {
                writeln!(out)?;
                for child in master.children() {
                    child.dump_at(out, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}
