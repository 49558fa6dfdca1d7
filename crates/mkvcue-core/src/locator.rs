//! Top-level region lookup through the segment's seek table.
//!
//! A Matroska file opens with an EBML header followed by a single Segment.
//! Near the start of the segment a SeekHead lists where the other top-level
//! regions live, as offsets relative to the first byte of the segment body.
//! [`ContainerLocator`] parses this envelope once and resolves each
//! [`Region`] to an absolute offset on first use.

use crate::ebml::{vint, Element, ElementParser, ParseFilter};
use crate::error::{Error, Result};
use crate::reader::ReaderConfig;
use crate::schema::{ids, Schema};
use byteorder::{BigEndian, ReadBytesExt};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace, warn};

/// A named top-level region of the segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// A further seek table
    SeekHead,
    /// Segment information
    Info,
    /// Track list
    Tracks,
    /// Cue index
    Cues,
    /// Attached files
    Attachments,
    /// Chapter list
    Chapters,
}

impl Region {
    /// All regions, in resolver slot order
    pub const ALL: [Region; 6] = [
        Region::SeekHead,
        Region::Info,
        Region::Tracks,
        Region::Cues,
        Region::Attachments,
        Region::Chapters,
    ];

    /// Element id announcing the region
    pub fn id(&self) -> u32 {
        match self {
            Region::SeekHead => ids::SEEK_HEAD,
            Region::Info => ids::INFO,
            Region::Tracks => ids::TRACKS,
            Region::Cues => ids::CUES,
            Region::Attachments => ids::ATTACHMENTS,
            Region::Chapters => ids::CHAPTERS,
        }
    }

    fn slot(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::SeekHead => "SeekHead",
            Region::Info => "Info",
            Region::Tracks => "Tracks",
            Region::Cues => "Cues",
            Region::Attachments => "Attachments",
            Region::Chapters => "Chapters",
        };
        f.write_str(name)
    }
}

/// Parsed file envelope and seek table
#[derive(Debug)]
pub struct ContainerLocator {
    header: Element,
    segment_offset: u64,
    segment_length: u64,
    anchor: u64,
    seek_heads: Vec<Element>,
    positions: HashMap<u32, u64>,
    resolved: [OnceCell<u64>; 6],
}

impl ContainerLocator {
    /// Parses the EBML header, the segment header and its seek table(s).
    pub fn locate<R: Read + Seek>(reader: &mut R, config: &ReaderConfig) -> Result<Self> {
        let schema = Schema::global();

        reader.seek(SeekFrom::Start(0))?;
        let header = ElementParser::new(schema.ebml_header())
            .parse(reader, ParseFilter::none())?
            .ok_or(Error::NotEbml)?;
        debug!(
            "EBML header parsed, doc type {:?}",
            header.string(ids::DOC_TYPE).unwrap_or_default()
        );

        let segment_offset = reader.stream_position()?;
        if reader.read_u32::<BigEndian>()? != ids::SEGMENT {
            return Err(Error::SegmentNotFound {
                offset: segment_offset,
            });
        }
        let segment_length = vint::read_length(reader)?;
        let anchor = reader.stream_position()?;
        debug!("Segment body starts at {}", anchor);

        let seek_head_offset = scan_for_id(reader, ids::SEEK_HEAD, anchor, config.seek_head_scan_window)?;
        if seek_head_offset != anchor {
            debug!(
                "Seek head found {} bytes into the segment body",
                seek_head_offset - anchor
            );
        }

        let parser = ElementParser::new(schema.seek_head());
        reader.seek(SeekFrom::Start(seek_head_offset))?;
        let primary = parser
            .parse(reader, ParseFilter::none())?
            .ok_or_else(|| Error::missing("SeekHead"))?;

        let mut locator = Self {
            header,
            segment_offset,
            segment_length,
            anchor,
            seek_heads: Vec::new(),
            positions: HashMap::new(),
            resolved: Default::default(),
        };
        locator.add_seek_head(primary);

        if config.follow_secondary_seek_head {
            if let Some(&relative) = locator.positions.get(&ids::SEEK_HEAD) {
                let offset = anchor + relative;
                reader.seek(SeekFrom::Start(offset))?;
                let secondary = parser
                    .parse(reader, ParseFilter::none())?
                    .ok_or(Error::RegionMismatch {
                        expected: ids::SEEK_HEAD,
                        offset,
                    })?;
                debug!("Secondary seek head parsed at {}", offset);
                locator.add_seek_head(secondary);
            }
        }

        Ok(locator)
    }

    fn add_seek_head(&mut self, seek_head: Element) {
        for seek in seek_head.children_with_id(ids::SEEK) {
            let (Some(id), Some(position)) = (seek.uint(ids::SEEK_ID), seek.uint(ids::SEEK_POSITION))
            else {
                warn!("Ignoring incomplete seek entry at offset {}", seek.offset());
                continue;
            };
            trace!("Seek entry {:#x} -> {}", id, position);
            // The first table listing an id wins
            self.positions.entry(id as u32).or_insert(position);
        }
        self.seek_heads.push(seek_head);
    }

    /// The EBML header element
    pub fn ebml_header(&self) -> &Element {
        &self.header
    }

    /// Document type declared in the EBML header
    pub fn doc_type(&self) -> &str {
        self.header.string(ids::DOC_TYPE).unwrap_or_default()
    }

    /// Offset of the Segment id
    pub fn segment_offset(&self) -> u64 {
        self.segment_offset
    }

    /// Declared length of the segment body
    pub fn segment_length(&self) -> u64 {
        self.segment_length
    }

    /// Offset every seek position is relative to.
    ///
    /// This is the first byte of the segment body, not the offset where the
    /// seek head was found; the two differ when padding precedes the seek
    /// head.
    pub fn anchor(&self) -> u64 {
        self.anchor
    }

    /// Parsed seek tables, primary first
    pub fn seek_heads(&self) -> &[Element] {
        &self.seek_heads
    }

    /// Relative position the seek tables list for `id`
    pub fn seek_position(&self, id: u32) -> Option<u64> {
        self.positions.get(&id).copied()
    }

    /// Absolute offset of a region, or 0 when the file does not list it.
    pub fn region_offset(&self, region: Region) -> u64 {
        *self.resolved[region.slot()].get_or_init(|| {
            let offset = self
                .seek_position(region.id())
                .map_or(0, |relative| self.anchor + relative);
            trace!("Resolved {} to offset {}", region, offset);
            offset
        })
    }

    /// Payload length of a region, read from its element header.
    ///
    /// Returns 0 when the region is absent. The cursor is left after the
    /// region's header.
    pub fn region_length<R: Read + Seek>(&self, reader: &mut R, region: Region) -> Result<u64> {
        let offset = self.region_offset(region);
        if offset == 0 {
            return Ok(0);
        }
        reader.seek(SeekFrom::Start(offset))?;
        if vint::read_id(reader)? != region.id() {
            return Err(Error::RegionMismatch {
                expected: region.id(),
                offset,
            });
        }
        vint::read_length(reader)
    }
}

/// Finds the first occurrence of the 4-byte `id` within `window` bytes of
/// `start`.
fn scan_for_id<R: Read + Seek>(reader: &mut R, id: u32, start: u64, window: usize) -> Result<u64> {
    reader.seek(SeekFrom::Start(start))?;
    let mut buf = Vec::with_capacity(window + 4);
    reader
        .by_ref()
        .take((window + 4) as u64)
        .read_to_end(&mut buf)?;

    let needle = id.to_be_bytes();
    buf.windows(needle.len())
        .take(window.max(1))
        .position(|candidate| candidate == needle)
        .map(|skip| start + skip as u64)
        .ok_or(Error::SeekHeadNotFound {
            offset: start,
            window,
        })
}
