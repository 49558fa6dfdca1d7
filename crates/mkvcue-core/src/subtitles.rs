//! Subtitle tracks and the captions extracted for them.
//!
//! A [`SubtitleTrack`] is the consumer blocks are dispatched to during cue
//! extraction. Each dispatched block becomes a [`Caption`] in the track's
//! unread list; [`SubtitleTrack::take_unread`] hands the new captions out
//! and moves them to the read list, so captions can be consumed while
//! extraction is still running.
//!
//! Payloads are not decoded here. A caption keeps its [`Block`], and the
//! caller reads (and if [`Caption::compressed`] is set, inflates) the
//! payload itself.

use crate::ebml::Block;
use crate::error::Result;
use crate::info::DEFAULT_TIMECODE_SCALE;
use crate::tracks::{Compression, TrackEntry, TrackType};
use bytes::Bytes;
use std::fmt;
use std::io::{Read, Seek};
use tracing::trace;

/// Codec id of SubRip text
pub const SRT_CODEC_ID: &str = "S_TEXT/UTF8";
/// Codec id of Advanced SubStation Alpha
pub const ASS_CODEC_ID: &str = "S_TEXT/ASS";
/// Codec id of SubStation Alpha
pub const SSA_CODEC_ID: &str = "S_TEXT/SSA";

/// A point in time in milliseconds, displayed as `hh:mm:ss.mmm`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn hours(&self) -> i64 {
        self.0 / 3_600_000
    }

    pub fn minutes(&self) -> i64 {
        self.0 / 60_000 % 60
    }

    pub fn seconds(&self) -> i64 {
        self.0 / 1000 % 60
    }

    pub fn millis(&self) -> i64 {
        self.0 % 1000
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = Timestamp(self.0.abs());
        write!(
            f,
            "{}{:02}:{:02}:{:02}.{:03}",
            sign,
            abs.hours(),
            abs.minutes(),
            abs.seconds(),
            abs.millis()
        )
    }
}

/// Text format of a subtitle track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtitleFormat {
    /// SubRip
    Srt,
    /// SubStation Alpha and its advanced variant
    Ssa,
    /// Any other codec (bitmap formats, WebVTT, ...)
    Other,
}

impl SubtitleFormat {
    pub fn from_codec_id(codec_id: &str) -> Self {
        match codec_id {
            SRT_CODEC_ID => SubtitleFormat::Srt,
            ASS_CODEC_ID | SSA_CODEC_ID => SubtitleFormat::Ssa,
            _ => SubtitleFormat::Other,
        }
    }

    /// Usual file extension of the format
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Ssa => "ass",
            SubtitleFormat::Other => "bin",
        }
    }
}

/// One extracted subtitle block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub start: Timestamp,
    pub end: Timestamp,
    pub block: Block,
    /// Whether the payload is a zlib stream
    pub compressed: bool,
}

impl Caption {
    /// Display duration in milliseconds
    pub fn duration(&self) -> i64 {
        self.end.0 - self.start.0
    }

    /// Reads the raw payload, restoring the cursor afterwards
    pub fn read_payload<R: Read + Seek>(&self, reader: &mut R) -> Result<Bytes> {
        self.block.read_payload(reader)
    }
}

/// Receives blocks dispatched during cue extraction
///
/// Extraction asks [`accepts`](BlockSink::accepts) for every block of a
/// span before delivering any of them.
pub trait BlockSink {
    /// Whether a consumer takes blocks of `track_number`
    fn accepts(&self, track_number: u64) -> bool;

    /// Delivers one block of an accepted track.
    ///
    /// `timecode` is the base timecode of the block's cluster, `duration`
    /// the BlockDuration (0 when absent), both in segment ticks.
    fn deliver(&mut self, block: &Block, timecode: i64, duration: u64);
}

/// A subtitle track and its caption buffers
#[derive(Debug, Clone)]
pub struct SubtitleTrack {
    entry: TrackEntry,
    format: SubtitleFormat,
    compression: Compression,
    timecode_scale: u64,
    unread: Vec<Caption>,
    read: Vec<Caption>,
}

impl SubtitleTrack {
    /// Creates the consumer for a subtitle track entry.
    ///
    /// Fails when the track uses a content encoding other than a single
    /// zlib stage.
    pub fn from_entry(entry: &TrackEntry, timecode_scale: u64) -> Result<Self> {
        debug_assert_eq!(entry.track_type, TrackType::Subtitle);
        let compression = entry.compression()?;
        Ok(Self {
            format: SubtitleFormat::from_codec_id(&entry.codec_id),
            compression,
            timecode_scale: if timecode_scale == 0 {
                DEFAULT_TIMECODE_SCALE
            } else {
                timecode_scale
            },
            entry: entry.clone(),
            unread: Vec::new(),
            read: Vec::new(),
        })
    }

    pub fn track_number(&self) -> u64 {
        self.entry.number
    }

    pub fn entry(&self) -> &TrackEntry {
        &self.entry
    }

    pub fn format(&self) -> SubtitleFormat {
        self.format
    }

    pub fn is_compressed(&self) -> bool {
        self.compression == Compression::Zlib
    }

    /// Appends a caption for `block` to the unread list
    pub fn append_block(&mut self, block: &Block, timecode: i64, duration: u64) {
        let start = timecode + block.timecode() as i64;
        let end = start + duration as i64;
        let caption = Caption {
            start: Timestamp(self.to_millis(start)),
            end: Timestamp(self.to_millis(end)),
            block: block.clone(),
            compressed: self.is_compressed(),
        };
        trace!(
            "Track {} caption {} --> {}",
            self.entry.number,
            caption.start,
            caption.end
        );
        self.unread.push(caption);
    }

    fn to_millis(&self, ticks: i64) -> i64 {
        (ticks as i128 * self.timecode_scale as i128 / 1_000_000) as i64
    }

    /// Returns the captions appended since the last call and marks them read
    pub fn take_unread(&mut self) -> Vec<Caption> {
        let fresh = std::mem::take(&mut self.unread);
        self.read.extend(fresh.iter().cloned());
        fresh
    }

    /// Number of captions not yet taken
    pub fn unread_len(&self) -> usize {
        self.unread.len()
    }

    /// Captions already handed out by [`take_unread`](Self::take_unread)
    pub fn read_captions(&self) -> &[Caption] {
        &self.read
    }
}

impl BlockSink for [SubtitleTrack] {
    fn accepts(&self, track_number: u64) -> bool {
        self.iter().any(|t| t.track_number() == track_number)
    }

    fn deliver(&mut self, block: &Block, timecode: i64, duration: u64) {
        for track in self
            .iter_mut()
            .filter(|t| t.track_number() == block.track_number())
        {
            track.append_block(block, timecode, duration);
        }
    }
}

impl BlockSink for Vec<SubtitleTrack> {
    fn accepts(&self, track_number: u64) -> bool {
        self.as_slice().accepts(track_number)
    }

    fn deliver(&mut self, block: &Block, timecode: i64, duration: u64) {
        self.as_mut_slice().deliver(block, timecode, duration)
    }
}
