//! Cue index and subtitle extraction.
//!
//! The Cues region lists, per track, the cluster (and optionally the
//! position inside that cluster) where a given timecode can be found.
//! [`CueIndex`] folds it into an ordered list of [`CueEntry`] spans of the
//! primary track, each covering `[start_address, end_address]` in the file
//! and `[timecode, next_timecode)` in segment ticks. Subtitle cues that
//! carry a relative position are attached to the span they fall in as
//! sub-entries pointing straight at a block group.
//!
//! [`CueIndex::extract`] pulls the subtitle blocks of one span out of the
//! file, either through those direct pointers or by scanning every cluster
//! of the span. Each span is extracted at most once.

use crate::ebml::parser::stream_len;
use crate::ebml::{vint, Block, Element, ElementParser, ParseFilter};
use crate::error::{Error, Result};
use crate::schema::{ids, Schema};
use crate::subtitles::BlockSink;
use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// One span of the cue index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CueEntry {
    timecode: i64,
    next_timecode: i64,
    start_address: u64,
    end_address: u64,
    relative_position: u64,
    has_parsed: bool,
    sub_entries: Option<Vec<CueEntry>>,
}

impl CueEntry {
    fn new(timecode: i64, start_address: u64) -> Self {
        Self::with_relative_position(timecode, start_address, 0)
    }

    fn with_relative_position(timecode: i64, start_address: u64, relative_position: u64) -> Self {
        Self {
            timecode,
            next_timecode: timecode,
            start_address,
            end_address: start_address,
            relative_position,
            has_parsed: false,
            sub_entries: None,
        }
    }

    /// Closes the span at the start of the one that follows it
    fn close(&mut self, next_address: u64, next_timecode: i64) {
        self.end_address = next_address.saturating_sub(1);
        self.next_timecode = next_timecode;
    }

    /// First tick covered
    pub fn timecode(&self) -> i64 {
        self.timecode
    }

    /// First tick of the following span
    pub fn next_timecode(&self) -> i64 {
        self.next_timecode
    }

    /// Absolute offset of the span's first cluster
    pub fn start_address(&self) -> u64 {
        self.start_address
    }

    /// Last byte of the span (inclusive)
    pub fn end_address(&self) -> u64 {
        self.end_address
    }

    /// Offset of the block group inside its cluster body (sub-entries only)
    pub fn relative_position(&self) -> u64 {
        self.relative_position
    }

    pub fn has_parsed(&self) -> bool {
        self.has_parsed
    }

    /// Direct subtitle pointers within this span
    pub fn sub_entries(&self) -> Option<&[CueEntry]> {
        self.sub_entries.as_deref()
    }
}

/// What the cue fold needs to know about the file
#[derive(Debug, Clone, Copy)]
pub struct CueLayout<'a> {
    /// Track whose cues form the backbone
    pub primary_track: Option<u64>,
    /// Tracks whose cues become sub-entries
    pub subtitle_tracks: &'a HashSet<u64>,
    /// Offset cue cluster positions are relative to
    pub anchor: u64,
    /// Absolute offset of the Cues element
    pub cues_position: u64,
    /// Segment duration in ticks
    pub duration: f64,
}

/// Ordered cue spans of one file
#[derive(Debug, Clone, Default)]
pub struct CueIndex {
    entries: Vec<CueEntry>,
    has_direct_subtitle_positions: bool,
    cues_position: u64,
}

impl CueIndex {
    /// Parses the Cues element at `layout.cues_position` and folds it.
    pub fn build<R: Read + Seek>(reader: &mut R, layout: &CueLayout<'_>) -> Result<Self> {
        reader.seek(SeekFrom::Start(layout.cues_position))?;
        let cues = ElementParser::new(Schema::global().cues())
            .parse(reader, ParseFilter::none())?
            .ok_or(Error::RegionMismatch {
                expected: ids::CUES,
                offset: layout.cues_position,
            })?;
        Self::from_element(&cues, layout)
    }

    /// Folds a parsed Cues element into the index
    pub fn from_element(cues: &Element, layout: &CueLayout<'_>) -> Result<Self> {
        let mut entries: Vec<CueEntry> = Vec::new();
        let mut open_sub: Option<(usize, usize)> = None;
        let mut has_direct = false;

        for point in cues.children_with_id(ids::CUE_POINT) {
            let time = point.uint_or(ids::CUE_TIME, 0) as i64;

            for positions in point.children_with_id(ids::CUE_TRACK_POSITIONS) {
                let track = positions
                    .uint(ids::CUE_TRACK)
                    .ok_or_else(|| Error::missing("CueTrack"))?;
                let address = match positions.uint(ids::CUE_CLUSTER_POSITION) {
                    Some(relative) if relative != 0 => layout.anchor + relative,
                    _ => return Err(Error::missing("CueClusterPosition")),
                };

                if layout.primary_track == Some(track) {
                    if let Some(open) = entries.last_mut() {
                        if open.start_address == address {
                            continue;
                        }
                        open.close(address, time);
                    }
                    entries.push(CueEntry::new(time, address));
                } else if layout.subtitle_tracks.contains(&track) {
                    let Some(relative) = positions.uint(ids::CUE_RELATIVE_POSITION) else {
                        trace!("Subtitle cue at {} has no relative position", time);
                        continue;
                    };
                    has_direct = true;

                    // A subtitle outside the open span gets a span of its own
                    match entries.last_mut() {
                        Some(open) if open.start_address == address => {}
                        Some(open) => {
                            open.close(address, time);
                            entries.push(CueEntry::new(time, address));
                        }
                        None => entries.push(CueEntry::new(time, address)),
                    }

                    if let Some((span, sub)) = open_sub {
                        if let Some(prev) = entries[span]
                            .sub_entries
                            .as_mut()
                            .and_then(|subs| subs.get_mut(sub))
                        {
                            if prev.start_address == address && prev.relative_position == relative {
                                continue;
                            }
                            prev.close(address, time);
                        }
                    }

                    let span = entries.len() - 1;
                    let subs = entries[span].sub_entries.get_or_insert_with(Vec::new);
                    subs.push(CueEntry::with_relative_position(time, address, relative));
                    open_sub = Some((span, subs.len() - 1));
                } else {
                    trace!("Ignoring cue for track {} at {}", track, time);
                }
            }
        }

        // The last span runs to the end of the stream, right before the cues
        let final_timecode = layout.duration.floor() as i64;
        let final_address = layout.cues_position;
        if let Some((span, sub)) = open_sub {
            if let Some(last) = entries[span]
                .sub_entries
                .as_mut()
                .and_then(|subs| subs.get_mut(sub))
            {
                last.close(final_address, final_timecode);
            }
        }
        if let Some(last) = entries.last_mut() {
            last.close(final_address, final_timecode);
        }

        debug!(
            "Cue index built: {} entries, direct subtitle positions: {}",
            entries.len(),
            has_direct
        );

        Ok(Self {
            entries,
            has_direct_subtitle_positions: has_direct,
            cues_position: layout.cues_position,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CueEntry] {
        &self.entries
    }

    /// Entry at `index`
    pub fn entry(&self, index: usize) -> Result<&CueEntry> {
        self.entries.get(index).ok_or(Error::CueIndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// Whether any subtitle cue carried a relative position
    pub fn has_direct_subtitle_positions(&self) -> bool {
        self.has_direct_subtitle_positions
    }

    /// Absolute offset of the Cues element the index was built from
    pub fn cues_position(&self) -> u64 {
        self.cues_position
    }

    /// Index of the span to start from for time `time` (segment ticks).
    ///
    /// Binary search for the first entry whose timecode is not below
    /// `time`, stepped back by one and clamped at 0. Times past the last
    /// entry give the last index.
    pub fn lookup_by_time(&self, time: i64) -> Result<usize> {
        self.lookup(|entry| entry.timecode < time, |last| time > last.timecode)
    }

    /// Index of the span to start from for file offset `address`
    pub fn lookup_by_address(&self, address: u64) -> Result<usize> {
        self.lookup(
            |entry| entry.start_address < address,
            |last| address > last.start_address,
        )
    }

    fn lookup(
        &self,
        below: impl Fn(&CueEntry) -> bool,
        past_end: impl Fn(&CueEntry) -> bool,
    ) -> Result<usize> {
        let last = self.entries.last().ok_or(Error::EmptyCueIndex)?;
        let high = self.entries.len() - 1;
        if past_end(last) {
            return Ok(high);
        }
        let found = self.entries[..high].partition_point(below);
        Ok(found.saturating_sub(1))
    }

    /// Whether `extract(index)` may still yield captions.
    ///
    /// Spans with direct pointers answer from their sub-entries; spans
    /// without them can only be known by scanning and report true until
    /// extracted.
    pub fn can_extract(&self, index: usize) -> bool {
        self.entries.get(index).map_or(false, |entry| {
            !entry.has_parsed
                && entry
                    .sub_entries
                    .as_ref()
                    .map_or(true, |subs| !subs.is_empty())
        })
    }

    /// Dispatches the subtitle blocks of span `index` to `sink`.
    ///
    /// Returns whether at least one block was dispatched. A span that was
    /// extracted before returns `false` without touching the file. On error
    /// nothing reaches `sink` and the span can be extracted again.
    pub fn extract<R, S>(
        &mut self,
        reader: &mut R,
        index: usize,
        subtitle_tracks: &HashSet<u64>,
        sink: &mut S,
    ) -> Result<bool>
    where
        R: Read + Seek,
        S: BlockSink + ?Sized,
    {
        let is_last = index + 1 == self.entries.len();
        let entry = self.entry(index)?;
        if entry.has_parsed {
            trace!("Cue entry {} already extracted", index);
            return Ok(false);
        }

        // Nothing reaches the sink unless the whole span decoded
        let pending = match entry.sub_entries() {
            Some(subs) => extract_direct(reader, subs)?,
            None => extract_scan(reader, entry, is_last, subtitle_tracks)?,
        };
        let dispatched = deliver_all(pending, sink)?;

        self.entries[index].has_parsed = true;
        debug!(
            "Cue entry {} extracted, dispatched: {}",
            index, dispatched
        );
        Ok(dispatched)
    }
}

/// A decoded block waiting for the rest of its span
#[derive(Debug)]
struct PendingBlock {
    block: Block,
    timecode: i64,
    duration: u64,
    offset: u64,
}

/// Hands every pending block to `sink`, or none of them when one is refused.
fn deliver_all<S: BlockSink + ?Sized>(pending: Vec<PendingBlock>, sink: &mut S) -> Result<bool> {
    if let Some(refused) = pending
        .iter()
        .find(|p| !sink.accepts(p.block.track_number()))
    {
        return Err(Error::UnroutedBlock {
            track_number: refused.block.track_number(),
            offset: refused.offset,
        });
    }
    for p in &pending {
        sink.deliver(&p.block, p.timecode, p.duration);
    }
    Ok(!pending.is_empty())
}

/// Jumps to every sub-entry's block group and collects its block.
fn extract_direct<R: Read + Seek>(reader: &mut R, subs: &[CueEntry]) -> Result<Vec<PendingBlock>> {
    let schema = Schema::global();
    let cluster = ElementParser::new(schema.cluster());
    let block_group = ElementParser::new(schema.block_group());
    let mut pending = Vec::with_capacity(subs.len());

    for sub in subs {
        reader.seek(SeekFrom::Start(sub.start_address))?;
        if cluster.peek_id_and_length(reader)?.is_none() {
            return Err(Error::RegionMismatch {
                expected: ids::CLUSTER,
                offset: sub.start_address,
            });
        }
        reader.seek(SeekFrom::Current(sub.relative_position as i64))?;
        let position = reader.stream_position()?;

        let Some(group) = block_group.parse(reader, ParseFilter::none())? else {
            // SimpleBlocks carry no duration and are of no use as captions
            if vint::read_id(reader)? == ids::SIMPLE_BLOCK {
                trace!("Skipping simple block at {}", position);
                continue;
            }
            return Err(Error::RegionMismatch {
                expected: ids::BLOCK_GROUP,
                offset: position,
            });
        };

        let block = group
            .block(ids::BLOCK)
            .ok_or_else(|| Error::missing("Block"))?;
        pending.push(PendingBlock {
            block: block.clone(),
            timecode: sub.timecode - block.timecode() as i64,
            duration: group.uint_or(ids::BLOCK_DURATION, 0),
            offset: position,
        });
    }

    Ok(pending)
}

/// Parses every cluster of the span, keeping only subtitle block groups.
///
/// The last span runs to the end of the stream or to the first element
/// that is not a cluster. A stream ending inside a cluster is an error.
fn extract_scan<R: Read + Seek>(
    reader: &mut R,
    entry: &CueEntry,
    is_last: bool,
    subtitle_tracks: &HashSet<u64>,
) -> Result<Vec<PendingBlock>> {
    let cluster = ElementParser::new(Schema::global().cluster());
    let wanted: HashSet<u32> = [
        ids::CLUSTER_TIMECODE,
        ids::BLOCK_GROUP,
        ids::BLOCK,
        ids::BLOCK_DURATION,
    ]
    .into_iter()
    .collect();
    let filter = ParseFilter::none()
        .with_ids(&wanted)
        .with_track_numbers(subtitle_tracks);

    let stream_end = stream_len(reader)?;
    let mut pending = Vec::new();
    reader.seek(SeekFrom::Start(entry.start_address))?;

    loop {
        let position = reader.stream_position()?;
        if is_last && position >= stream_end {
            break;
        }
        let Some(cluster_el) = cluster.parse(reader, filter)? else {
            // The last span ends where the clusters run out
            if is_last {
                break;
            }
            return Err(Error::RegionMismatch {
                expected: ids::CLUSTER,
                offset: position,
            });
        };

        let mut timecode = 0i64;
        for child in cluster_el.children() {
            match child.id() {
                ids::CLUSTER_TIMECODE => timecode = child.as_uint().unwrap_or(0) as i64,
                ids::BLOCK_GROUP => {
                    let Some(block) = child.block(ids::BLOCK) else {
                        continue;
                    };
                    pending.push(PendingBlock {
                        block: block.clone(),
                        timecode,
                        duration: child.uint_or(ids::BLOCK_DURATION, 0),
                        offset: child.offset(),
                    });
                }
                _ => {}
            }
        }

        if !is_last && reader.stream_position()? >= entry.end_address {
            break;
        }
    }

    Ok(pending)
}
