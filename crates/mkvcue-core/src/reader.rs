//! Per-file reader tying the envelope, track list, cue index and
//! extraction together.
//!
//! The usual order of calls is:
//!
//! 1. [`MatroskaReader::open`] parses the EBML header, the seek table and
//!    the segment info
//! 2. [`read_tracks`](MatroskaReader::read_tracks) sets up the subtitle
//!    consumers and picks the primary track
//! 3. [`read_cues`](MatroskaReader::read_cues) builds the cue index
//! 4. [`extract`](MatroskaReader::extract) per cue entry, then
//!    [`SubtitleTrack::take_unread`] to drain the new captions
//!
//! Every operation that moves the cursor takes `&mut self`, so a reader can
//! be handed to a worker thread but never used by two operations at once.

use crate::attachments::{self, FileAttachment};
use crate::cues::{CueIndex, CueLayout};
use crate::ebml::{ByteSpan, ElementParser, ParseFilter};
use crate::error::{Error, Result};
use crate::info::SegmentInfo;
use crate::locator::{ContainerLocator, Region};
use crate::schema::{ids, Schema};
use crate::subtitles::SubtitleTrack;
use crate::tracks::{self, AudioTrack, TrackEntry, TrackType};
use bytes::Bytes;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, warn};

/// Default number of bytes scanned for a displaced seek head
pub const DEFAULT_SEEK_HEAD_SCAN_WINDOW: usize = 10;

/// Configuration for [`MatroskaReader`]
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Bytes after the segment header searched for the seek head
    pub seek_head_scan_window: usize,
    /// Whether a seek head listed by the first one is parsed too
    pub follow_secondary_seek_head: bool,
    /// Track whose cues form the cue index backbone (default: first video track)
    pub primary_track: Option<u64>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            seek_head_scan_window: DEFAULT_SEEK_HEAD_SCAN_WINDOW,
            follow_secondary_seek_head: true,
            primary_track: None,
        }
    }
}

impl ReaderConfig {
    /// Creates a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the seek head scan window
    pub fn seek_head_scan_window(mut self, bytes: usize) -> Self {
        self.seek_head_scan_window = bytes;
        self
    }

    /// Enables or disables parsing of a secondary seek head
    pub fn follow_secondary_seek_head(mut self, follow: bool) -> Self {
        self.follow_secondary_seek_head = follow;
        self
    }

    /// Overrides the primary track
    pub fn primary_track(mut self, track_number: u64) -> Self {
        self.primary_track = Some(track_number);
        self
    }
}

/// Reader over one Matroska file
#[derive(Debug)]
pub struct MatroskaReader<R> {
    inner: R,
    config: ReaderConfig,
    locator: ContainerLocator,
    info: SegmentInfo,
    tracks: Option<Vec<TrackEntry>>,
    primary_track: Option<u64>,
    subtitles: Vec<SubtitleTrack>,
    subtitle_numbers: HashSet<u64>,
    audio_tracks: Vec<AudioTrack>,
    attachments: Option<Vec<FileAttachment>>,
    cues: Option<CueIndex>,
}

impl MatroskaReader<BufReader<File>> {
    /// Opens a file with the default configuration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, ReaderConfig::default())
    }

    /// Opens a file with a custom configuration
    pub fn open_with_config(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        debug!("Opened {}", path.display());
        Self::with_config(BufReader::new(file), config)
    }
}

impl<R: Read + Seek> MatroskaReader<R> {
    /// Wraps a handle with the default configuration
    pub fn new(inner: R) -> Result<Self> {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Wraps a handle, parsing the envelope and the segment info
    pub fn with_config(mut inner: R, config: ReaderConfig) -> Result<Self> {
        let locator = ContainerLocator::locate(&mut inner, &config)?;

        let info_offset = locator.region_offset(Region::Info);
        let info = if info_offset == 0 {
            warn!("Seek table lists no segment info, using defaults");
            SegmentInfo::default()
        } else {
            inner.seek(SeekFrom::Start(info_offset))?;
            let el = ElementParser::new(Schema::global().info())
                .parse(&mut inner, ParseFilter::none())?
                .ok_or(Error::RegionMismatch {
                    expected: ids::INFO,
                    offset: info_offset,
                })?;
            SegmentInfo::from_element(&el)
        };
        debug!(
            "Segment info: scale {} ns, duration {:.0} ms",
            info.timecode_scale,
            info.duration_ms()
        );

        Ok(Self {
            inner,
            config,
            locator,
            info,
            tracks: None,
            primary_track: None,
            subtitles: Vec::new(),
            subtitle_numbers: HashSet::new(),
            audio_tracks: Vec::new(),
            attachments: None,
            cues: None,
        })
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn locator(&self) -> &ContainerLocator {
        &self.locator
    }

    pub fn info(&self) -> &SegmentInfo {
        &self.info
    }

    /// Segment duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.info.duration_ms()
    }

    /// Absolute offset of a region, 0 when absent
    pub fn region_offset(&self, region: Region) -> u64 {
        self.locator.region_offset(region)
    }

    /// Payload length of a region, 0 when absent
    pub fn region_length(&mut self, region: Region) -> Result<u64> {
        self.locator.region_length(&mut self.inner, region)
    }

    /// Parses the track list. Later calls do nothing.
    pub fn read_tracks(&mut self) -> Result<()> {
        if self.tracks.is_some() {
            return Ok(());
        }

        let offset = self.locator.region_offset(Region::Tracks);
        if offset == 0 {
            return Err(Error::missing("Tracks"));
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        let el = ElementParser::new(Schema::global().tracks())
            .parse(&mut self.inner, ParseFilter::none())?
            .ok_or(Error::RegionMismatch {
                expected: ids::TRACKS,
                offset,
            })?;
        let entries = tracks::read_track_entries(&el)?;

        let mut subtitles = Vec::new();
        let mut audio_tracks = Vec::new();
        for entry in &entries {
            match entry.track_type {
                TrackType::Subtitle => {
                    subtitles.push(SubtitleTrack::from_entry(entry, self.info.timecode_scale)?)
                }
                TrackType::Audio => audio_tracks.extend(AudioTrack::from_entry(entry)),
                _ => {}
            }
        }

        let primary_track = self.config.primary_track.or_else(|| {
            entries
                .iter()
                .find(|e| e.track_type == TrackType::Video)
                .map(|e| e.number)
        });
        debug!(
            "Tracks parsed: {} entries, {} subtitle, {} audio, primary {:?}",
            entries.len(),
            subtitles.len(),
            audio_tracks.len(),
            primary_track
        );

        self.subtitle_numbers = subtitles.iter().map(SubtitleTrack::track_number).collect();
        self.subtitles = subtitles;
        self.audio_tracks = audio_tracks;
        self.primary_track = primary_track;
        self.tracks = Some(entries);
        Ok(())
    }

    /// Track entries; empty until [`read_tracks`](Self::read_tracks)
    pub fn tracks(&self) -> &[TrackEntry] {
        self.tracks.as_deref().unwrap_or_default()
    }

    pub fn primary_track(&self) -> Option<u64> {
        self.primary_track
    }

    pub fn subtitles(&self) -> &[SubtitleTrack] {
        &self.subtitles
    }

    /// Subtitle consumers, for draining captions
    pub fn subtitles_mut(&mut self) -> &mut [SubtitleTrack] {
        &mut self.subtitles
    }

    pub fn audio_tracks(&self) -> &[AudioTrack] {
        &self.audio_tracks
    }

    /// Parses the attachment list. A file without attachments yields an
    /// empty list.
    pub fn read_attachments(&mut self) -> Result<()> {
        if self.attachments.is_some() {
            return Ok(());
        }

        let offset = self.locator.region_offset(Region::Attachments);
        if offset == 0 {
            debug!("There are no attachments");
            self.attachments = Some(Vec::new());
            return Ok(());
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        let el = ElementParser::new(Schema::global().attachments())
            .parse(&mut self.inner, ParseFilter::none())?
            .ok_or(Error::RegionMismatch {
                expected: ids::ATTACHMENTS,
                offset,
            })?;
        self.attachments = Some(attachments::read_attachments(&el)?);
        Ok(())
    }

    /// Attachments; empty until [`read_attachments`](Self::read_attachments)
    pub fn attachments(&self) -> &[FileAttachment] {
        self.attachments.as_deref().unwrap_or_default()
    }

    /// Reads the bytes of a lazy span, restoring the cursor afterwards
    pub fn read_span(&mut self, span: ByteSpan) -> Result<Bytes> {
        span.read(&mut self.inner)
    }

    /// Builds the cue index, reading the track list first if needed.
    /// Later calls do nothing.
    pub fn read_cues(&mut self) -> Result<()> {
        if self.cues.is_some() {
            return Ok(());
        }
        self.read_tracks()?;

        let cues_position = self.locator.region_offset(Region::Cues);
        if cues_position == 0 {
            return Err(Error::CuesNotFound);
        }
        let layout = CueLayout {
            primary_track: self.primary_track,
            subtitle_tracks: &self.subtitle_numbers,
            anchor: self.locator.anchor(),
            cues_position,
            duration: self.info.duration,
        };
        let index = CueIndex::build(&mut self.inner, &layout)?;
        self.cues = Some(index);
        Ok(())
    }

    /// The cue index built by [`read_cues`](Self::read_cues)
    pub fn cue_index(&self) -> Result<&CueIndex> {
        self.cues.as_ref().ok_or(Error::CueIndexNotBuilt)
    }

    /// Number of cue entries, 0 before the index is built
    pub fn cue_count(&self) -> usize {
        self.cues.as_ref().map_or(0, CueIndex::len)
    }

    pub fn cue_start_address(&self, index: usize) -> Result<u64> {
        Ok(self.cue_index()?.entry(index)?.start_address())
    }

    pub fn cue_end_address(&self, index: usize) -> Result<u64> {
        Ok(self.cue_index()?.entry(index)?.end_address())
    }

    pub fn cue_timecode(&self, index: usize) -> Result<i64> {
        Ok(self.cue_index()?.entry(index)?.timecode())
    }

    pub fn cue_next_timecode(&self, index: usize) -> Result<i64> {
        Ok(self.cue_index()?.entry(index)?.next_timecode())
    }

    /// Cue entry to start from for a time in segment ticks
    pub fn cue_index_at_time(&self, time: i64) -> Result<usize> {
        self.cue_index()?.lookup_by_time(time)
    }

    /// Cue entry to start from for a file offset
    pub fn cue_index_at_address(&self, address: u64) -> Result<usize> {
        self.cue_index()?.lookup_by_address(address)
    }

    /// Whether extracting cue entry `index` may still yield captions
    pub fn can_extract(&self, index: usize) -> bool {
        !self.subtitles.is_empty()
            && self
                .cues
                .as_ref()
                .map_or(false, |cues| cues.can_extract(index))
    }

    /// Extracts the subtitle blocks of cue entry `index` into the subtitle
    /// tracks. Returns whether anything new was dispatched.
    pub fn extract(&mut self, index: usize) -> Result<bool> {
        let Self {
            inner,
            cues,
            subtitles,
            subtitle_numbers,
            ..
        } = self;
        let cues = cues.as_mut().ok_or(Error::CueIndexNotBuilt)?;
        cues.extract(inner, index, subtitle_numbers, subtitles)
    }

    /// Absolute offset of the first cluster the cues point to
    pub fn read_video_start_address(&mut self) -> Result<u64> {
        let cues_position = self.locator.region_offset(Region::Cues);
        if cues_position == 0 {
            return Err(Error::CuesNotFound);
        }
        self.inner.seek(SeekFrom::Start(cues_position))?;
        let found = ElementParser::new(Schema::global().cues())
            .search_once(&mut self.inner, ids::CUE_CLUSTER_POSITION)?
            .and_then(|el| el.as_uint())
            .ok_or_else(|| Error::missing("CueClusterPosition"))?;
        Ok(self.locator.anchor() + found)
    }

    /// Mutable access to the underlying handle
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the reader, returning the underlying handle
    pub fn into_inner(self) -> R {
        self.inner
    }
}
