//! Track list.
//!
//! Field readers over a parsed Tracks element. Every TrackEntry becomes a
//! [`TrackEntry`]; audio tracks additionally get an [`AudioTrack`]
//! descriptor. Subtitle tracks are turned into caption consumers by
//! [`crate::subtitles`].

use crate::ebml::{ByteSpan, Element};
use crate::error::{Error, Result};
use crate::schema::ids;
use std::fmt;

/// Kind of a track, as stored in TrackType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    /// Video frames
    Video,
    /// Audio samples
    Audio,
    /// Mixed audio and video
    Complex,
    /// Overlay image
    Logo,
    /// Subtitles
    Subtitle,
    /// Interactive buttons
    Buttons,
    /// Control codes
    Control,
    /// Timed metadata
    Metadata,
    /// Anything else
    Unknown(u64),
}

impl From<u64> for TrackType {
    fn from(value: u64) -> Self {
        match value {
            1 => TrackType::Video,
            2 => TrackType::Audio,
            3 => TrackType::Complex,
            0x10 => TrackType::Logo,
            0x11 => TrackType::Subtitle,
            0x12 => TrackType::Buttons,
            0x20 => TrackType::Control,
            0x21 => TrackType::Metadata,
            other => TrackType::Unknown(other),
        }
    }
}

impl fmt::Display for TrackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackType::Video => f.write_str("video"),
            TrackType::Audio => f.write_str("audio"),
            TrackType::Complex => f.write_str("complex"),
            TrackType::Logo => f.write_str("logo"),
            TrackType::Subtitle => f.write_str("subtitle"),
            TrackType::Buttons => f.write_str("buttons"),
            TrackType::Control => f.write_str("control"),
            TrackType::Metadata => f.write_str("metadata"),
            TrackType::Unknown(value) => write!(f, "unknown ({:#x})", value),
        }
    }
}

/// Video settings of a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSettings {
    pub pixel_width: u64,
    pub pixel_height: u64,
    pub display_width: Option<u64>,
    pub display_height: Option<u64>,
    pub interlaced: bool,
}

/// Audio settings of a track
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSettings {
    pub sampling_frequency: f64,
    pub channels: u64,
    pub bit_depth: Option<u64>,
}

/// One ContentEncoding of a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEncoding {
    /// Order in the decoding chain
    pub order: u64,
    /// What the encoding applies to
    pub scope: u64,
    /// 0 for compression, 1 for encryption
    pub kind: u64,
    /// Compression algorithm, when a ContentCompression is present
    pub compression_algorithm: Option<u64>,
    /// Whether a ContentEncryption is present
    pub encrypted: bool,
}

impl ContentEncoding {
    fn from_element(el: &Element) -> Self {
        let compression = el.child(ids::CONTENT_COMPRESSION);
        Self {
            order: el.uint_or(ids::CONTENT_ENCODING_ORDER, 0),
            scope: el.uint_or(ids::CONTENT_ENCODING_SCOPE, 1),
            kind: el.uint_or(ids::CONTENT_ENCODING_TYPE, 0),
            compression_algorithm: compression.map(|c| c.uint_or(ids::CONTENT_COMP_ALGO, 0)),
            encrypted: el.child(ids::CONTENT_ENCRYPTION).is_some(),
        }
    }
}

/// Payload compression a consumer has to undo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Payloads are stored as-is
    None,
    /// Each payload is a zlib stream
    Zlib,
}

const ZLIB: u64 = 0;

/// Fields of one TrackEntry
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub number: u64,
    pub uid: Option<u64>,
    pub track_type: TrackType,
    pub name: Option<String>,
    pub language: String,
    pub codec_id: String,
    pub codec_name: Option<String>,
    /// Codec initialisation data, read on demand
    pub codec_private: Option<ByteSpan>,
    pub enabled: bool,
    pub default: bool,
    pub forced: bool,
    /// Nanoseconds per frame
    pub default_duration: Option<u64>,
    pub video: Option<VideoSettings>,
    pub audio: Option<AudioSettings>,
    pub encodings: Vec<ContentEncoding>,
    /// Offset of the TrackEntry element
    pub offset: u64,
    /// Total length of the TrackEntry element
    pub length: u64,
}

impl TrackEntry {
    /// Reads the fields of a parsed TrackEntry element
    pub fn from_element(el: &Element) -> Result<Self> {
        let number = el
            .uint(ids::TRACK_NUMBER)
            .ok_or_else(|| Error::missing("TrackNumber"))?;

        let video = el.child(ids::VIDEO).map(|v| VideoSettings {
            pixel_width: v.uint_or(ids::PIXEL_WIDTH, 0),
            pixel_height: v.uint_or(ids::PIXEL_HEIGHT, 0),
            display_width: v.uint(ids::DISPLAY_WIDTH),
            display_height: v.uint(ids::DISPLAY_HEIGHT),
            interlaced: v.uint_or(ids::FLAG_INTERLACED, 0) == 1,
        });
        let audio = el.child(ids::AUDIO).map(|a| AudioSettings {
            sampling_frequency: a.float(ids::SAMPLING_FREQUENCY).unwrap_or(8000.0),
            channels: a.uint_or(ids::CHANNELS, 1),
            bit_depth: a.uint(ids::BIT_DEPTH),
        });
        let encodings = el
            .child(ids::CONTENT_ENCODINGS)
            .map(|encodings| {
                encodings
                    .children_with_id(ids::CONTENT_ENCODING)
                    .map(ContentEncoding::from_element)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            number,
            uid: el.uint(ids::TRACK_UID),
            track_type: TrackType::from(el.uint_or(ids::TRACK_TYPE, 0)),
            name: el.string(ids::NAME).map(str::to_owned),
            language: el.string(ids::LANGUAGE).unwrap_or("eng").to_owned(),
            codec_id: el.string(ids::CODEC_ID).unwrap_or_default().to_owned(),
            codec_name: el.string(ids::CODEC_NAME).map(str::to_owned),
            codec_private: el.span(ids::CODEC_PRIVATE),
            enabled: el.uint_or(ids::FLAG_ENABLED, 1) == 1,
            default: el.uint_or(ids::FLAG_DEFAULT, 1) == 1,
            forced: el.uint_or(ids::FLAG_FORCED, 0) == 1,
            default_duration: el.uint(ids::DEFAULT_DURATION),
            video,
            audio,
            encodings,
            offset: el.offset(),
            length: el.total_length(),
        })
    }

    /// Compression of this track's block payloads.
    ///
    /// Only a single zlib stage is understood; anything else fails with
    /// [`Error::UnsupportedCompression`].
    pub fn compression(&self) -> Result<Compression> {
        match self.encodings.as_slice() {
            [] => Ok(Compression::None),
            [encoding] if encoding.encrypted => Err(Error::unsupported_compression(
                self.number,
                "encrypted content",
            )),
            [encoding] => match encoding.compression_algorithm {
                Some(ZLIB) => Ok(Compression::Zlib),
                Some(algo) => Err(Error::unsupported_compression(
                    self.number,
                    format!("compression algorithm {}", algo),
                )),
                None => Err(Error::unsupported_compression(
                    self.number,
                    "content encoding without compression",
                )),
            },
            many => Err(Error::unsupported_compression(
                self.number,
                format!("{} chained content encodings", many.len()),
            )),
        }
    }
}

/// Parses every TrackEntry of a Tracks element, in file order
pub fn read_track_entries(tracks: &Element) -> Result<Vec<TrackEntry>> {
    tracks
        .children_with_id(ids::TRACK_ENTRY)
        .map(TrackEntry::from_element)
        .collect()
}

/// Audio codec families recognised by codec id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCodec {
    Aac,
    Dts,
    Ac3,
    Flac,
    Unknown,
}

impl AudioCodec {
    /// Maps a Matroska codec id onto a codec family
    pub fn from_codec_id(codec_id: &str) -> Self {
        match codec_id {
            id if id.starts_with("A_AAC") => AudioCodec::Aac,
            id if id.starts_with("A_DTS") => AudioCodec::Dts,
            "A_AC3" | "A_EAC3" => AudioCodec::Ac3,
            "A_FLAC" => AudioCodec::Flac,
            _ => AudioCodec::Unknown,
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioCodec::Aac => "AAC",
            AudioCodec::Dts => "DTS",
            AudioCodec::Ac3 => "AC3",
            AudioCodec::Flac => "FLAC",
            AudioCodec::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Audio track descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub entry: TrackEntry,
    pub codec: AudioCodec,
    pub channels: u64,
}

impl AudioTrack {
    /// Builds the descriptor for an audio entry, `None` for other types
    pub fn from_entry(entry: &TrackEntry) -> Option<Self> {
        if entry.track_type != TrackType::Audio {
            return None;
        }
        Some(Self {
            codec: AudioCodec::from_codec_id(&entry.codec_id),
            channels: entry.audio.as_ref().map_or(0, |a| a.channels),
            entry: entry.clone(),
        })
    }

    /// Presentable channel layout ("Stereo", "5.1", ...)
    pub fn channel_layout(&self) -> String {
        match self.channels {
            0 => "Unknown".to_owned(),
            1 => "Mono".to_owned(),
            2 => "Stereo".to_owned(),
            6 => "5.1".to_owned(),
            7 => "6.1".to_owned(),
            8 => "7.1".to_owned(),
            n => format!("{} Channels", n),
        }
    }
}
