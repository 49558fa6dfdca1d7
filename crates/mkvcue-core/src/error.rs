//! Error types for the mkvcue-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! variants grouped into the failure kinds a reader of a Matroska file can
//! run into: malformed encodings, ids outside the active schema, missing or
//! misplaced structure, and features the parser deliberately rejects.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mkvcue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed var-int, unsupported numeric width
    Decode,
    /// Id not present in the active schema context
    Schema,
    /// Expected element missing or misplaced
    Structural,
    /// Lacing, multi-stage compression and friends
    Unsupported,
    /// Failure of the underlying handle
    Io,
}

/// Error type for all mkvcue operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to open or read an input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on the underlying handle
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// First byte of a var-int carries no width marker
    #[error("invalid var-int at offset {offset:#x}: leading byte {byte:#04x} has no width marker")]
    VarintDecode {
        /// Byte offset of the leading byte
        offset: u64,
        /// The offending leading byte
        byte: u8,
    },

    /// Numeric leaf with a byte width its kind cannot hold
    #[error("element {id:#x} at offset {offset:#x} has unsupported width {width}")]
    UnsupportedWidth {
        /// Element id
        id: u32,
        /// Byte offset of the element
        offset: u64,
        /// Declared payload width in bytes
        width: u64,
    },

    /// Id not present in the active schema context
    #[error("element {id:#x} at offset {offset:#x} is not part of the schema of {parent:#x}")]
    SchemaViolation {
        /// Unknown element id
        id: u32,
        /// Id of the master whose schema was active
        parent: u32,
        /// Byte offset of the unknown element
        offset: u64,
    },

    /// An element extends past the end of its parent or of the stream
    #[error("element {id:#x} at offset {offset:#x} ends at {end:#x}, past the enclosing end {limit:#x}")]
    ElementOverrun {
        /// Element id
        id: u32,
        /// Byte offset of the element
        offset: u64,
        /// Declared end of the element
        end: u64,
        /// End of the enclosing region or of the stream
        limit: u64,
    },

    /// Expected element is absent
    #[error("missing required element: {0}")]
    MissingElement(String),

    /// Input does not start with an EBML header
    #[error("input does not start with an EBML header")]
    NotEbml,

    /// The segment does not follow the EBML header
    #[error("segment does not follow the EBML header at offset {offset:#x}")]
    SegmentNotFound {
        /// Offset where the segment id was expected
        offset: u64,
    },

    /// No seek table inside the scan window
    #[error("seek head not found within {window} bytes of offset {offset:#x}")]
    SeekHeadNotFound {
        /// Offset where scanning began
        offset: u64,
        /// Size of the scan window
        window: usize,
    },

    /// Region id at a resolved offset does not match
    #[error("expected element {expected:#x} at offset {offset:#x}")]
    RegionMismatch {
        /// The id the seek table promised
        expected: u32,
        /// Resolved absolute offset
        offset: u64,
    },

    /// The file lists no cue region
    #[error("no cues found in file")]
    CuesNotFound,

    /// Cue lookup on an index with no entries
    #[error("cue index is empty")]
    EmptyCueIndex,

    /// Cue index used before it was built
    #[error("cue index has not been built, call read_cues first")]
    CueIndexNotBuilt,

    /// Cue entry index out of range
    #[error("cue entry {index} out of range (len {len})")]
    CueIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of entries
        len: usize,
    },

    /// A block's track number has no consumer
    #[error("block for track {track_number} at offset {offset:#x} has no consumer, is the file corrupted?")]
    UnroutedBlock {
        /// Track number decoded from the block
        track_number: u64,
        /// Offset of the block
        offset: u64,
    },

    /// Laced block
    #[error("laced block at offset {offset:#x} (flags {flags:#04x}) is not supported")]
    Lacing {
        /// The block's flag byte
        flags: u8,
        /// Offset of the block header
        offset: u64,
    },

    /// Content compression the parser does not implement
    #[error("unsupported content encoding on track {track_number}: {details}")]
    UnsupportedCompression {
        /// Track the encoding belongs to
        track_number: u64,
        /// What was found
        details: String,
    },
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new schema violation error
    pub fn schema_violation(id: u32, parent: u32, offset: u64) -> Self {
        Self::SchemaViolation { id, parent, offset }
    }

    /// Creates a new missing element error
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingElement(what.into())
    }

    /// Creates a new unsupported compression error
    pub fn unsupported_compression(track_number: u64, details: impl Into<String>) -> Self {
        Self::UnsupportedCompression {
            track_number,
            details: details.into(),
        }
    }

    /// Returns the broad failure kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileRead { .. } | Self::Io(_) => ErrorKind::Io,
            Self::VarintDecode { .. } | Self::UnsupportedWidth { .. } => ErrorKind::Decode,
            Self::SchemaViolation { .. } => ErrorKind::Schema,
            Self::Lacing { .. } | Self::UnsupportedCompression { .. } => ErrorKind::Unsupported,
            Self::ElementOverrun { .. }
            | Self::MissingElement(_)
            | Self::NotEbml
            | Self::SegmentNotFound { .. }
            | Self::SeekHeadNotFound { .. }
            | Self::RegionMismatch { .. }
            | Self::CuesNotFound
            | Self::EmptyCueIndex
            | Self::CueIndexNotBuilt
            | Self::CueIndexOutOfRange { .. }
            | Self::UnroutedBlock { .. } => ErrorKind::Structural,
        }
    }

    /// Returns true if the caller may skip the failing region and carry on
    ///
    /// Only caller-side lookups qualify; anything raised while decoding the
    /// file itself means the file is corrupt or uses an unimplemented branch.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CuesNotFound | Self::CueIndexNotBuilt | Self::CueIndexOutOfRange { .. }
        )
    }
}
