//! # mkvcue-core
//!
//! A library for indexing Matroska (EBML) files and pulling subtitle blocks
//! out of them without loading the file into memory.
//!
//! This crate provides the core functionality for:
//! - Decoding EBML var-ints and typed elements against a schema
//! - Locating top-level regions through the segment's seek table
//! - Building a cue index and extracting subtitle blocks per cue entry
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`ebml`]: Var-int codec, element tree, block headers and the parser
//! - [`schema`]: The Matroska element schema
//! - [`locator`]: EBML header, segment and seek table
//! - [`cues`]: Cue index and the two extraction strategies
//! - [`reader`]: Per-file reader tying everything together
//! - [`info`], [`tracks`], [`subtitles`], [`attachments`]: Field readers
//!   over parsed regions
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use mkvcue_core::MatroskaReader;
//!
//! let mut reader = MatroskaReader::open("movie.mkv")?;
//! reader.read_tracks()?;
//! reader.read_cues()?;
//!
//! for index in 0..reader.cue_count() {
//!     if reader.can_extract(index) {
//!         reader.extract(index)?;
//!     }
//! }
//!
//! for track in reader.subtitles_mut() {
//!     for caption in track.take_unread() {
//!         println!("{} --> {}", caption.start, caption.end);
//!     }
//! }
//! # Ok::<(), mkvcue_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! Extracted blocks are handed to a [`BlockSink`]. The reader dispatches to
//! its [`SubtitleTrack`]s; [`CueIndex::extract`] accepts any sink.
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod attachments;
pub mod cues;
pub mod ebml;
pub mod error;
pub mod info;
pub mod locator;
pub mod reader;
pub mod schema;
pub mod subtitles;
pub mod tracks;

// Re-export primary types for convenience
pub use attachments::FileAttachment;
pub use cues::{CueEntry, CueIndex, CueLayout};
pub use ebml::{Block, ByteSpan, Element, ElementParser, ParseFilter, Value};
pub use error::{Error, ErrorKind, Result};
pub use info::SegmentInfo;
pub use locator::{ContainerLocator, Region};
pub use reader::{MatroskaReader, ReaderConfig};
pub use schema::{Schema, SchemaNode, ValueKind};
pub use subtitles::{BlockSink, Caption, SubtitleFormat, SubtitleTrack, Timestamp};
pub use tracks::{AudioCodec, AudioTrack, Compression, TrackEntry, TrackType};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
