//! Element schema registry.
//!
//! A [`SchemaNode`] tells the parser what value type to expect for an id
//! within a given nesting context. Master nodes own a lookup of their
//! children; leaves carry an optional declared default.
//!
//! The Matroska tree is built once per process by [`Schema::global`] and
//! shared by reference with every parse. Nodes are reference counted so the
//! same subtree (a block group, a cue point) can be handed to the parser on
//! its own as well as reached through its parent.

#![allow(missing_docs)]

pub mod ids;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Value type of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Unsigned integer, 1-4 or 8 bytes
    Int,
    /// Unsigned integer, 1-8 bytes
    Long,
    /// IEEE-754 single
    Float,
    /// IEEE-754 double
    Double,
    /// UTF-8 text
    String,
    /// Opaque bytes, read lazily
    Bytes,
    /// Block frame header followed by a lazily read payload
    Block,
    /// Container of child elements
    Master,
}

impl ValueKind {
    /// Short label used in tree dumps
    pub fn label(&self) -> &'static str {
        match self {
            ValueKind::Int => "INT",
            ValueKind::Long => "LONG",
            ValueKind::Float => "FLOAT",
            ValueKind::Double => "DOUBLE",
            ValueKind::String => "STR",
            ValueKind::Bytes => "BYTE",
            ValueKind::Block => "BLK",
            ValueKind::Master => "MASTER",
        }
    }
}

/// Declared default of a leaf node
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Uint(u64),
    Float(f64),
    Text(&'static str),
}

/// One node of the schema tree
#[derive(Debug, Clone)]
pub struct SchemaNode {
    id: u32,
    kind: ValueKind,
    default: Option<DefaultValue>,
    children: HashMap<u32, Arc<SchemaNode>>,
}

impl SchemaNode {
    /// Creates a leaf (or childless master) node of the given kind
    pub fn new(id: u32, kind: ValueKind) -> Self {
        Self {
            id,
            kind,
            default: None,
            children: HashMap::new(),
        }
    }

    pub fn master(id: u32) -> Self {
        Self::new(id, ValueKind::Master)
    }

    pub fn int(id: u32) -> Self {
        Self::new(id, ValueKind::Int)
    }

    pub fn long(id: u32) -> Self {
        Self::new(id, ValueKind::Long)
    }

    pub fn float(id: u32) -> Self {
        Self::new(id, ValueKind::Float)
    }

    pub fn double(id: u32) -> Self {
        Self::new(id, ValueKind::Double)
    }

    pub fn string(id: u32) -> Self {
        Self::new(id, ValueKind::String)
    }

    pub fn bytes(id: u32) -> Self {
        Self::new(id, ValueKind::Bytes)
    }

    pub fn block(id: u32) -> Self {
        Self::new(id, ValueKind::Block)
    }

    /// Sets the declared default
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Adds a child node, replacing any previous child with the same id
    pub fn with_child(mut self, child: impl Into<Arc<SchemaNode>>) -> Self {
        let child = child.into();
        self.children.insert(child.id, child);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_master(&self) -> bool {
        self.kind == ValueKind::Master
    }

    /// Looks up a direct child by id
    pub fn child(&self, id: u32) -> Option<&Arc<SchemaNode>> {
        self.children.get(&id)
    }

    /// Number of direct children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// The Matroska schema, split into the entry points the reader parses from
#[derive(Debug)]
pub struct Schema {
    ebml_header: Arc<SchemaNode>,
    seek_head: Arc<SchemaNode>,
    info: Arc<SchemaNode>,
    tracks: Arc<SchemaNode>,
    cues: Arc<SchemaNode>,
    cue_point: Arc<SchemaNode>,
    cluster: Arc<SchemaNode>,
    block_group: Arc<SchemaNode>,
    attachments: Arc<SchemaNode>,
}

static GLOBAL: OnceLock<Schema> = OnceLock::new();

impl Schema {
    /// The process-wide schema, built on first use
    pub fn global() -> &'static Schema {
        GLOBAL.get_or_init(Schema::matroska)
    }

    /// Builds a fresh Matroska schema
    pub fn matroska() -> Self {
        let ebml_header = SchemaNode::master(ids::EBML)
            .with_child(SchemaNode::int(ids::EBML_VERSION).with_default(DefaultValue::Uint(1)))
            .with_child(SchemaNode::int(ids::EBML_READ_VERSION).with_default(DefaultValue::Uint(1)))
            .with_child(SchemaNode::int(ids::EBML_MAX_ID_LENGTH).with_default(DefaultValue::Uint(4)))
            .with_child(SchemaNode::int(ids::EBML_MAX_SIZE_LENGTH).with_default(DefaultValue::Uint(8)))
            .with_child(SchemaNode::string(ids::DOC_TYPE).with_default(DefaultValue::Text("matroska")))
            .with_child(SchemaNode::int(ids::DOC_TYPE_VERSION).with_default(DefaultValue::Uint(1)))
            .with_child(
                SchemaNode::int(ids::DOC_TYPE_READ_VERSION).with_default(DefaultValue::Uint(1)),
            );

        let seek = SchemaNode::master(ids::SEEK)
            .with_child(SchemaNode::int(ids::SEEK_ID))
            .with_child(SchemaNode::long(ids::SEEK_POSITION));
        let seek_head = section(ids::SEEK_HEAD).with_child(seek);

        let chapter_translate = SchemaNode::master(ids::CHAPTER_TRANSLATE)
            .with_child(SchemaNode::int(ids::CHAPTER_TRANSLATE_EDITION_UID))
            .with_child(SchemaNode::int(ids::CHAPTER_TRANSLATE_CODEC))
            .with_child(SchemaNode::bytes(ids::CHAPTER_TRANSLATE_ID));
        let info = section(ids::INFO)
            .with_child(chapter_translate)
            .with_child(SchemaNode::bytes(ids::SEGMENT_UID))
            .with_child(SchemaNode::string(ids::SEGMENT_FILENAME))
            .with_child(SchemaNode::bytes(ids::PREV_UID))
            .with_child(SchemaNode::string(ids::PREV_FILENAME))
            .with_child(SchemaNode::bytes(ids::NEXT_UID))
            .with_child(SchemaNode::string(ids::NEXT_FILENAME))
            .with_child(SchemaNode::bytes(ids::SEGMENT_FAMILY))
            .with_child(
                SchemaNode::int(ids::TIMECODE_SCALE).with_default(DefaultValue::Uint(1_000_000)),
            )
            .with_child(SchemaNode::double(ids::DURATION))
            .with_child(SchemaNode::long(ids::DATE_UTC))
            .with_child(SchemaNode::string(ids::TITLE))
            .with_child(SchemaNode::string(ids::MUXING_APP))
            .with_child(SchemaNode::string(ids::WRITING_APP));

        let cue_track_positions = SchemaNode::master(ids::CUE_TRACK_POSITIONS)
            .with_child(SchemaNode::int(ids::CUE_TRACK))
            .with_child(SchemaNode::long(ids::CUE_CLUSTER_POSITION))
            .with_child(SchemaNode::long(ids::CUE_RELATIVE_POSITION))
            .with_child(SchemaNode::long(ids::CUE_DURATION))
            .with_child(SchemaNode::int(ids::CUE_BLOCK_NUMBER))
            .with_child(SchemaNode::long(ids::CUE_CODEC_STATE));
        let cue_point: Arc<SchemaNode> = SchemaNode::master(ids::CUE_POINT)
            .with_child(SchemaNode::long(ids::CUE_TIME))
            .with_child(cue_track_positions)
            .into();
        let cues = section(ids::CUES).with_child(Arc::clone(&cue_point));

        let block_more = SchemaNode::master(ids::BLOCK_MORE)
            .with_child(SchemaNode::int(ids::BLOCK_ADD_ID).with_default(DefaultValue::Uint(1)))
            .with_child(SchemaNode::bytes(ids::BLOCK_ADDITIONAL));
        let block_group: Arc<SchemaNode> = SchemaNode::master(ids::BLOCK_GROUP)
            .with_child(SchemaNode::block(ids::BLOCK))
            .with_child(SchemaNode::master(ids::BLOCK_ADDITIONS).with_child(block_more))
            .with_child(SchemaNode::long(ids::BLOCK_DURATION))
            .with_child(SchemaNode::int(ids::REFERENCE_PRIORITY))
            .with_child(SchemaNode::long(ids::REFERENCE_BLOCK))
            .with_child(SchemaNode::bytes(ids::CODEC_STATE))
            .with_child(SchemaNode::long(ids::DISCARD_PADDING))
            .into();
        let cluster = section(ids::CLUSTER)
            .with_child(SchemaNode::long(ids::CLUSTER_TIMECODE))
            .with_child(SchemaNode::long(ids::CLUSTER_POSITION))
            .with_child(SchemaNode::long(ids::CLUSTER_PREV_SIZE))
            .with_child(SchemaNode::block(ids::SIMPLE_BLOCK))
            .with_child(Arc::clone(&block_group));

        let tracks = section(ids::TRACKS).with_child(track_entry());

        let attached_file = SchemaNode::master(ids::ATTACHED_FILE)
            .with_child(SchemaNode::string(ids::FILE_DESCRIPTION))
            .with_child(SchemaNode::string(ids::FILE_NAME))
            .with_child(SchemaNode::string(ids::FILE_MIME_TYPE))
            .with_child(SchemaNode::bytes(ids::FILE_DATA))
            .with_child(SchemaNode::long(ids::FILE_UID));
        let attachments = section(ids::ATTACHMENTS).with_child(attached_file);

        Self {
            ebml_header: ebml_header.into(),
            seek_head: seek_head.into(),
            info: info.into(),
            tracks: tracks.into(),
            cues: cues.into(),
            cue_point,
            cluster: cluster.into(),
            block_group,
            attachments: attachments.into(),
        }
    }

    pub fn ebml_header(&self) -> &Arc<SchemaNode> {
        &self.ebml_header
    }

    pub fn seek_head(&self) -> &Arc<SchemaNode> {
        &self.seek_head
    }

    pub fn info(&self) -> &Arc<SchemaNode> {
        &self.info
    }

    pub fn tracks(&self) -> &Arc<SchemaNode> {
        &self.tracks
    }

    pub fn cues(&self) -> &Arc<SchemaNode> {
        &self.cues
    }

    pub fn cue_point(&self) -> &Arc<SchemaNode> {
        &self.cue_point
    }

    pub fn cluster(&self) -> &Arc<SchemaNode> {
        &self.cluster
    }

    pub fn block_group(&self) -> &Arc<SchemaNode> {
        &self.block_group
    }

    pub fn attachments(&self) -> &Arc<SchemaNode> {
        &self.attachments
    }
}

/// Top-level master that may carry a CRC-32 child
fn section(id: u32) -> SchemaNode {
    SchemaNode::master(id).with_child(SchemaNode::bytes(ids::CRC_32))
}

fn track_entry() -> SchemaNode {
    let video = SchemaNode::master(ids::VIDEO)
        .with_child(SchemaNode::int(ids::FLAG_INTERLACED))
        .with_child(SchemaNode::int(ids::STEREO_MODE))
        .with_child(SchemaNode::int(ids::ALPHA_MODE))
        .with_child(SchemaNode::int(ids::PIXEL_WIDTH))
        .with_child(SchemaNode::int(ids::PIXEL_HEIGHT))
        .with_child(SchemaNode::int(ids::PIXEL_CROP_BOTTOM))
        .with_child(SchemaNode::int(ids::PIXEL_CROP_TOP))
        .with_child(SchemaNode::int(ids::PIXEL_CROP_LEFT))
        .with_child(SchemaNode::int(ids::PIXEL_CROP_RIGHT))
        .with_child(SchemaNode::int(ids::DISPLAY_WIDTH))
        .with_child(SchemaNode::int(ids::DISPLAY_HEIGHT))
        .with_child(SchemaNode::int(ids::DISPLAY_UNIT))
        .with_child(SchemaNode::int(ids::ASPECT_RATIO_TYPE))
        .with_child(SchemaNode::bytes(ids::COLOUR_SPACE));

    let audio = SchemaNode::master(ids::AUDIO)
        .with_child(SchemaNode::double(ids::SAMPLING_FREQUENCY).with_default(DefaultValue::Float(8000.0)))
        .with_child(SchemaNode::double(ids::OUTPUT_SAMPLING_FREQUENCY))
        .with_child(SchemaNode::int(ids::CHANNELS).with_default(DefaultValue::Uint(1)))
        .with_child(SchemaNode::int(ids::BIT_DEPTH));

    let compression = SchemaNode::master(ids::CONTENT_COMPRESSION)
        .with_child(SchemaNode::int(ids::CONTENT_COMP_ALGO).with_default(DefaultValue::Uint(0)))
        .with_child(SchemaNode::bytes(ids::CONTENT_COMP_SETTINGS));
    let encryption = SchemaNode::master(ids::CONTENT_ENCRYPTION)
        .with_child(SchemaNode::int(ids::CONTENT_ENC_ALGO))
        .with_child(SchemaNode::bytes(ids::CONTENT_ENC_KEY_ID))
        .with_child(SchemaNode::bytes(ids::CONTENT_SIGNATURE))
        .with_child(SchemaNode::bytes(ids::CONTENT_SIG_KEY_ID))
        .with_child(SchemaNode::int(ids::CONTENT_SIG_ALGO))
        .with_child(SchemaNode::int(ids::CONTENT_SIG_HASH_ALGO));
    let encoding = SchemaNode::master(ids::CONTENT_ENCODING)
        .with_child(SchemaNode::int(ids::CONTENT_ENCODING_ORDER))
        .with_child(SchemaNode::int(ids::CONTENT_ENCODING_SCOPE).with_default(DefaultValue::Uint(1)))
        .with_child(SchemaNode::int(ids::CONTENT_ENCODING_TYPE))
        .with_child(compression)
        .with_child(encryption);
    let encodings = SchemaNode::master(ids::CONTENT_ENCODINGS).with_child(encoding);

    SchemaNode::master(ids::TRACK_ENTRY)
        .with_child(SchemaNode::int(ids::TRACK_NUMBER))
        .with_child(SchemaNode::long(ids::TRACK_UID))
        .with_child(SchemaNode::int(ids::TRACK_TYPE))
        .with_child(SchemaNode::int(ids::FLAG_ENABLED).with_default(DefaultValue::Uint(1)))
        .with_child(SchemaNode::int(ids::FLAG_DEFAULT).with_default(DefaultValue::Uint(1)))
        .with_child(SchemaNode::int(ids::FLAG_FORCED).with_default(DefaultValue::Uint(0)))
        .with_child(SchemaNode::int(ids::FLAG_LACING).with_default(DefaultValue::Uint(1)))
        .with_child(SchemaNode::int(ids::MIN_CACHE))
        .with_child(SchemaNode::int(ids::MAX_CACHE))
        .with_child(SchemaNode::long(ids::DEFAULT_DURATION))
        .with_child(SchemaNode::int(ids::MAX_BLOCK_ADDITION_ID))
        .with_child(SchemaNode::string(ids::NAME))
        .with_child(SchemaNode::string(ids::LANGUAGE).with_default(DefaultValue::Text("eng")))
        .with_child(SchemaNode::string(ids::CODEC_ID))
        .with_child(SchemaNode::bytes(ids::CODEC_PRIVATE))
        .with_child(SchemaNode::string(ids::CODEC_NAME))
        .with_child(SchemaNode::long(ids::ATTACHMENT_LINK))
        .with_child(SchemaNode::int(ids::CODEC_DECODE_ALL).with_default(DefaultValue::Uint(1)))
        .with_child(SchemaNode::long(ids::TRACK_OVERLAY))
        .with_child(SchemaNode::long(ids::CODEC_DELAY))
        .with_child(SchemaNode::long(ids::SEEK_PRE_ROLL))
        .with_child(SchemaNode::double(ids::TRACK_TIMECODE_SCALE))
        .with_child(video)
        .with_child(audio)
        .with_child(encodings)
}
