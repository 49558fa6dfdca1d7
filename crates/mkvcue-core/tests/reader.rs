//! End-to-end tests of the reader over generated Matroska files.

mod common;

use common::{GroupSpec, Layout, MkvBuilder, TrackSpec, AUDIO_TRACK, SUBTITLE_TRACK, VIDEO_TRACK};
use mkvcue_core::{
    AudioCodec, Block, BlockSink, CueIndex, CueLayout, Error, MatroskaReader, ReaderConfig, Region,
    Timestamp,
};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::io::{Cursor, Write};

type MemReader = MatroskaReader<Cursor<Vec<u8>>>;

fn open(builder: &MkvBuilder) -> (MemReader, Layout) {
    open_with(builder, ReaderConfig::default())
}

fn open_with(builder: &MkvBuilder, config: ReaderConfig) -> (MemReader, Layout) {
    let (bytes, layout) = builder.build();
    let reader = MatroskaReader::with_config(Cursor::new(bytes), config).unwrap();
    (reader, layout)
}

/// Extracts every cue entry and returns (start ms, end ms, payload)
fn extract_all(reader: &mut MemReader) -> Vec<(i64, i64, Vec<u8>)> {
    reader.read_cues().unwrap();
    for index in 0..reader.cue_count() {
        if reader.can_extract(index) {
            reader.extract(index).unwrap();
        }
    }

    let captions = reader.subtitles_mut()[0].take_unread();
    captions
        .into_iter()
        .map(|caption| {
            let payload = reader.read_span(caption.block.payload()).unwrap();
            (caption.start.0, caption.end.0, payload.to_vec())
        })
        .collect()
}

fn expected_captions() -> Vec<(i64, i64, Vec<u8>)> {
    vec![
        (100, 1000, b"Hello".to_vec()),
        (1500, 2500, b"World".to_vec()),
        (2700, 3000, b"Bye".to_vec()),
    ]
}

#[test]
fn test_locates_regions() {
    let (reader, layout) = open(&MkvBuilder::default());
    let locator = reader.locator();

    assert_eq!(locator.doc_type(), "matroska");
    assert_eq!(locator.anchor(), layout.anchor);
    assert_eq!(reader.region_offset(Region::Info), layout.info);
    assert_eq!(reader.region_offset(Region::Tracks), layout.tracks);
    assert_eq!(reader.region_offset(Region::Cues), layout.cues);
    assert_eq!(reader.region_offset(Region::Attachments), 0);
    assert_eq!(reader.region_offset(Region::Chapters), 0);
}

#[test]
fn test_region_length() {
    let (mut reader, _) = open(&MkvBuilder::default());
    assert!(reader.region_length(Region::Tracks).unwrap() > 0);
    assert_eq!(reader.region_length(Region::Chapters).unwrap(), 0);
}

#[test]
fn test_segment_info() {
    let (reader, _) = open(&MkvBuilder::default());
    let info = reader.info();
    assert_eq!(info.timecode_scale, 1_000_000);
    assert_eq!(info.title.as_deref(), Some("Fixture"));
    assert_eq!(info.muxing_app.as_deref(), Some("fixture"));
    assert_eq!(reader.duration_ms(), 4000.0);
}

#[test]
fn test_tracks() {
    let (mut reader, _) = open(&MkvBuilder::default());
    reader.read_tracks().unwrap();

    let numbers: Vec<u64> = reader.tracks().iter().map(|t| t.number).collect();
    assert_eq!(numbers, vec![VIDEO_TRACK, SUBTITLE_TRACK, AUDIO_TRACK]);
    assert_eq!(reader.primary_track(), Some(VIDEO_TRACK));
    assert_eq!(reader.subtitles().len(), 1);
    assert_eq!(reader.subtitles()[0].track_number(), SUBTITLE_TRACK);
    assert!(!reader.subtitles()[0].is_compressed());

    let audio = &reader.audio_tracks()[0];
    assert_eq!(audio.codec, AudioCodec::Aac);
    assert_eq!(audio.channel_layout(), "5.1");

    let video = reader.tracks()[0].video.as_ref().unwrap();
    assert_eq!((video.pixel_width, video.pixel_height), (1920, 1080));

    // Idempotent
    reader.read_tracks().unwrap();
    assert_eq!(reader.subtitles().len(), 1);
}

#[test]
fn test_primary_track_override() {
    let config = ReaderConfig::new().primary_track(SUBTITLE_TRACK);
    let (mut reader, _) = open_with(&MkvBuilder::default(), config);
    reader.read_tracks().unwrap();
    assert_eq!(reader.primary_track(), Some(SUBTITLE_TRACK));
}

#[test]
fn test_cue_index() {
    let (mut reader, layout) = open(&MkvBuilder::default());
    reader.read_cues().unwrap();

    assert_eq!(reader.cue_count(), 3);
    for (index, &time) in [0, 1000, 2500].iter().enumerate() {
        assert_eq!(reader.cue_timecode(index).unwrap(), time);
        assert_eq!(reader.cue_start_address(index).unwrap(), layout.clusters[index]);
    }
    assert_eq!(reader.cue_end_address(0).unwrap(), layout.clusters[1] - 1);
    assert_eq!(reader.cue_next_timecode(0).unwrap(), 1000);
    assert_eq!(reader.cue_end_address(2).unwrap(), layout.cues - 1);
    assert_eq!(reader.cue_next_timecode(2).unwrap(), 4000);

    let index = reader.cue_index().unwrap();
    assert!(!index.has_direct_subtitle_positions());
    assert!(index.entries().iter().all(|e| e.sub_entries().is_none()));
    assert_eq!(index.cues_position(), layout.cues);
}

#[test]
fn test_cue_lookup() {
    let (mut reader, layout) = open(&MkvBuilder::default());
    reader.read_cues().unwrap();

    assert_eq!(reader.cue_index_at_time(1200).unwrap(), 1);
    assert_eq!(reader.cue_index_at_time(0).unwrap(), 0);
    assert_eq!(reader.cue_index_at_time(100_000).unwrap(), 2);
    assert_eq!(reader.cue_index_at_address(layout.clusters[1] + 5).unwrap(), 1);
    assert_eq!(reader.cue_index_at_address(0).unwrap(), 0);
}

#[test]
fn test_cue_access_before_build() {
    let (mut reader, _) = open(&MkvBuilder::default());
    assert_eq!(reader.cue_count(), 0);
    assert!(matches!(reader.cue_index(), Err(Error::CueIndexNotBuilt)));
    assert!(matches!(reader.extract(0), Err(Error::CueIndexNotBuilt)));
    assert!(!reader.can_extract(0));
}

#[test]
fn test_cue_entry_out_of_range() {
    let (mut reader, _) = open(&MkvBuilder::default());
    reader.read_cues().unwrap();
    assert!(matches!(
        reader.cue_timecode(3),
        Err(Error::CueIndexOutOfRange { index: 3, len: 3 })
    ));
    assert!(matches!(
        reader.extract(3),
        Err(Error::CueIndexOutOfRange { index: 3, len: 3 })
    ));
}

#[test]
fn test_scan_extraction() {
    let (mut reader, _) = open(&MkvBuilder::default());
    assert_eq!(extract_all(&mut reader), expected_captions());
}

#[test]
fn test_direct_extraction_matches_scan() {
    let direct = MkvBuilder {
        direct_subtitle_cues: true,
        ..MkvBuilder::default()
    };
    let (mut reader, layout) = open(&direct);
    reader.read_cues().unwrap();

    let index = reader.cue_index().unwrap();
    assert!(index.has_direct_subtitle_positions());
    assert_eq!(index.len(), 3);
    for (i, entry) in index.entries().iter().enumerate() {
        let subs = entry.sub_entries().unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].start_address(), layout.clusters[i]);
    }

    assert_eq!(extract_all(&mut reader), expected_captions());
}

#[test]
fn test_extract_is_idempotent() {
    let (mut reader, _) = open(&MkvBuilder::default());
    reader.read_cues().unwrap();

    assert!(reader.can_extract(1));
    assert!(reader.extract(1).unwrap());
    assert!(!reader.can_extract(1));
    assert_eq!(reader.subtitles()[0].unread_len(), 1);

    assert!(!reader.extract(1).unwrap());
    assert_eq!(reader.subtitles()[0].unread_len(), 1);
}

#[test]
fn test_extract_entry_without_captions() {
    let mut builder = MkvBuilder::default();
    builder.clusters[1]
        .groups
        .retain(|group| group.track != SUBTITLE_TRACK);
    let (mut reader, _) = open(&builder);
    reader.read_cues().unwrap();

    assert!(!reader.extract(1).unwrap());
    assert!(!reader.can_extract(1));
    assert_eq!(reader.subtitles()[0].unread_len(), 0);
}

#[test]
fn test_no_subtitle_tracks() {
    let mut builder = MkvBuilder::default();
    builder.tracks.retain(|track| track.number != SUBTITLE_TRACK);
    for cluster in &mut builder.clusters {
        cluster.groups.retain(|group| group.track != SUBTITLE_TRACK);
    }
    let (mut reader, _) = open(&builder);
    reader.read_cues().unwrap();
    assert!(reader.subtitles().is_empty());
    assert!(!reader.can_extract(0));
}

#[test]
fn test_timecode_scale_applies_to_captions() {
    let builder = MkvBuilder {
        timecode_scale: 100_000,
        ..MkvBuilder::default()
    };
    let (mut reader, _) = open(&builder);
    let starts: Vec<i64> = extract_all(&mut reader).iter().map(|c| c.0).collect();
    assert_eq!(starts, vec![10, 150, 270]);
}

#[test]
fn test_laced_block_is_rejected() {
    let mut builder = MkvBuilder::default();
    builder.clusters[0].groups[2].flags = 0x06;
    let (mut reader, _) = open(&builder);
    reader.read_cues().unwrap();

    let err = reader.extract(0).unwrap_err();
    assert!(matches!(err, Error::Lacing { flags: 0x06, .. }));
    // A failed extraction can be retried
    assert!(reader.can_extract(0));
}

#[test]
fn test_keyframe_flag_is_accepted() {
    let mut builder = MkvBuilder::default();
    builder.clusters[0].groups[2].flags = 0x80;
    let (mut reader, _) = open(&builder);
    reader.read_cues().unwrap();
    assert!(reader.extract(0).unwrap());
}

#[test]
fn test_simple_block_at_direct_position_is_skipped() {
    let mut builder = MkvBuilder {
        direct_subtitle_cues: true,
        ..MkvBuilder::default()
    };
    builder.clusters[0].groups[2] = GroupSpec::simple(SUBTITLE_TRACK, 100, b"Hello");
    let (mut reader, _) = open(&builder);
    reader.read_cues().unwrap();

    assert!(!reader.extract(0).unwrap());
    assert!(reader.extract(1).unwrap());
    assert_eq!(reader.subtitles()[0].unread_len(), 1);
}

#[test]
fn test_refusing_sink_reports_unrouted_block() {
    struct Refuse;
    impl BlockSink for Refuse {
        fn accepts(&self, _track_number: u64) -> bool {
            false
        }

        fn deliver(&mut self, _block: &Block, _timecode: i64, _duration: u64) {
            panic!("refused tracks are never delivered");
        }
    }

    let (bytes, layout) = MkvBuilder::default().build();
    let mut cursor = Cursor::new(bytes);
    let subtitle_tracks: HashSet<u64> = [SUBTITLE_TRACK].into_iter().collect();
    let cue_layout = CueLayout {
        primary_track: Some(VIDEO_TRACK),
        subtitle_tracks: &subtitle_tracks,
        anchor: layout.anchor,
        cues_position: layout.cues,
        duration: 4000.0,
    };
    let mut index = CueIndex::build(&mut cursor, &cue_layout).unwrap();

    let err = index
        .extract(&mut cursor, 0, &subtitle_tracks, &mut Refuse)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnroutedBlock {
            track_number: SUBTITLE_TRACK,
            ..
        }
    ));
}

#[test]
fn test_video_start_address() {
    let (mut reader, layout) = open(&MkvBuilder::default());
    assert_eq!(reader.read_video_start_address().unwrap(), layout.clusters[0]);
}

#[test]
fn test_void_before_seek_head() {
    let builder = MkvBuilder {
        void_before_seek_head: 5,
        ..MkvBuilder::default()
    };
    let (mut reader, layout) = open(&builder);
    assert_eq!(layout.seek_head, layout.anchor + 5);
    // Positions stay relative to the segment body, not to the seek head
    assert_eq!(reader.locator().anchor(), layout.anchor);
    assert_eq!(reader.region_offset(Region::Tracks), layout.tracks);
    assert_eq!(extract_all(&mut reader), expected_captions());
}

#[test]
fn test_seek_head_outside_window() {
    let builder = MkvBuilder {
        void_before_seek_head: 20,
        ..MkvBuilder::default()
    };
    let (bytes, _) = builder.build();
    let err = MatroskaReader::new(Cursor::new(bytes.clone())).unwrap_err();
    assert!(matches!(err, Error::SeekHeadNotFound { window: 10, .. }));

    let config = ReaderConfig::new().seek_head_scan_window(32);
    assert!(MatroskaReader::with_config(Cursor::new(bytes), config).is_ok());
}

#[test]
fn test_secondary_seek_head() {
    let builder = MkvBuilder {
        secondary_seek_head: true,
        attachments: vec![("font.ttf", "font/ttf", b"glyphs".to_vec())],
        ..MkvBuilder::default()
    };
    let (reader, layout) = open(&builder);
    assert!(layout.secondary_seek_head.is_some());
    assert_eq!(reader.locator().seek_heads().len(), 2);
    assert_eq!(reader.region_offset(Region::Cues), layout.cues);
    assert_eq!(reader.region_offset(Region::Attachments), layout.attachments.unwrap());

    let config = ReaderConfig::new().follow_secondary_seek_head(false);
    let (mut reader, _) = open_with(&builder, config);
    assert_eq!(reader.locator().seek_heads().len(), 1);
    assert_eq!(reader.region_offset(Region::Cues), 0);
    assert!(matches!(reader.read_cues(), Err(Error::CuesNotFound)));
}

#[test]
fn test_attachments() {
    let builder = MkvBuilder {
        attachments: vec![
            ("font.ttf", "font/ttf", b"glyphs".to_vec()),
            ("cover.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0]),
        ],
        ..MkvBuilder::default()
    };
    let (mut reader, _) = open(&builder);
    reader.read_attachments().unwrap();

    let attachments = reader.attachments().to_vec();
    let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["font.ttf", "cover.jpg"]);
    assert_eq!(attachments[1].mime_type, "image/jpeg");
    assert_eq!(attachments[0].size(), 6);
    assert_eq!(&reader.read_span(attachments[0].data).unwrap()[..], b"glyphs");
    assert_eq!(attachments[1].uid, Some(2));
}

#[test]
fn test_no_attachments() {
    let (mut reader, _) = open(&MkvBuilder::default());
    reader.read_attachments().unwrap();
    assert!(reader.attachments().is_empty());
}

#[test]
fn test_zlib_subtitles_are_flagged() {
    let mut builder = MkvBuilder::default();
    builder.tracks[1].compression = Some(0);
    let (mut reader, _) = open(&builder);
    reader.read_cues().unwrap();
    assert!(reader.subtitles()[0].is_compressed());

    reader.extract(0).unwrap();
    let captions = reader.subtitles_mut()[0].take_unread();
    assert!(captions[0].compressed);
}

#[test]
fn test_unsupported_compression() {
    let mut builder = MkvBuilder::default();
    builder.tracks[1].compression = Some(3);
    let (mut reader, _) = open(&builder);
    let err = reader.read_tracks().unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedCompression {
            track_number: SUBTITLE_TRACK,
            ..
        }
    ));
}

#[test]
fn test_codec_private_span() {
    let mut builder = MkvBuilder::default();
    builder.tracks[1] = TrackSpec {
        codec_private: Some(b"[Script Info]".to_vec()),
        ..TrackSpec::new(SUBTITLE_TRACK, 0x11, "S_TEXT/ASS")
    };
    let (mut reader, _) = open(&builder);
    reader.read_tracks().unwrap();

    let span = reader.tracks()[1].codec_private.unwrap();
    assert_eq!(&reader.read_span(span).unwrap()[..], b"[Script Info]");
}

#[test]
fn test_open_from_disk() {
    let (bytes, _) = MkvBuilder::default().build();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let mut reader = MatroskaReader::open(file.path()).unwrap();
    reader.read_cues().unwrap();
    reader.extract(2).unwrap();
    let captions = reader.subtitles_mut()[0].take_unread();
    assert_eq!(captions.len(), 1);
    assert_eq!(captions[0].start, Timestamp(2700));
}

#[test]
fn test_not_matroska() {
    let err = MatroskaReader::new(Cursor::new(b"RIFF....WAVE".to_vec())).unwrap_err();
    assert!(matches!(err, Error::NotEbml));
}

/// Accepts one track and records the absolute tick of every block it gets
struct OnlyTrack {
    track: u64,
    delivered: Vec<i64>,
}

impl OnlyTrack {
    fn new(track: u64) -> Self {
        Self {
            track,
            delivered: Vec::new(),
        }
    }
}

impl BlockSink for OnlyTrack {
    fn accepts(&self, track_number: u64) -> bool {
        track_number == self.track
    }

    fn deliver(&mut self, block: &Block, timecode: i64, _duration: u64) {
        self.delivered.push(timecode + block.timecode() as i64);
    }
}

fn subtitle_cue_layout<'a>(layout: &Layout, subtitle_tracks: &'a HashSet<u64>) -> CueLayout<'a> {
    CueLayout {
        primary_track: Some(VIDEO_TRACK),
        subtitle_tracks,
        anchor: layout.anchor,
        cues_position: layout.cues,
        duration: 4000.0,
    }
}

/// Cluster 1 without a video block, so the first span covers clusters 0 and 1
fn two_cluster_span() -> MkvBuilder {
    let mut builder = MkvBuilder::default();
    builder.clusters[1]
        .groups
        .retain(|group| group.track != VIDEO_TRACK);
    builder
}

#[test]
fn test_failure_in_later_cluster_delivers_nothing() {
    let mut builder = two_cluster_span();
    builder.clusters[1].groups[1].flags = 0x06;
    let (mut reader, _) = open(&builder);
    reader.read_cues().unwrap();
    assert_eq!(reader.cue_count(), 2);

    for _ in 0..2 {
        let err = reader.extract(0).unwrap_err();
        assert!(matches!(err, Error::Lacing { flags: 0x06, .. }));
        assert_eq!(reader.subtitles()[0].unread_len(), 0);
        assert!(reader.can_extract(0));
    }

    assert!(reader.extract(1).unwrap());
    assert_eq!(reader.subtitles()[0].unread_len(), 1);
}

#[test]
fn test_refused_block_in_later_cluster_delivers_nothing() {
    let (bytes, layout) = two_cluster_span().build();
    let subtitle_tracks: HashSet<u64> = [SUBTITLE_TRACK].into_iter().collect();
    let mut cursor = Cursor::new(bytes);
    let mut index =
        CueIndex::build(&mut cursor, &subtitle_cue_layout(&layout, &subtitle_tracks)).unwrap();

    // Audio blocks pass the scan filter but the sink only takes subtitles
    let scanned: HashSet<u64> = [SUBTITLE_TRACK, AUDIO_TRACK].into_iter().collect();
    let mut sink = OnlyTrack::new(SUBTITLE_TRACK);
    let err = index
        .extract(&mut cursor, 0, &scanned, &mut sink)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnroutedBlock {
            track_number: AUDIO_TRACK,
            ..
        }
    ));
    assert!(sink.delivered.is_empty());
    assert!(index.can_extract(0));

    assert!(index
        .extract(&mut cursor, 0, &subtitle_tracks, &mut sink)
        .unwrap());
    assert_eq!(sink.delivered, vec![100, 1500]);
}

#[test]
fn test_stream_ending_inside_last_cluster_is_an_error() {
    let (bytes, layout) = MkvBuilder::default().build();
    let subtitle_tracks: HashSet<u64> = [SUBTITLE_TRACK].into_iter().collect();
    let mut index = CueIndex::build(
        &mut Cursor::new(bytes.clone()),
        &subtitle_cue_layout(&layout, &subtitle_tracks),
    )
    .unwrap();
    let last = index.len() - 1;
    let last_cluster = layout.clusters[2] as usize;
    assert_eq!(index.entries()[last].start_address(), layout.clusters[2]);
    let mut sink = OnlyTrack::new(SUBTITLE_TRACK);

    // Cut inside the cluster body
    let mut truncated = Cursor::new(bytes[..last_cluster + 12].to_vec());
    let err = index
        .extract(&mut truncated, last, &subtitle_tracks, &mut sink)
        .unwrap_err();
    assert!(matches!(err, Error::ElementOverrun { .. }));

    // Cut inside the cluster id
    let mut truncated = Cursor::new(bytes[..last_cluster + 2].to_vec());
    let err = index
        .extract(&mut truncated, last, &subtitle_tracks, &mut sink)
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    assert!(sink.delivered.is_empty());
    assert!(index.can_extract(last));

    // Ending right after the last cluster closes the span cleanly
    let mut clipped = Cursor::new(bytes[..layout.cues as usize].to_vec());
    assert!(index
        .extract(&mut clipped, last, &subtitle_tracks, &mut sink)
        .unwrap());
    assert_eq!(sink.delivered, vec![2700]);
    assert!(!index.can_extract(last));
}
