//! In-memory Matroska writer for integration tests.
//!
//! Positions written into the seek table and the cues use a fixed 8-byte
//! width, so element sizes never depend on the offsets they carry and the
//! whole layout can be computed in one pass.

#![allow(dead_code)]

use mkvcue_core::schema::ids;

pub const VIDEO_TRACK: u64 = 1;
pub const SUBTITLE_TRACK: u64 = 2;
pub const AUDIO_TRACK: u64 = 3;

/// Encodes an element id, keeping its marker bits
pub fn id_bytes(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
    bytes[skip..].to_vec()
}

/// Encodes a length at the narrowest width the decoder accepts
pub fn length_bytes(length: u64) -> Vec<u8> {
    match length {
        0..=0x7E => vec![0x80 | length as u8],
        0x7F..=0x3FFE => vec![0x40 | (length >> 8) as u8, length as u8],
        0x3FFF..=0x1F_FFFE => vec![
            0x20 | (length >> 16) as u8,
            (length >> 8) as u8,
            length as u8,
        ],
        0x1F_FFFF..=0x0FFF_FFFE => {
            let mut out = (length as u32).to_be_bytes();
            out[0] |= 0x10;
            out.to_vec()
        }
        _ => wide_length_bytes(length),
    }
}

/// Encodes a length with the 8-byte `0x01` prefix
pub fn wide_length_bytes(length: u64) -> Vec<u8> {
    let mut out = vec![0x01];
    out.extend_from_slice(&length.to_be_bytes()[1..]);
    out
}

pub fn element(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = id_bytes(id);
    out.extend(length_bytes(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

pub fn master(id: u32, children: &[Vec<u8>]) -> Vec<u8> {
    element(id, &children.concat())
}

/// Unsigned integer in its narrowest width the decoder reads for any kind
pub fn uint(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let used = (8 - bytes.iter().take_while(|&&b| b == 0).count()).max(1);
    let width = if used > 4 { 8 } else { used };
    element(id, &bytes[8 - width..])
}

/// Unsigned integer written at exactly `width` bytes
pub fn uint_fixed(id: u32, value: u64, width: usize) -> Vec<u8> {
    element(id, &value.to_be_bytes()[8 - width..])
}

pub fn double(id: u32, value: f64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

pub fn string(id: u32, value: &str) -> Vec<u8> {
    element(id, value.as_bytes())
}

pub fn void(total: usize) -> Vec<u8> {
    assert!((2..=128).contains(&total));
    element(ids::VOID, &vec![0u8; total - 2])
}

/// Payload of a Block or SimpleBlock
pub fn block_payload(track: u64, timecode: i16, flags: u8, data: &[u8]) -> Vec<u8> {
    let mut out = length_bytes(track);
    out.extend_from_slice(&timecode.to_be_bytes());
    out.push(flags);
    out.extend_from_slice(data);
    out
}

#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub number: u64,
    pub track_type: u64,
    pub codec_id: &'static str,
    pub codec_private: Option<Vec<u8>>,
    /// ContentCompAlgo of a single content encoding
    pub compression: Option<u64>,
}

impl TrackSpec {
    pub fn new(number: u64, track_type: u64, codec_id: &'static str) -> Self {
        Self {
            number,
            track_type,
            codec_id,
            codec_private: None,
            compression: None,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut children = vec![
            uint(ids::TRACK_NUMBER, self.number),
            uint(ids::TRACK_UID, 1000 + self.number),
            uint(ids::TRACK_TYPE, self.track_type),
            string(ids::CODEC_ID, self.codec_id),
        ];
        if let Some(private) = &self.codec_private {
            children.push(element(ids::CODEC_PRIVATE, private));
        }
        match self.track_type {
            1 => children.push(master(
                ids::VIDEO,
                &[uint(ids::PIXEL_WIDTH, 1920), uint(ids::PIXEL_HEIGHT, 1080)],
            )),
            2 => children.push(master(
                ids::AUDIO,
                &[
                    double(ids::SAMPLING_FREQUENCY, 48000.0),
                    uint(ids::CHANNELS, 6),
                ],
            )),
            _ => {}
        }
        if let Some(algo) = self.compression {
            children.push(master(
                ids::CONTENT_ENCODINGS,
                &[master(
                    ids::CONTENT_ENCODING,
                    &[master(
                        ids::CONTENT_COMPRESSION,
                        &[uint(ids::CONTENT_COMP_ALGO, algo)],
                    )],
                )],
            ));
        }
        master(ids::TRACK_ENTRY, &children)
    }
}

#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub track: u64,
    pub timecode: i16,
    pub duration: Option<u64>,
    pub flags: u8,
    pub data: Vec<u8>,
    pub simple: bool,
}

impl GroupSpec {
    pub fn group(track: u64, timecode: i16, duration: Option<u64>, data: &[u8]) -> Self {
        Self {
            track,
            timecode,
            duration,
            flags: 0,
            data: data.to_vec(),
            simple: false,
        }
    }

    pub fn simple(track: u64, timecode: i16, data: &[u8]) -> Self {
        Self {
            track,
            timecode,
            duration: None,
            flags: 0x80,
            data: data.to_vec(),
            simple: true,
        }
    }

    fn encode(&self) -> Vec<u8> {
        let payload = block_payload(self.track, self.timecode, self.flags, &self.data);
        if self.simple {
            return element(ids::SIMPLE_BLOCK, &payload);
        }
        let mut children = vec![element(ids::BLOCK, &payload)];
        if let Some(duration) = self.duration {
            children.push(uint(ids::BLOCK_DURATION, duration));
        }
        master(ids::BLOCK_GROUP, &children)
    }
}

#[derive(Debug, Clone)]
pub struct ClusterSpec {
    pub timecode: u64,
    pub groups: Vec<GroupSpec>,
}

/// Offsets of what [`MkvBuilder::build`] wrote
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub anchor: u64,
    pub seek_head: u64,
    pub info: u64,
    pub tracks: u64,
    pub clusters: Vec<u64>,
    pub secondary_seek_head: Option<u64>,
    pub cues: u64,
    pub attachments: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct MkvBuilder {
    pub timecode_scale: u64,
    pub duration: f64,
    pub title: Option<&'static str>,
    pub tracks: Vec<TrackSpec>,
    pub clusters: Vec<ClusterSpec>,
    pub primary_track: u64,
    /// Emit subtitle cues with a CueRelativePosition
    pub direct_subtitle_cues: bool,
    /// Total size of a Void element written before the seek head
    pub void_before_seek_head: usize,
    /// Move the Cues and Attachments entries into a second seek head
    pub secondary_seek_head: bool,
    pub attachments: Vec<(&'static str, &'static str, Vec<u8>)>,
}

impl Default for MkvBuilder {
    fn default() -> Self {
        Self {
            timecode_scale: 1_000_000,
            duration: 4000.0,
            title: Some("Fixture"),
            tracks: vec![
                TrackSpec::new(VIDEO_TRACK, 1, "V_MPEG4/ISO/AVC"),
                TrackSpec::new(SUBTITLE_TRACK, 0x11, "S_TEXT/UTF8"),
                TrackSpec::new(AUDIO_TRACK, 2, "A_AAC"),
            ],
            clusters: default_clusters(),
            primary_track: VIDEO_TRACK,
            direct_subtitle_cues: false,
            void_before_seek_head: 0,
            secondary_seek_head: false,
            attachments: Vec::new(),
        }
    }
}

/// Three clusters at 0, 1000 and 2500 ticks, one caption in each
pub fn default_clusters() -> Vec<ClusterSpec> {
    vec![
        ClusterSpec {
            timecode: 0,
            groups: vec![
                GroupSpec::group(VIDEO_TRACK, 0, None, b"v0"),
                GroupSpec::simple(AUDIO_TRACK, 0, b"a0"),
                GroupSpec::group(SUBTITLE_TRACK, 100, Some(900), b"Hello"),
            ],
        },
        ClusterSpec {
            timecode: 1000,
            groups: vec![
                GroupSpec::group(VIDEO_TRACK, 0, None, b"v1"),
                GroupSpec::group(AUDIO_TRACK, 10, None, b"a1"),
                GroupSpec::group(SUBTITLE_TRACK, 500, Some(1000), b"World"),
            ],
        },
        ClusterSpec {
            timecode: 2500,
            groups: vec![
                GroupSpec::group(VIDEO_TRACK, 0, None, b"v2"),
                GroupSpec::group(SUBTITLE_TRACK, 200, Some(300), b"Bye"),
            ],
        },
    ]
}

struct CuePointSpec {
    time: u64,
    track: u64,
    cluster: u64,
    relative: Option<u64>,
}

impl MkvBuilder {
    pub fn build(&self) -> (Vec<u8>, Layout) {
        let header = master(
            ids::EBML,
            &[
                uint(ids::EBML_VERSION, 1),
                uint(ids::EBML_READ_VERSION, 1),
                string(ids::DOC_TYPE, "matroska"),
                uint(ids::DOC_TYPE_VERSION, 4),
                uint(ids::DOC_TYPE_READ_VERSION, 2),
            ],
        );

        let mut info_children = vec![
            uint(ids::TIMECODE_SCALE, self.timecode_scale),
            double(ids::DURATION, self.duration),
            string(ids::MUXING_APP, "fixture"),
            string(ids::WRITING_APP, "fixture"),
        ];
        if let Some(title) = self.title {
            info_children.push(string(ids::TITLE, title));
        }
        let info = master(ids::INFO, &info_children);

        let tracks_el = master(
            ids::TRACKS,
            &self.tracks.iter().map(TrackSpec::encode).collect::<Vec<_>>(),
        );

        // Clusters, remembering where each group sits in its cluster body
        let mut clusters = Vec::new();
        let mut group_positions = Vec::new();
        for cluster in &self.clusters {
            let mut body = uint(ids::CLUSTER_TIMECODE, cluster.timecode);
            let mut positions = Vec::new();
            for group in &cluster.groups {
                positions.push(body.len() as u64);
                body.extend(group.encode());
            }
            clusters.push(element(ids::CLUSTER, &body));
            group_positions.push(positions);
        }

        let attachments_el = (!self.attachments.is_empty()).then(|| {
            let files: Vec<Vec<u8>> = self
                .attachments
                .iter()
                .enumerate()
                .map(|(i, (name, mime, data))| {
                    master(
                        ids::ATTACHED_FILE,
                        &[
                            string(ids::FILE_NAME, name),
                            string(ids::FILE_MIME_TYPE, mime),
                            element(ids::FILE_DATA, data),
                            uint(ids::FILE_UID, i as u64 + 1),
                        ],
                    )
                })
                .collect();
            master(ids::ATTACHMENTS, &files)
        });

        // Relative layout of the segment body
        let (primary_ids, secondary_ids) = self.seek_ids(attachments_el.is_some());
        let primary_len = seek_head(&primary_ids, &[0; 8]).len() as u64;
        let secondary_len = if secondary_ids.is_empty() {
            0
        } else {
            seek_head(&secondary_ids, &[0; 8]).len() as u64
        };

        let mut rel = self.void_before_seek_head as u64;
        let seek_head_rel = rel;
        rel += primary_len;
        let info_rel = rel;
        rel += info.len() as u64;
        let tracks_rel = rel;
        rel += tracks_el.len() as u64;
        let mut cluster_rels = Vec::new();
        for cluster in &clusters {
            cluster_rels.push(rel);
            rel += cluster.len() as u64;
        }
        let secondary_rel = (secondary_len > 0).then_some(rel);
        rel += secondary_len;
        let cues_rel = rel;

        let cues_el = self.cues(&cluster_rels, &group_positions);
        rel += cues_el.len() as u64;
        let attachments_rel = attachments_el.as_ref().map(|_| rel);

        let position_of = |id: u32| -> u64 {
            match id {
                ids::INFO => info_rel,
                ids::TRACKS => tracks_rel,
                ids::CUES => cues_rel,
                ids::ATTACHMENTS => attachments_rel.unwrap_or(0),
                ids::SEEK_HEAD => secondary_rel.unwrap_or(0),
                _ => 0,
            }
        };
        let primary_positions: Vec<u64> = primary_ids.iter().map(|&id| position_of(id)).collect();
        let secondary_positions: Vec<u64> =
            secondary_ids.iter().map(|&id| position_of(id)).collect();

        let mut body = Vec::new();
        if self.void_before_seek_head > 0 {
            body.extend(void(self.void_before_seek_head));
        }
        body.extend(seek_head(&primary_ids, &primary_positions));
        body.extend(info);
        body.extend(tracks_el);
        for cluster in clusters {
            body.extend(cluster);
        }
        if !secondary_ids.is_empty() {
            body.extend(seek_head(&secondary_ids, &secondary_positions));
        }
        body.extend(cues_el);
        if let Some(attachments) = attachments_el {
            body.extend(attachments);
        }

        let mut out = header;
        out.extend(id_bytes(ids::SEGMENT));
        out.extend(wide_length_bytes(body.len() as u64));
        let anchor = out.len() as u64;
        out.extend(body);

        let layout = Layout {
            anchor,
            seek_head: anchor + seek_head_rel,
            info: anchor + info_rel,
            tracks: anchor + tracks_rel,
            clusters: cluster_rels.iter().map(|r| anchor + r).collect(),
            secondary_seek_head: secondary_rel.map(|r| anchor + r),
            cues: anchor + cues_rel,
            attachments: attachments_rel.map(|r| anchor + r),
        };
        (out, layout)
    }

    fn seek_ids(&self, has_attachments: bool) -> (Vec<u32>, Vec<u32>) {
        let mut late = vec![ids::CUES];
        if has_attachments {
            late.push(ids::ATTACHMENTS);
        }
        if self.secondary_seek_head {
            (vec![ids::INFO, ids::TRACKS, ids::SEEK_HEAD], late)
        } else {
            let mut all = vec![ids::INFO, ids::TRACKS];
            all.extend(late);
            (all, Vec::new())
        }
    }

    fn cues(&self, cluster_rels: &[u64], group_positions: &[Vec<u64>]) -> Vec<u8> {
        let mut points = Vec::new();
        for (c, cluster) in self.clusters.iter().enumerate() {
            let mut primary_seen = false;
            for (g, group) in cluster.groups.iter().enumerate() {
                let time = (cluster.timecode as i64 + group.timecode as i64) as u64;
                if group.track == self.primary_track && !primary_seen {
                    primary_seen = true;
                    points.push(CuePointSpec {
                        time,
                        track: group.track,
                        cluster: cluster_rels[c],
                        relative: None,
                    });
                } else if self.direct_subtitle_cues && group.track == SUBTITLE_TRACK {
                    points.push(CuePointSpec {
                        time,
                        track: group.track,
                        cluster: cluster_rels[c],
                        relative: Some(group_positions[c][g]),
                    });
                }
            }
        }
        points.sort_by_key(|p| p.time);

        let encoded: Vec<Vec<u8>> = points
            .iter()
            .map(|p| {
                let mut positions = vec![
                    uint(ids::CUE_TRACK, p.track),
                    uint_fixed(ids::CUE_CLUSTER_POSITION, p.cluster, 8),
                ];
                if let Some(relative) = p.relative {
                    positions.push(uint_fixed(ids::CUE_RELATIVE_POSITION, relative, 8));
                }
                master(
                    ids::CUE_POINT,
                    &[
                        uint_fixed(ids::CUE_TIME, p.time, 8),
                        master(ids::CUE_TRACK_POSITIONS, &positions),
                    ],
                )
            })
            .collect();
        master(ids::CUES, &encoded)
    }
}

fn seek_head(seek_ids: &[u32], positions: &[u64]) -> Vec<u8> {
    let entries: Vec<Vec<u8>> = seek_ids
        .iter()
        .zip(positions)
        .map(|(&id, &position)| {
            master(
                ids::SEEK,
                &[
                    uint_fixed(ids::SEEK_ID, id as u64, 4),
                    uint_fixed(ids::SEEK_POSITION, position, 8),
                ],
            )
        })
        .collect();
    master(ids::SEEK_HEAD, &entries)
}
