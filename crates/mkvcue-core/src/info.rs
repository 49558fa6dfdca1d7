//! Segment information.

use crate::ebml::Element;
use crate::schema::ids;

/// Default length of one segment tick, in nanoseconds
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

const NS_PER_MS: f64 = 1_000_000.0;

/// Fields of the Info region
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Nanoseconds per segment tick
    pub timecode_scale: u64,
    /// Duration in segment ticks
    pub duration: f64,
    /// Title of the segment
    pub title: Option<String>,
    /// Library that muxed the file
    pub muxing_app: Option<String>,
    /// Application that wrote the file
    pub writing_app: Option<String>,
}

impl SegmentInfo {
    /// Reads the fields from a parsed Info element
    pub fn from_element(info: &Element) -> Self {
        let timecode_scale = match info.uint(ids::TIMECODE_SCALE) {
            Some(0) | None => DEFAULT_TIMECODE_SCALE,
            Some(scale) => scale,
        };
        Self {
            timecode_scale,
            duration: info.float(ids::DURATION).unwrap_or(0.0),
            title: info.string(ids::TITLE).map(str::to_owned),
            muxing_app: info.string(ids::MUXING_APP).map(str::to_owned),
            writing_app: info.string(ids::WRITING_APP).map(str::to_owned),
        }
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration * self.timecode_scale as f64 / NS_PER_MS
    }

    /// Converts segment ticks to milliseconds
    pub fn ticks_to_ms(&self, ticks: i64) -> i64 {
        (ticks as i128 * self.timecode_scale as i128 / NS_PER_MS as i128) as i64
    }
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration: 0.0,
            title: None,
            muxing_app: None,
            writing_app: None,
        }
    }
}
