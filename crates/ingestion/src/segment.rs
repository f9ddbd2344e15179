//! Log segments
//!
//! Boards write one CSV per capture segment named `%y%m%d_%H%M%S.csv` after
//! the capture start. Pairing that wall-clock start with the device tick of
//! the segment's first SYNC event (else its first event) gives one clock
//! sync sample per segment.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use contracts::{Event, EventType};
use tracing::{info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::reader::EventReader;
use crate::stats::IngestionStats;

/// Segment file name layout
pub const SEGMENT_NAME_FORMAT: &str = "%y%m%d_%H%M%S";

/// One capture segment
#[derive(Debug, Clone)]
pub struct LogSegment {
    pub path: PathBuf,

    /// Capture start (unix ms, UTC) when the file name carries one
    pub anchor_ms: Option<f64>,

    pub events: Vec<Event>,

    pub stats: IngestionStats,
}

impl LogSegment {
    /// Read a segment from disk
    #[instrument(name = "ingestion_load_segment", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let anchor_ms = match parse_segment_anchor(path) {
            Ok(anchor) => Some(anchor),
            Err(e) => {
                warn!(error = %e, "segment has no capture start, clock sync will skip it");
                None
            }
        };
        let (events, stats) = EventReader::from_path(path)?.read_all();
        Ok(Self {
            path: path.to_path_buf(),
            anchor_ms,
            events,
            stats,
        })
    }

    /// Build a segment from already-parsed events
    pub fn from_events(path: impl Into<PathBuf>, events: Vec<Event>) -> Self {
        let path = path.into();
        let anchor_ms = parse_segment_anchor(&path).ok();
        let mut stats = IngestionStats::new();
        for event in &events {
            stats.record_event(event);
        }
        Self {
            path,
            anchor_ms,
            events,
            stats,
        }
    }

    /// Device tick paired with the capture start: the first SYNC event,
    /// else the first event
    pub fn sync_tick(&self) -> Option<u32> {
        self.events
            .iter()
            .find(|e| e.event_type() == EventType::Sync)
            .or_else(|| self.events.first())
            .map(Event::timestamp)
    }

    /// `(device_tick, world_ms)` sample for the clock fit
    pub fn sync_sample(&self) -> Option<(f64, f64)> {
        Some((self.sync_tick()? as f64, self.anchor_ms?))
    }
}

/// Capture start encoded in a segment file name (unix ms, UTC)
pub fn parse_segment_anchor(path: &Path) -> Result<f64> {
    let bad = || IngestionError::BadSegmentName {
        path: path.to_path_buf(),
    };
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(bad)?;
    let start = NaiveDateTime::parse_from_str(stem, SEGMENT_NAME_FORMAT).map_err(|_| bad())?;
    Ok(start.and_utc().timestamp_millis() as f64)
}

/// Load segments in capture order (anchored segments by start time, then
/// unanchored ones by path). Empty segments are skipped.
pub fn load_segments(paths: &[PathBuf]) -> Result<Vec<LogSegment>> {
    let mut segments = Vec::with_capacity(paths.len());
    for path in paths {
        let segment = LogSegment::load(path)?;
        if segment.events.is_empty() {
            warn!(path = %path.display(), "skipping empty segment");
            continue;
        }
        segments.push(segment);
    }
    segments.sort_by(|a, b| match (a.anchor_ms, b.anchor_ms) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.path.cmp(&b.path),
    });
    info!(
        segments = segments.len(),
        events = segments.iter().map(|s| s.events.len()).sum::<usize>(),
        "segments loaded"
    );
    Ok(segments)
}

/// Clock sync samples of all anchored segments
pub fn clock_samples(segments: &[LogSegment]) -> Vec<(f64, f64)> {
    segments.iter().filter_map(LogSegment::sync_sample).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_anchor_from_name() {
        let anchor = parse_segment_anchor(Path::new("/data/logs/240131_235959.csv")).unwrap();
        // 2024-01-31T23:59:59Z
        assert_eq!(anchor, 1_706_745_599_000.0);
    }

    #[test]
    fn test_bad_anchor() {
        assert!(matches!(
            parse_segment_anchor(Path::new("touch_log.csv")),
            Err(IngestionError::BadSegmentName { .. })
        ));
    }

    #[test]
    fn test_sync_tick_prefers_sync_event() {
        let seg = LogSegment::from_events(
            "240101_000000.csv",
            vec![Event::rfid(10, 0, "aa"), Event::sync(25, 0)],
        );
        assert_eq!(seg.sync_tick(), Some(25));
        assert_eq!(seg.sync_sample(), Some((25.0, 1_704_067_200_000.0)));

        let seg = LogSegment::from_events("no_anchor.csv", vec![Event::rfid(10, 0, "aa")]);
        assert_eq!(seg.sync_tick(), Some(10));
        assert_eq!(seg.sync_sample(), None);
    }

    #[test]
    fn test_load_segments_orders_by_anchor() {
        let dir = tempfile::tempdir().unwrap();
        let late = dir.path().join("240101_000100.csv");
        let early = dir.path().join("240101_000000.csv");
        let empty = dir.path().join("240101_000200.csv");
        writeln!(std::fs::File::create(&late).unwrap(), "70000,0,3,0,0").unwrap();
        writeln!(std::fs::File::create(&early).unwrap(), "10000,0,3,0,0").unwrap();
        std::fs::File::create(&empty).unwrap();

        let segments = load_segments(&[late.clone(), early.clone(), empty]).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].path, early);
        assert_eq!(segments[1].path, late);
        let samples = clock_samples(&segments);
        assert_eq!(samples[1].1 - samples[0].1, 60_000.0);
    }
}
