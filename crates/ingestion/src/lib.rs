//! # Ingestion
//!
//! Board log ingestion.
//!
//! Responsibilities:
//! - Parse `timestamp,board_id,event_type,data0,data1` lines into `Event`
//! - Drop and count malformed lines without stopping the read
//! - Read capture start times from segment file names for clock sync
//!
//! ## Usage Example
//!
//! ```no_run
//! use ingestion::{clock_samples, load_segments};
//! use std::path::PathBuf;
//!
//! let segments = load_segments(&[PathBuf::from("logs/240101_000000.csv")]).unwrap();
//! let samples = clock_samples(&segments);
//! for segment in &segments {
//!     println!("{}: {} events", segment.path.display(), segment.events.len());
//! }
//! # let _ = samples;
//! ```

mod error;
mod line;
mod reader;
mod segment;
mod stats;

// Re-exports
pub use error::{IngestionError, Result};
pub use line::{parse_fields, parse_line, parse_payload};
pub use reader::EventReader;
pub use segment::{
    clock_samples, load_segments, parse_segment_anchor, LogSegment, SEGMENT_NAME_FORMAT,
};
pub use stats::IngestionStats;
