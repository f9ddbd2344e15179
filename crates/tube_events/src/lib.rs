//! # Tube Events
//!
//! Batch direction inference from beam-break and RFID intervals.
//!
//! Per tube:
//! 1. Pair beam breaks and tag-in-range edges into intervals
//! 2. Join overlapping intervals into candidate events (overlap graph)
//! 3. Classify each event's direction with the h0..h5 cascade
//! 4. Optionally correct short trailing breaks and demote repeated
//!    same-direction passages
//!
//! Tubes are independent of each other and can be processed in parallel.
//! Resolved events can then be turned into occupancy records.

mod detector;
mod graph;
mod heuristics;
mod intervals;
mod occupancy;
mod postprocess;

// Re-exports
pub use detector::{
    find_tube_events, sort_events, split_by_tube, DetectionReport, TubeEventDetector,
};
pub use graph::{candidate_events, overlap_pairs, Class, Node, OverlapGraph};
pub use heuristics::{classify, resolve, Classifier, Shape, CASCADE};
pub use intervals::{beam_intervals, rfid_intervals, TubeIntervals};
pub use occupancy::occupancy_from_tube_events;
pub use postprocess::{correct_tails, remove_conflicts};
