//! Run statistics.

use std::time::Duration;

use colony::ColonySummary;
use ingestion::IngestionStats;
use observability::OccupancyAggregator;
use serde::Serialize;

/// Statistics from one command run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Segments read
    pub segments: usize,

    /// Line counts across all segments
    pub ingestion: IngestionStats,

    /// Whether the board clock was fitted to wall time
    pub clock_synced: bool,

    /// Wall time of the run
    pub duration: Duration,

    /// Streaming tracker summary, when the tracker ran
    pub colony: Option<ColonySummary>,

    /// Tube passages left without a direction
    pub unknown_tube_events: usize,

    /// Windows the two occupancy sources could not reconcile
    pub open_conflicts: usize,

    /// Output aggregates
    pub outputs: OccupancyAggregator,
}

/// JSON form of [`RunStats`]
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub segments: usize,
    pub events: u64,
    pub malformed: u64,
    pub clock_synced: bool,
    pub duration_secs: f64,
    pub events_per_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colony: Option<&'a ColonySummary>,
    pub occupancy_records: u64,
    pub chases: u64,
    pub tube_events: u64,
    pub unknown_tube_events: usize,
    pub open_conflicts: usize,
}

impl RunStats {
    /// Events ingested per second of run time
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ingestion.events as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn report(&self) -> RunReport<'_> {
        RunReport {
            segments: self.segments,
            events: self.ingestion.events,
            malformed: self.ingestion.malformed,
            clock_synced: self.clock_synced,
            duration_secs: self.duration.as_secs_f64(),
            events_per_sec: self.events_per_sec(),
            colony: self.colony.as_ref(),
            occupancy_records: self.outputs.total_records,
            chases: self.outputs.total_chases,
            tube_events: self.outputs.total_tube_events,
            unknown_tube_events: self.unknown_tube_events,
            open_conflicts: self.open_conflicts,
        }
    }

    /// Human readable summary (stderr, stdout may carry CSV)
    pub fn print_summary(&self) {
        eprintln!("\n=== Run Statistics ===");
        eprintln!("Segments: {}", self.segments);
        eprintln!(
            "Events: {} ({} malformed lines dropped)",
            self.ingestion.events, self.ingestion.malformed
        );
        eprintln!("Clock synced: {}", self.clock_synced);
        eprintln!(
            "Duration: {:.2}s ({:.0} events/s)",
            self.duration.as_secs_f64(),
            self.events_per_sec()
        );
        if let Some(ref colony) = self.colony {
            eprintln!(
                "Tracker: {} animals, {} teleports, merge threshold {:.0} ms, {} rollovers",
                colony.n_animals, colony.teleports, colony.merge_threshold_ms, colony.rollovers
            );
        }
        if self.open_conflicts > 0 {
            eprintln!("Open conflicts: {}", self.open_conflicts);
        }
        eprint!("{}", self.outputs.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_per_sec() {
        let mut stats = RunStats::default();
        assert_eq!(stats.events_per_sec(), 0.0);
        stats.ingestion.events = 500;
        stats.duration = Duration::from_millis(250);
        assert!((stats.events_per_sec() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_serializes() {
        let stats = RunStats {
            segments: 2,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats.report()).unwrap();
        assert!(json.contains("\"segments\":2"));
        assert!(!json.contains("colony"));
    }
}
