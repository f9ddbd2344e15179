//! Run metrics for the colony tracker
//!
//! Recorders push output-level metrics through the `metrics` facade; the
//! aggregator keeps the same numbers in memory for the end-of-run summary.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{CageId, ChaseRecord, OccupancyRecord, TubeEvent};
use metrics::{counter, gauge, histogram};

/// Record metrics for an occupancy timeline
pub fn record_occupancy_metrics(records: &[OccupancyRecord]) {
    gauge!("colony_output_occupancy_records").set(records.len() as f64);

    for record in records {
        counter!("colony_output_occupancy_total", "origin" => record.origin.as_str())
            .increment(1);
        histogram!(
            "colony_stay_duration_ms",
            "cage" => record.cage.to_string()
        )
        .record(record.duration());
        histogram!("colony_occupancy_confidence").record(record.confidence.abs());
    }
}

/// Record metrics for chase records
pub fn record_chase_metrics(chases: &[ChaseRecord]) {
    gauge!("colony_output_chases").set(chases.len() as f64);

    for chase in chases {
        counter!("colony_output_chases_total", "tube" => chase.tube.to_string()).increment(1);
    }
}

/// Record metrics for detected tube events
pub fn record_tube_event_metrics(events: &[TubeEvent]) {
    let unknown = events.iter().filter(|e| !e.direction.is_resolved()).count();
    gauge!("tube_events_detected").set(events.len() as f64);
    gauge!("tube_events_unknown").set(unknown as f64);

    for event in events {
        histogram!("tube_event_duration_ms", "tube" => event.tube.to_string())
            .record(event.duration());
        histogram!("tube_event_animals").record(event.animals.len() as f64);
    }
}

/// In-memory run aggregates
#[derive(Debug, Clone, Default)]
pub struct OccupancyAggregator {
    /// Occupancy records seen
    pub total_records: u64,

    /// Records per origin
    pub by_origin: BTreeMap<String, u64>,

    /// Stay durations (ms), all cages
    pub stay_stats: RunningStats,

    /// Stay durations (ms) per cage
    pub cage_stats: BTreeMap<CageId, RunningStats>,

    /// Chase records seen
    pub total_chases: u64,

    /// Tube events seen
    pub total_tube_events: u64,

    /// Tube events left without a direction
    pub unknown_tube_events: u64,

    /// Tube events per resolving level
    pub by_level: BTreeMap<String, u64>,
}

impl OccupancyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_occupancy(&mut self, records: &[OccupancyRecord]) {
        for record in records {
            self.total_records += 1;
            *self
                .by_origin
                .entry(record.origin.as_str().to_string())
                .or_insert(0) += 1;
            self.stay_stats.push(record.duration());
            self.cage_stats
                .entry(record.cage)
                .or_default()
                .push(record.duration());
        }
    }

    pub fn update_chases(&mut self, chases: &[ChaseRecord]) {
        self.total_chases += chases.len() as u64;
    }

    pub fn update_tube_events(&mut self, events: &[TubeEvent]) {
        for event in events {
            self.total_tube_events += 1;
            match event.level {
                Some(level) => *self.by_level.entry(level.to_string()).or_insert(0) += 1,
                None => self.unknown_tube_events += 1,
            }
        }
    }

    pub fn summary(&self) -> OccupancySummary {
        OccupancySummary {
            total_records: self.total_records,
            by_origin: self.by_origin.clone(),
            stay_ms: StatsSummary::from(&self.stay_stats),
            cage_stay_ms: self
                .cage_stats
                .iter()
                .map(|(cage, stats)| (*cage, StatsSummary::from(stats)))
                .collect(),
            total_chases: self.total_chases,
            total_tube_events: self.total_tube_events,
            unknown_rate: if self.total_tube_events > 0 {
                self.unknown_tube_events as f64 / self.total_tube_events as f64 * 100.0
            } else {
                0.0
            },
            by_level: self.by_level.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct OccupancySummary {
    pub total_records: u64,
    pub by_origin: BTreeMap<String, u64>,
    pub stay_ms: StatsSummary,
    pub cage_stay_ms: BTreeMap<CageId, StatsSummary>,
    pub total_chases: u64,
    pub total_tube_events: u64,
    pub unknown_rate: f64,
    pub by_level: BTreeMap<String, u64>,
}

impl fmt::Display for OccupancySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Colony Summary ===")?;
        writeln!(f, "Occupancy records: {}", self.total_records)?;
        for (origin, count) in &self.by_origin {
            writeln!(f, "  {}: {}", origin, count)?;
        }
        writeln!(f, "Stay duration (ms): {}", self.stay_ms)?;
        for (cage, stats) in &self.cage_stay_ms {
            writeln!(f, "  cage {}: {}", cage, stats)?;
        }
        writeln!(f, "Chases: {}", self.total_chases)?;
        if self.total_tube_events > 0 {
            writeln!(
                f,
                "Tube events: {} ({:.2}% unknown)",
                self.total_tube_events, self.unknown_rate
            )?;
            for (level, count) in &self.by_level {
                writeln!(f, "  {}: {}", level, count)?;
            }
        }
        Ok(())
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean / variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
