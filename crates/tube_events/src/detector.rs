//! TubeEventDetector - batch direction inference per tube

use std::collections::BTreeMap;

use metrics::counter;
use tracing::{debug, info, instrument};

use contracts::{ColonyLayout, DetectorConfig, Event, OccupancyRecord, TubeEvent, TubeId};

use crate::graph::candidate_events;
use crate::heuristics::resolve;
use crate::intervals::TubeIntervals;
use crate::occupancy::occupancy_from_tube_events;
use crate::postprocess::{correct_tails, remove_conflicts};

/// Per-tube detection counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionReport {
    pub events: usize,
    pub resolved: usize,
    pub tails_corrected: usize,
    pub conflicts_demoted: usize,
}

impl DetectionReport {
    pub fn unknown(&self) -> usize {
        self.events - self.resolved
    }

    pub fn merge(&mut self, other: &DetectionReport) {
        self.events += other.events;
        self.resolved += other.resolved;
        self.tails_corrected += other.tails_corrected;
        self.conflicts_demoted += other.conflicts_demoted;
    }
}

/// Stateless batch detector. Tubes are independent, so callers may run
/// [`TubeEventDetector::detect_tube`] for several tubes in parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TubeEventDetector {
    config: DetectorConfig,
}

impl TubeEventDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect events on every tube. Output is sorted by `(start, tube)`.
    pub fn detect(&self, events: &[Event]) -> Vec<TubeEvent> {
        let mut out = Vec::new();
        for (tube, tube_events) in split_by_tube(events) {
            let (found, _) = self.detect_tube(tube, tube_events);
            out.extend(found);
        }
        sort_events(&mut out);
        out
    }

    /// Detect events on one tube. `events` must all come from `tube`.
    #[instrument(name = "detect_tube", skip(self, events))]
    pub fn detect_tube<'a>(
        &self,
        tube: TubeId,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> (Vec<TubeEvent>, DetectionReport) {
        let intervals = TubeIntervals::from_events(events, &self.config);
        if intervals.is_empty() {
            debug!("no intervals");
            return (Vec::new(), DetectionReport::default());
        }

        let mut found = candidate_events(tube, &intervals, self.config.margin);
        for event in found.iter_mut() {
            resolve(event, &self.config);
        }

        let mut report = DetectionReport {
            events: found.len(),
            ..Default::default()
        };
        if self.config.ignore_tails {
            report.tails_corrected = correct_tails(&mut found);
        }
        if self.config.remove_conflicts {
            report.conflicts_demoted = remove_conflicts(&mut found);
        }
        report.resolved = found.iter().filter(|e| e.direction.is_resolved()).count();

        for event in &found {
            let level = event.level.map(|l| l.as_str()).unwrap_or("none");
            counter!(
                "tube_events_total",
                "direction" => event.direction.as_str(),
                "level" => level
            )
            .increment(1);
        }
        counter!("tube_events_conflicts_demoted_total").increment(report.conflicts_demoted as u64);
        counter!("tube_events_tails_corrected_total").increment(report.tails_corrected as u64);

        info!(
            left = intervals.left.len(),
            right = intervals.right.len(),
            rfid = intervals.rfid.len(),
            events = report.events,
            unknown = report.unknown(),
            "tube processed"
        );
        (found, report)
    }

    /// Detect events and derive tube-event occupancy in one pass
    pub fn occupancy(&self, events: &[Event], layout: &ColonyLayout) -> Vec<OccupancyRecord> {
        occupancy_from_tube_events(&self.detect(events), layout)
    }
}

/// Group events by board, keeping each tube's original order
pub fn split_by_tube(events: &[Event]) -> BTreeMap<TubeId, Vec<&Event>> {
    let mut tubes: BTreeMap<TubeId, Vec<&Event>> = BTreeMap::new();
    for event in events {
        tubes.entry(event.board()).or_default().push(event);
    }
    tubes
}

/// Order by `(start, tube)`
pub fn sort_events(events: &mut [TubeEvent]) {
    events.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.tube.cmp(&b.tube)));
}

/// One-call form of [`TubeEventDetector::detect`] with default edge split and
/// read clustering
pub fn find_tube_events(
    events: &[Event],
    margin: f64,
    min_duration: f64,
    ignore_tails: bool,
    remove_conflicts: bool,
) -> Vec<TubeEvent> {
    TubeEventDetector::new(DetectorConfig {
        margin,
        min_duration,
        ignore_tails,
        remove_conflicts,
        ..DetectorConfig::default()
    })
    .detect(events)
}
