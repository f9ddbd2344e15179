//! # Sequences
//!
//! Occupancy traced through each animal's whole read sequence, plus
//! multi-animal events and what they say about chasing and association.
//!
//! Per animal:
//! 1. Collapse repeated reads of one presence ([`merge_close_reads`])
//! 2. Pin the animal between consecutive reads on neighbouring tubes and
//!    trace cage chains out from every pin ([`from_tube_sequence`])
//! 3. Keep the chains that link neighbouring pins ([`merge_sequences`])
//! 4. Turn the merged chain into occupancy ([`merged_sequence_to_occupancy`])
//!
//! Unlike the streaming tracker this path sees every read before deciding,
//! so it needs no clock of its own: events must already carry world time.

mod chain;
mod multi_animal;
mod reads;

// Re-exports
pub use chain::{
    from_tube_sequence, merge_sequences, merged_sequence_to_occupancy, CageAssignment,
    MergedSequence, SequenceStart,
};
pub use multi_animal::{
    chase_matrix, find_multi_animal_events, AssociationCounts, MultiAnimalEvent,
};
pub use reads::{merge_close_reads, reads_by_animal, shortest_transit, ReadRun};

use std::collections::BTreeMap;

use metrics::{counter, histogram};
use tracing::{debug, info, instrument};

use contracts::{ColonyBlueprint, ColonyLayout, Event, OccupancyRecord, TagId};

/// Resolved read-sequence settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceSettings {
    /// Fixed read merge threshold (ms); `None` derives it from the data
    pub merge_threshold: Option<f64>,
    /// Used when the threshold cannot be derived
    pub fallback_threshold: f64,
    pub min_reads: usize,
    /// Max gap (ms) inside a multi-animal event
    pub event_gap: f64,
}

impl SequenceSettings {
    pub fn from_blueprint(blueprint: &ColonyBlueprint) -> Self {
        let sequence = &blueprint.sequence;
        Self {
            merge_threshold: sequence.merge_threshold_ms,
            fallback_threshold: blueprint.colony.rfid_merge_threshold_ms,
            min_reads: sequence.min_reads,
            event_gap: sequence
                .event_gap_ms
                .unwrap_or_else(|| blueprint.colony.multi_animal_threshold_ms()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SequenceReport {
    /// Sorted by `enter_time`
    pub occupancy: Vec<OccupancyRecord>,
    /// Per kept animal; `None` below two pins
    pub reliability: BTreeMap<TagId, Option<f64>>,
    /// Read merge threshold actually used (ms)
    pub merge_threshold: f64,
    /// Animals dropped for having too few reads
    pub skipped_animals: usize,
    pub multi_animal_events: Vec<MultiAnimalEvent>,
}

impl SequenceReport {
    pub fn chase_matrix(&self, animals: Option<Vec<TagId>>) -> contracts::ChaseMatrix {
        chase_matrix(&self.multi_animal_events, None, animals)
    }

    pub fn associations(&self) -> AssociationCounts {
        AssociationCounts::from_events(&self.multi_animal_events)
    }
}

/// Run the read-sequence path over world-stamped events
#[instrument(name = "analyze_sequences", skip_all, fields(events = events.len()))]
pub fn analyze(
    events: &[Event],
    layout: &ColonyLayout,
    settings: &SequenceSettings,
) -> SequenceReport {
    let mut reads = reads_by_animal(events);
    let before = reads.len();
    reads.retain(|_, r| r.len() >= settings.min_reads);
    let skipped_animals = before - reads.len();

    let merge_threshold = settings
        .merge_threshold
        .or_else(|| shortest_transit(reads.values().map(Vec::as_slice)))
        .unwrap_or(settings.fallback_threshold);
    debug!(merge_threshold, skipped_animals, "read merge threshold");

    let merged: BTreeMap<TagId, Vec<ReadRun>> = reads
        .into_iter()
        .map(|(animal, r)| {
            let runs = merge_close_reads(&r, merge_threshold);
            (animal, runs)
        })
        .collect();

    let mut report = SequenceReport {
        merge_threshold,
        skipped_animals,
        ..Default::default()
    };
    for (animal, runs) in &merged {
        let starts = from_tube_sequence(runs, layout);
        counter!("sequence_starts_total").increment(starts.len() as u64);
        let sequence = merge_sequences(&starts);
        if let Some(reliability) = sequence.reliability {
            histogram!("sequence_reliability").record(reliability);
        }
        debug!(%animal, runs = runs.len(), starts = starts.len(), reliability = ?sequence.reliability, "sequence merged");
        report
            .occupancy
            .extend(merged_sequence_to_occupancy(&sequence, runs, animal));
        report.reliability.insert(animal.clone(), sequence.reliability);
    }
    report
        .occupancy
        .sort_by(|a, b| a.enter_time.total_cmp(&b.enter_time));

    report.multi_animal_events = find_multi_animal_events(
        merged.iter().map(|(animal, runs)| (animal, runs.as_slice())),
        settings.event_gap,
    );
    counter!("multi_animal_events_total").increment(report.multi_animal_events.len() as u64);

    info!(
        animals = merged.len(),
        skipped = skipped_animals,
        occupancy = report.occupancy.len(),
        multi_animal_events = report.multi_animal_events.len(),
        merge_threshold,
        "Read sequences analyzed"
    );
    report
}
