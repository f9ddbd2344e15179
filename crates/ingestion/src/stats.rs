//! Ingestion counters

use contracts::{Event, EventType};
use metrics::counter;

const N_EVENT_TYPES: usize = 5;

/// Per-segment ingestion counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    /// Events accepted
    pub events: u64,

    /// Lines dropped as malformed
    pub malformed: u64,

    /// Accepted events by type code
    pub by_type: [u64; N_EVENT_TYPES],
}

impl IngestionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted event
    pub fn record_event(&mut self, event: &Event) {
        let event_type = event.event_type();
        self.events += 1;
        self.by_type[event_type.code() as usize] += 1;
        counter!("colony_events_ingested_total", "type" => event_type.as_str()).increment(1);
    }

    /// Record a dropped line
    pub fn record_malformed(&mut self) {
        self.malformed += 1;
        counter!("colony_malformed_events_total").increment(1);
    }

    pub fn events_of(&self, event_type: EventType) -> u64 {
        self.by_type[event_type.code() as usize]
    }

    /// Lines seen (accepted + dropped)
    pub fn lines(&self) -> u64 {
        self.events + self.malformed
    }

    /// Fold another segment's counters into this one
    pub fn merge(&mut self, other: &IngestionStats) {
        self.events += other.events;
        self.malformed += other.malformed;
        for (a, b) in self.by_type.iter_mut().zip(other.by_type.iter()) {
            *a += b;
        }
    }
}
