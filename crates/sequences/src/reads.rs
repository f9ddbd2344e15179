//! Valid tag reads grouped per animal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use contracts::{Event, TagId, TubeId};

/// One or more reads of an animal on one tube, `[start, end]` in world ms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadRun {
    pub tube: TubeId,
    pub start: f64,
    pub end: f64,
}

impl ReadRun {
    pub fn single(tube: TubeId, time: f64) -> Self {
        Self {
            tube,
            start: time,
            end: time,
        }
    }
}

/// Valid reads of every animal, each list sorted by time
pub fn reads_by_animal(events: &[Event]) -> BTreeMap<TagId, Vec<ReadRun>> {
    let mut out: BTreeMap<TagId, Vec<ReadRun>> = BTreeMap::new();
    for event in events {
        if let Some(tag) = event.valid_tag() {
            out.entry(tag.clone())
                .or_default()
                .push(ReadRun::single(event.board(), event.world_time()));
        }
    }
    for reads in out.values_mut() {
        reads.sort_by(|a, b| a.start.total_cmp(&b.start));
    }
    out
}

/// Shortest gap between consecutive reads of one animal on two different
/// tubes, over all animals. `None` when no animal ever changed tubes.
pub fn shortest_transit<'a>(reads: impl IntoIterator<Item = &'a [ReadRun]>) -> Option<f64> {
    reads
        .into_iter()
        .flat_map(|r| r.windows(2))
        .filter(|pair| pair[0].tube != pair[1].tube)
        .map(|pair| pair[1].start - pair[0].end)
        .min_by(f64::total_cmp)
}

/// Collapse repeated reads of one presence.
///
/// Consecutive reads on the same tube less than `threshold` ms apart join
/// one run. A read on another tube always starts a new run.
pub fn merge_close_reads(reads: &[ReadRun], threshold: f64) -> Vec<ReadRun> {
    let mut out: Vec<ReadRun> = Vec::with_capacity(reads.len());
    for read in reads {
        match out.last_mut() {
            Some(run) if run.tube == read.tube && read.start - run.end < threshold => {
                run.end = run.end.max(read.end);
            }
            _ => out.push(*read),
        }
    }
    out
}
