//! Bursts of reads from several animals on one tube.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use contracts::{ChaseMatrix, ChaseRecord, TagId, TubeId};

use crate::reads::ReadRun;

/// Consecutive reads on one tube, each less than the event gap after the
/// previous one. Reads are in time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiAnimalEvent {
    pub tube: TubeId,
    pub times: Vec<f64>,
    pub animals: Vec<TagId>,
}

impl MultiAnimalEvent {
    pub fn start(&self) -> f64 {
        self.times.first().copied().unwrap_or_default()
    }

    pub fn end(&self) -> f64 {
        self.times.last().copied().unwrap_or_default()
    }

    /// The animal read last chased every animal read before it, most recent
    /// first. Reads of the chaser itself are skipped.
    pub fn chases(&self) -> Vec<ChaseRecord> {
        let Some((chaser, earlier)) = self.animals.split_last() else {
            return Vec::new();
        };
        earlier
            .iter()
            .rev()
            .filter(|chasee| *chasee != chaser)
            .map(|chasee| ChaseRecord {
                time: self.end(),
                tube: self.tube,
                chaser: chaser.clone(),
                chasee: chasee.clone(),
            })
            .collect()
    }
}

/// Group reads of all animals into multi-animal events.
///
/// Reads are split per tube and sorted by time. A run of reads whose
/// successive gaps are all below `gap` ms becomes one event when it holds
/// at least two reads. Output is sorted by start time, then tube.
pub fn find_multi_animal_events<'a>(
    reads: impl IntoIterator<Item = (&'a TagId, &'a [ReadRun])>,
    gap: f64,
) -> Vec<MultiAnimalEvent> {
    let mut per_tube: BTreeMap<TubeId, Vec<(f64, &TagId)>> = BTreeMap::new();
    for (animal, runs) in reads {
        for run in runs {
            per_tube.entry(run.tube).or_default().push((run.start, animal));
        }
    }

    let mut events = Vec::new();
    for (tube, mut tube_reads) in per_tube {
        tube_reads.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        let mut first = 0;
        for i in 1..=tube_reads.len() {
            let joined = i < tube_reads.len() && tube_reads[i].0 - tube_reads[i - 1].0 < gap;
            if joined {
                continue;
            }
            if i - first >= 2 {
                let burst = &tube_reads[first..i];
                events.push(MultiAnimalEvent {
                    tube,
                    times: burst.iter().map(|(t, _)| *t).collect(),
                    animals: burst.iter().map(|(_, a)| (*a).clone()).collect(),
                });
            }
            first = i;
        }
    }
    events.sort_by(|a, b| a.start().total_cmp(&b.start()).then(a.tube.cmp(&b.tube)));
    events
}

/// Chase counts over `events`, optionally limited to one tube.
///
/// Without an explicit animal order, rows and columns are every chaser and
/// chasee found, sorted.
pub fn chase_matrix(
    events: &[MultiAnimalEvent],
    tube: Option<TubeId>,
    animals: Option<Vec<TagId>>,
) -> ChaseMatrix {
    let records: Vec<ChaseRecord> = events
        .iter()
        .filter(|e| tube.map_or(true, |t| e.tube == t))
        .flat_map(MultiAnimalEvent::chases)
        .collect();
    let animals = animals.unwrap_or_else(|| {
        let found: BTreeSet<&TagId> = records
            .iter()
            .flat_map(|r| [&r.chaser, &r.chasee])
            .collect();
        found.into_iter().cloned().collect()
    });
    ChaseMatrix::from_records(animals, &records)
}

/// How often each ordered pair of distinct animals shared an event, the
/// first read before the second
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationCounts {
    counts: BTreeMap<(TagId, TagId), u32>,
}

impl AssociationCounts {
    pub fn from_events(events: &[MultiAnimalEvent]) -> Self {
        let mut counts = BTreeMap::new();
        for event in events {
            for (i, a) in event.animals.iter().enumerate() {
                for b in &event.animals[i + 1..] {
                    if a != b {
                        *counts.entry((a.clone(), b.clone())).or_insert(0) += 1;
                    }
                }
            }
        }
        Self { counts }
    }

    pub fn weight(&self, first: &str, second: &str) -> u32 {
        self.counts
            .get(&(TagId::from(first), TagId::from(second)))
            .copied()
            .unwrap_or(0)
    }

    /// `(first, second, count)` in tag order
    pub fn iter(&self) -> impl Iterator<Item = (&TagId, &TagId, u32)> {
        self.counts.iter().map(|((a, b), n)| (a, b, *n))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}
