//! Two-source merge of one animal's occupancy streams.

use std::collections::BTreeMap;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use contracts::{CageId, ColonyLayout, OccupancyOrigin, OccupancyRecord, TagId};

use crate::error::{MergeError, Result};

/// How two overlapping claims on an animal's cage relate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CageAdjacency {
    /// Both sources name the same cage
    Same,
    /// Cages share a tube: the sources disagree on when the crossing happened
    Adjacent,
    /// No single crossing explains both claims
    Incompatible,
}

impl CageAdjacency {
    pub fn of(layout: &ColonyLayout, a: CageId, b: CageId) -> Self {
        if a == b {
            CageAdjacency::Same
        } else if layout.tube_between(a, b).is_some() {
            CageAdjacency::Adjacent
        } else {
            CageAdjacency::Incompatible
        }
    }
}

/// A window the two sources place the animal in incompatible cages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenConflict {
    pub animal: TagId,
    pub start: f64,
    pub end: f64,
    pub cage_a: CageId,
    pub cage_b: CageId,
}

/// Merged stream plus the windows left unresolved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOutcome {
    pub records: Vec<OccupancyRecord>,
    pub conflicts: Vec<OpenConflict>,
}

fn clipped(record: &OccupancyRecord, enter: f64, exit: f64) -> Option<OccupancyRecord> {
    (enter < exit).then(|| OccupancyRecord {
        enter_time: enter,
        exit_time: exit,
        ..record.clone()
    })
}

fn union(a: &OccupancyRecord, b: &OccupancyRecord) -> OccupancyRecord {
    OccupancyRecord {
        enter_time: a.enter_time.min(b.enter_time),
        exit_time: a.exit_time.max(b.exit_time),
        cage: a.cage,
        animal: a.animal.clone(),
        confidence: a.confidence.max(b.confidence),
        origin: OccupancyOrigin::Merged,
    }
}

fn single_animal<'a>(
    a: &'a [OccupancyRecord],
    b: &'a [OccupancyRecord],
) -> Result<Option<&'a TagId>> {
    let mut records = a.iter().chain(b.iter());
    let Some(first) = records.next() else {
        return Ok(None);
    };
    match records.find(|r| r.animal != first.animal) {
        Some(other) => Err(MergeError::MixedAnimals {
            expected: first.animal.clone(),
            found: other.animal.clone(),
        }),
        None => Ok(Some(&first.animal)),
    }
}

/// Merge two occupancy streams of one animal, typically the streaming and
/// the tube event paths.
///
/// Both streams are swept in `enter_time` order. Overlapping records are
/// reconciled by [`CageAdjacency`]:
/// - same cage: one `Merged` record over the union
/// - adjacent cages: the later-starting record starts when the earlier ends
/// - incompatible: the overlap is cut from both and reported
#[instrument(name = "merge_tube_event_occupancies", skip_all, fields(a = a.len(), b = b.len()))]
pub fn merge_tube_event_occupancies(
    a: &[OccupancyRecord],
    b: &[OccupancyRecord],
    layout: &ColonyLayout,
) -> Result<SweepOutcome> {
    let mut outcome = SweepOutcome::default();
    let Some(animal) = single_animal(a, b)? else {
        return Ok(outcome);
    };

    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    a_sorted.sort_by(|x, y| x.enter_time.total_cmp(&y.enter_time));
    b_sorted.sort_by(|x, y| x.enter_time.total_cmp(&y.enter_time));
    let mut a_iter = a_sorted.into_iter();
    let mut b_iter = b_sorted.into_iter();
    let mut cur_a = a_iter.next();
    let mut cur_b = b_iter.next();

    loop {
        match (cur_a.take(), cur_b.take()) {
            (None, None) => break,
            (Some(x), None) => {
                outcome.records.push(x);
                cur_a = a_iter.next();
            }
            (None, Some(y)) => {
                outcome.records.push(y);
                cur_b = b_iter.next();
            }
            (Some(x), Some(y)) if x.exit_time <= y.enter_time => {
                outcome.records.push(x);
                cur_a = a_iter.next();
                cur_b = Some(y);
            }
            (Some(x), Some(y)) if y.exit_time <= x.enter_time => {
                outcome.records.push(y);
                cur_b = b_iter.next();
                cur_a = Some(x);
            }
            (Some(x), Some(y)) => match CageAdjacency::of(layout, x.cage, y.cage) {
                CageAdjacency::Same => {
                    let merged = union(&x, &y);
                    if x.exit_time >= y.exit_time {
                        cur_a = Some(merged);
                        cur_b = b_iter.next();
                    } else {
                        cur_b = Some(merged);
                        cur_a = a_iter.next();
                    }
                }
                CageAdjacency::Adjacent => {
                    if x.enter_time <= y.enter_time {
                        cur_b = clipped(&y, x.exit_time, y.exit_time).or_else(|| b_iter.next());
                        cur_a = Some(x);
                    } else {
                        cur_a = clipped(&x, y.exit_time, x.exit_time).or_else(|| a_iter.next());
                        cur_b = Some(y);
                    }
                }
                CageAdjacency::Incompatible => {
                    let start = x.enter_time.max(y.enter_time);
                    let end = x.exit_time.min(y.exit_time);
                    warn!(%animal, start, end, cage_a = x.cage, cage_b = y.cage, "open conflict");
                    counter!("merge_open_conflicts_total").increment(1);
                    outcome.conflicts.push(OpenConflict {
                        animal: animal.clone(),
                        start,
                        end,
                        cage_a: x.cage,
                        cage_b: y.cage,
                    });
                    let earlier = if x.enter_time <= y.enter_time { &x } else { &y };
                    if let Some(head) = clipped(earlier, earlier.enter_time, start) {
                        outcome.records.push(head);
                    }
                    cur_a = clipped(&x, end, x.exit_time).or_else(|| a_iter.next());
                    cur_b = clipped(&y, end, y.exit_time).or_else(|| b_iter.next());
                }
            },
        }
    }

    outcome
        .records
        .sort_by(|x, y| x.enter_time.total_cmp(&y.enter_time));
    debug!(
        records = outcome.records.len(),
        conflicts = outcome.conflicts.len(),
        "streams merged"
    );
    Ok(outcome)
}

/// [`merge_tube_event_occupancies`] for every animal present in either
/// list. Records come back sorted by `enter_time`.
pub fn merge_tube_event_occupancies_by_animal(
    a: &[OccupancyRecord],
    b: &[OccupancyRecord],
    layout: &ColonyLayout,
) -> Result<SweepOutcome> {
    let mut per_animal: BTreeMap<&TagId, (Vec<OccupancyRecord>, Vec<OccupancyRecord>)> =
        BTreeMap::new();
    for r in a {
        per_animal.entry(&r.animal).or_default().0.push(r.clone());
    }
    for r in b {
        per_animal.entry(&r.animal).or_default().1.push(r.clone());
    }

    let mut outcome = SweepOutcome::default();
    for (ra, rb) in per_animal.values() {
        let merged = merge_tube_event_occupancies(ra, rb, layout)?;
        outcome.records.extend(merged.records);
        outcome.conflicts.extend(merged.conflicts);
    }
    outcome
        .records
        .sort_by(|x, y| x.enter_time.total_cmp(&y.enter_time));
    Ok(outcome)
}
