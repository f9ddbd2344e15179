//! Cage chains traced through one animal's read sequence.
//!
//! Two consecutive reads on neighbouring tubes pin the animal to the cage
//! between them. From every such pin the chain is walked forward and
//! backward: each read on a tube touching the current cage moves the animal
//! to that tube's other cage. Chains that reach the neighbouring pin agree
//! with it and are kept.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use contracts::{CageId, ColonyLayout, OccupancyOrigin, OccupancyRecord, TagId};

use crate::reads::ReadRun;

/// Cage the animal sat in after read `index`, with the chains traced from
/// there. Entries are `(read index, cage after that read)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceStart {
    pub index: usize,
    pub cage: CageId,
    /// Last read on the tube the animal left
    pub start: f64,
    /// First read on the tube it entered next
    pub end: f64,
    pub forward: Vec<(usize, CageId)>,
    pub backward: Vec<(usize, CageId)>,
}

/// Cage after one read, once every kept chain is merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CageAssignment {
    Definite(CageId),
    /// Kept chains disagree
    Ambiguous(Vec<CageId>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedSequence {
    pub cages: BTreeMap<usize, CageAssignment>,
    /// Share of starts whose forward chain reached the next start.
    /// `None` below two starts.
    pub reliability: Option<f64>,
}

/// Find every pin in `runs` and trace its chains.
///
/// The forward walk stops at the first read that cannot be explained from
/// the current cage, or at a later pin naming a different cage. It never
/// assigns a cage after the last read. The backward walk stops only at an
/// unexplained read.
pub fn from_tube_sequence(runs: &[ReadRun], layout: &ColonyLayout) -> Vec<SequenceStart> {
    let mut starts: Vec<SequenceStart> = runs
        .windows(2)
        .enumerate()
        .filter_map(|(index, pair)| {
            let cage = layout.shared_cage(pair[0].tube, pair[1].tube)?;
            Some(SequenceStart {
                index,
                cage,
                start: pair[0].end,
                end: pair[1].start,
                forward: Vec::new(),
                backward: Vec::new(),
            })
        })
        .collect();
    let pinned: BTreeMap<usize, CageId> = starts.iter().map(|s| (s.index, s.cage)).collect();

    let last = runs.len().saturating_sub(1);
    for start in &mut starts {
        let mut cage = start.cage;
        for i in start.index + 1..last {
            let Some(next) = layout.opposite_cage(runs[i].tube, cage) else {
                break;
            };
            cage = next;
            if pinned.get(&i).is_some_and(|&c| c != cage) {
                break;
            }
            start.forward.push((i, cage));
        }

        let mut cage = start.cage;
        for i in (1..=start.index).rev() {
            let Some(previous) = layout.opposite_cage(runs[i].tube, cage) else {
                break;
            };
            cage = previous;
            start.backward.push((i - 1, cage));
        }
    }
    starts
}

/// Merge the chains that link neighbouring starts into one cage per read.
///
/// A forward chain is kept when it contains the next start, a backward
/// chain when it contains the previous one. Starts always keep their own
/// cage.
pub fn merge_sequences(starts: &[SequenceStart]) -> MergedSequence {
    let mut seen: BTreeMap<usize, BTreeSet<CageId>> = BTreeMap::new();
    let mut keep = |chain: &[(usize, CageId)]| {
        for &(index, cage) in chain {
            seen.entry(index).or_default().insert(cage);
        }
    };

    let mut hits = 0usize;
    for (k, start) in starts.iter().enumerate() {
        if let Some(next) = starts.get(k + 1) {
            if start.forward.contains(&(next.index, next.cage)) {
                hits += 1;
                keep(&start.forward);
            }
        }
        if let Some(previous) = k.checked_sub(1).map(|p| &starts[p]) {
            if start.backward.contains(&(previous.index, previous.cage)) {
                keep(&start.backward);
            }
        }
    }

    let mut cages: BTreeMap<usize, CageAssignment> = seen
        .into_iter()
        .map(|(index, set)| {
            let cages: Vec<CageId> = set.into_iter().collect();
            let assignment = if cages.len() == 1 {
                CageAssignment::Definite(cages[0])
            } else {
                CageAssignment::Ambiguous(cages)
            };
            (index, assignment)
        })
        .collect();
    for start in starts {
        cages.insert(start.index, CageAssignment::Definite(start.cage));
    }

    let reliability = (starts.len() > 1).then(|| hits as f64 / (starts.len() - 1) as f64);
    MergedSequence { cages, reliability }
}

/// Occupancy between consecutive assigned reads.
///
/// A definite cage after read `i` yields a stay from the end of run `i` to
/// the start of the next assigned run, or of run `i + 1` for the last
/// assigned read. Ambiguous reads and empty stays yield nothing.
/// Confidence is the sequence reliability, 1.0 for a lone pin.
pub fn merged_sequence_to_occupancy(
    merged: &MergedSequence,
    runs: &[ReadRun],
    animal: &TagId,
) -> Vec<OccupancyRecord> {
    let confidence = merged.reliability.unwrap_or(1.0);
    let indices: Vec<usize> = merged.cages.keys().copied().collect();
    indices
        .iter()
        .enumerate()
        .filter_map(|(k, &index)| {
            let CageAssignment::Definite(cage) = merged.cages.get(&index)? else {
                return None;
            };
            let next = indices.get(k + 1).copied().unwrap_or(index + 1);
            let enter_time = runs.get(index)?.end;
            let exit_time = runs.get(next)?.start;
            (exit_time > enter_time).then(|| OccupancyRecord {
                enter_time,
                exit_time,
                cage: *cage,
                animal: animal.clone(),
                confidence,
                origin: OccupancyOrigin::ReadSequence,
            })
        })
        .collect()
}
