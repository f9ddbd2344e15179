//! Concatenate occupancy lists and cull duplicate stays.

use metrics::counter;
use tracing::{debug, instrument};

use contracts::OccupancyRecord;

use crate::error::{MergeError, Result};

/// Concatenate occupancy lists into one timeline sorted by `enter_time`.
///
/// With `cull`, overlapping records of one animal must describe the same
/// stay (identical enter and exit); the most confident of them is kept and
/// the rest dropped, the earliest listed winning ties. Overlapping records
/// that disagree on their bounds are a structural error.
#[instrument(name = "merge_occupancies", skip(lists))]
pub fn merge_occupancies<I>(lists: I, cull: bool) -> Result<Vec<OccupancyRecord>>
where
    I: IntoIterator<Item = Vec<OccupancyRecord>>,
{
    let mut records: Vec<OccupancyRecord> = lists.into_iter().flatten().collect();
    records.sort_by(|a, b| a.enter_time.total_cmp(&b.enter_time));
    if !cull {
        return Ok(records);
    }

    let n = records.len();
    let mut keep = vec![true; n];
    let mut grouped = vec![false; n];
    for i in 0..n {
        if grouped[i] {
            continue;
        }
        let seed = &records[i];
        let members: Vec<usize> = std::iter::once(i)
            .chain(
                (i + 1..n)
                    .take_while(|&j| records[j].enter_time < seed.exit_time)
                    .filter(|&j| !grouped[j] && records[j].animal == seed.animal),
            )
            .collect();
        if members.len() < 2 {
            continue;
        }
        let agree = members.iter().all(|&j| {
            records[j].enter_time == seed.enter_time && records[j].exit_time == seed.exit_time
        });
        if !agree {
            counter!("merge_inconsistencies_total").increment(1);
            return Err(MergeError::inconsistency(
                members.iter().map(|&j| records[j].clone()).collect(),
            ));
        }
        let best = members
            .iter()
            .copied()
            .reduce(|best, j| {
                if records[j].confidence.abs() > records[best].confidence.abs() {
                    j
                } else {
                    best
                }
            })
            .unwrap_or(i);
        for &j in &members {
            grouped[j] = true;
            keep[j] = j == best;
        }
        debug!(
            animal = %seed.animal,
            enter = seed.enter_time,
            culled = members.len() - 1,
            "duplicate stay culled"
        );
    }

    let before = records.len();
    let merged: Vec<OccupancyRecord> = records
        .into_iter()
        .zip(keep)
        .filter_map(|(r, k)| k.then_some(r))
        .collect();
    counter!("merge_culled_total").increment((before - merged.len()) as u64);
    Ok(merged)
}
