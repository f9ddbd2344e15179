//! Occupancy derived from resolved tube events.

use std::collections::BTreeMap;

use contracts::{
    CageId, ColonyLayout, Direction, OccupancyOrigin, OccupancyRecord, TagId, TubeEvent, TubeId,
};

/// Cage an animal is in after passing `tube` in `direction`
fn destination(layout: &ColonyLayout, tube: TubeId, direction: Direction) -> Option<CageId> {
    match direction {
        Direction::Right => Some(layout.right_cage(tube)),
        Direction::Left => Some(layout.left_cage(tube)),
        Direction::Unknown => None,
    }
}

/// Cage an animal came from when passing `tube` in `direction`
fn source(layout: &ColonyLayout, tube: TubeId, direction: Direction) -> Option<CageId> {
    destination(layout, tube, direction.opposite())
}

/// Cage stays between consecutive resolved passages of each animal.
///
/// An animal that leaves a tube into cage `c` and next passes a tube out of
/// `c` stayed in `c` between the two. Pairs that disagree on the cage, or
/// with an unresolved side, yield nothing. Confidence is the weaker of the
/// two passages. Output is sorted by `enter_time`.
pub fn occupancy_from_tube_events(
    events: &[TubeEvent],
    layout: &ColonyLayout,
) -> Vec<OccupancyRecord> {
    let mut per_animal: BTreeMap<&TagId, Vec<&TubeEvent>> = BTreeMap::new();
    for event in events {
        for animal in &event.animals {
            per_animal.entry(animal).or_default().push(event);
        }
    }

    let mut out = Vec::new();
    for (animal, mut passages) in per_animal {
        passages.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.tube.cmp(&b.tube)));
        for pair in passages.windows(2) {
            let (entry, exit) = (pair[0], pair[1]);
            let (Some(entry_level), Some(exit_level)) = (entry.level, exit.level) else {
                continue;
            };
            let Some(cage) = destination(layout, entry.tube, entry.direction) else {
                continue;
            };
            if source(layout, exit.tube, exit.direction) != Some(cage) || exit.start <= entry.end {
                continue;
            }
            out.push(OccupancyRecord {
                enter_time: entry.end,
                exit_time: exit.start,
                cage,
                animal: animal.clone(),
                confidence: entry_level.confidence().min(exit_level.confidence()),
                origin: OccupancyOrigin::TubeEvent,
            });
        }
    }
    out.sort_by(|a, b| a.enter_time.total_cmp(&b.enter_time));
    out
}
