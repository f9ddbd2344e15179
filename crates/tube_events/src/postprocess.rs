//! Passes run over a tube's events after the cascade.

use std::collections::HashMap;

use contracts::{Direction, HeuristicLevel, Interval, TagId, TubeEvent};

use crate::heuristics::edge;

/// Resolve single-animal events whose extra beam intervals are all short
/// trailing flickers after one dominant (primary) interval per side.
///
/// Returns how many events were resolved.
pub fn correct_tails(events: &mut [TubeEvent]) -> usize {
    let mut resolved = 0;
    for event in events
        .iter_mut()
        .filter(|e| !e.direction.is_resolved() && e.is_single_animal())
    {
        let (Some(left), Some(right)) = (primary(&event.left), primary(&event.right)) else {
            continue;
        };
        if let Some(direction) = edge(left.start, right.start) {
            event.resolve(direction, HeuristicLevel::TailCorrection);
            resolved += 1;
        }
    }
    resolved
}

/// The longest interval of a side, provided everything after it is shorter
/// than half of it
fn primary(side: &[Interval]) -> Option<Interval> {
    let (index, body) = side
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.duration().total_cmp(&b.duration()))?;
    let half = body.duration() / 2.0;
    side[index + 1..]
        .iter()
        .all(|tail| tail.duration() < half)
        .then_some(*body)
}

/// Demote repeated same-direction passages of one animal through one tube.
///
/// `events` must belong to a single tube and be in start order. An animal
/// cannot cross the same way twice without crossing back, so the later of
/// two consecutive equal directions is wrong. Unknown and demoted events
/// clear the memory of every animal they carry.
///
/// Returns how many events were demoted.
pub fn remove_conflicts(events: &mut [TubeEvent]) -> usize {
    let mut last: HashMap<TagId, Direction> = HashMap::new();
    let mut demoted = 0;
    for event in events.iter_mut() {
        if event.direction.is_resolved()
            && event
                .animals
                .iter()
                .any(|a| last.get(a) == Some(&event.direction))
        {
            event.demote();
            demoted += 1;
        }
        if event.direction.is_resolved() {
            for animal in &event.animals {
                last.insert(animal.clone(), event.direction);
            }
        } else {
            for animal in &event.animals {
                last.remove(animal);
            }
        }
    }
    demoted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(start: f64, animals: &[&str], direction: Direction) -> TubeEvent {
        let mut e = TubeEvent {
            tube: 0,
            start,
            end: start + 100.0,
            animals: animals.iter().map(|a| TagId::from(*a)).collect(),
            left: vec![],
            right: vec![],
            rfid: vec![],
            direction: Direction::Unknown,
            level: None,
        };
        e.animals.sort();
        e.resolve(direction, HeuristicLevel::H0);
        e
    }

    #[test]
    fn test_second_right_demoted() {
        let mut events = vec![
            event(0.0, &["A"], Direction::Right),
            event(1000.0, &["A"], Direction::Right),
            event(2000.0, &["A"], Direction::Left),
        ];
        assert_eq!(remove_conflicts(&mut events), 1);
        assert_eq!(events[1].direction, Direction::Unknown);
        assert_eq!(events[1].level, None);
        assert_eq!(events[2].direction, Direction::Left);
    }

    #[test]
    fn test_unknown_resets_memory() {
        let mut events = vec![
            event(0.0, &["A"], Direction::Right),
            event(500.0, &["A"], Direction::Unknown),
            event(1000.0, &["A"], Direction::Right),
        ];
        assert_eq!(remove_conflicts(&mut events), 0);
        assert_eq!(events[2].direction, Direction::Right);
    }

    #[test]
    fn test_conflicts_are_per_animal() {
        let mut events = vec![
            event(0.0, &["A"], Direction::Right),
            event(500.0, &["B"], Direction::Right),
            event(1000.0, &["A", "B"], Direction::Left),
            event(1500.0, &["B"], Direction::Left),
        ];
        assert_eq!(remove_conflicts(&mut events), 1);
        assert_eq!(events[2].direction, Direction::Left);
        assert_eq!(events[3].direction, Direction::Unknown);
    }

    #[test]
    fn test_tail_correction() {
        let mut e = event(0.0, &["A"], Direction::Unknown);
        e.left = vec![Interval::new(0.0, 400.0), Interval::new(500.0, 550.0)];
        e.right = vec![Interval::new(100.0, 500.0), Interval::new(600.0, 620.0)];
        let mut events = vec![e];
        assert_eq!(correct_tails(&mut events), 1);
        assert_eq!(events[0].direction, Direction::Right);
        assert_eq!(events[0].level, Some(HeuristicLevel::TailCorrection));
    }

    #[test]
    fn test_long_tail_blocks_correction() {
        let mut e = event(0.0, &["A"], Direction::Unknown);
        e.left = vec![Interval::new(0.0, 400.0), Interval::new(500.0, 800.0)];
        e.right = vec![Interval::new(100.0, 500.0)];
        let mut events = vec![e];
        assert_eq!(correct_tails(&mut events), 0);
        assert_eq!(events[0].direction, Direction::Unknown);
    }
}
