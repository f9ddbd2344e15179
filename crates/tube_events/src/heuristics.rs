//! Direction cascade.
//!
//! Each classifier looks at the shape of a candidate event and either
//! decides a direction or passes. The first decision wins. Only h1 / h3
//! break exact edge ties; every other level escalates on a tie.

use std::cmp::Ordering;

use contracts::{DetectorConfig, Direction, HeuristicLevel, Interval, TubeEvent};

/// What a classifier sees
#[derive(Debug, Clone, Copy)]
pub struct Shape<'a> {
    pub n_animals: usize,
    pub left: &'a [Interval],
    pub right: &'a [Interval],
    pub duration: f64,
    pub edge_split: f64,
}

impl<'a> Shape<'a> {
    pub fn of(event: &'a TubeEvent, config: &DetectorConfig) -> Self {
        Self {
            n_animals: event.animals.len(),
            left: &event.left,
            right: &event.right,
            duration: event.duration(),
            edge_split: config.edge_split_duration,
        }
    }

    fn one_each(&self) -> bool {
        self.left.len() == 1 && self.right.len() == 1
    }
}

/// A pure classifier: `Some(Left | Right)` decides, `None` escalates
pub type Classifier = fn(&Shape) -> Option<Direction>;

/// The cascade, in order
pub const CASCADE: [(HeuristicLevel, Classifier); 6] = [
    (HeuristicLevel::H0, h0),
    (HeuristicLevel::H1, h1),
    (HeuristicLevel::H2, h2),
    (HeuristicLevel::H3, h3),
    (HeuristicLevel::H4, h4),
    (HeuristicLevel::H5, h5),
];

/// Run the cascade over one shape
pub fn classify(shape: &Shape) -> Option<(Direction, HeuristicLevel)> {
    CASCADE
        .iter()
        .find_map(|(level, classifier)| classifier(shape).map(|d| (d, *level)))
}

/// Run the cascade and write the verdict into the event
pub fn resolve(event: &mut TubeEvent, config: &DetectorConfig) {
    let verdict = classify(&Shape::of(event, config));
    match verdict {
        Some((direction, level)) => event.resolve(direction, level),
        None => event.demote(),
    }
}

/// Left beam first on both edges means travel to the right
fn edge_order(left: &Interval, right: &Interval) -> Option<Direction> {
    if left.start < right.start && left.end < right.end {
        Some(Direction::Right)
    } else if left.start > right.start && left.end > right.end {
        Some(Direction::Left)
    } else {
        None
    }
}

/// Single edge comparison
pub(crate) fn edge(left: f64, right: f64) -> Option<Direction> {
    match left.partial_cmp(&right)? {
        Ordering::Less => Some(Direction::Right),
        Ordering::Greater => Some(Direction::Left),
        Ordering::Equal => None,
    }
}

/// Short events compare rising edges, long ones falling edges. A tie falls
/// back to the other edge pair, then to `Left`.
fn split_edge(shape: &Shape, left: &Interval, right: &Interval) -> Direction {
    let rises = edge(left.start, right.start);
    let falls = edge(left.end, right.end);
    let decided = if shape.duration < shape.edge_split {
        rises.or(falls)
    } else {
        falls.or(rises)
    };
    decided.unwrap_or(Direction::Left)
}

/// `[first start, last end]` of a side
fn envelope(side: &[Interval]) -> Option<Interval> {
    let start = side.iter().map(|i| i.start).min_by(f64::total_cmp)?;
    let end = side.iter().map(|i| i.end).max_by(f64::total_cmp)?;
    Some(Interval::new(start, end))
}

fn whole_group(shape: &Shape) -> Option<Direction> {
    edge_order(&envelope(shape.left)?, &envelope(shape.right)?)
}

fn longest(side: &[Interval]) -> Option<&Interval> {
    side.iter()
        .max_by(|a, b| a.duration().total_cmp(&b.duration()))
}

/// One animal, one interval per side, clean edge order
pub fn h0(shape: &Shape) -> Option<Direction> {
    if shape.n_animals != 1 || !shape.one_each() {
        return None;
    }
    edge_order(&shape.left[0], &shape.right[0])
}

/// One animal, one interval per side, edges interleaved
pub fn h1(shape: &Shape) -> Option<Direction> {
    if shape.n_animals != 1 || !shape.one_each() {
        return None;
    }
    Some(split_edge(shape, &shape.left[0], &shape.right[0]))
}

/// Several animals, one interval per side, clean edge order
pub fn h2(shape: &Shape) -> Option<Direction> {
    if shape.n_animals < 2 || !shape.one_each() {
        return None;
    }
    edge_order(&shape.left[0], &shape.right[0])
}

/// Several animals, one interval per side, edges interleaved
pub fn h3(shape: &Shape) -> Option<Direction> {
    if shape.n_animals < 2 || !shape.one_each() {
        return None;
    }
    Some(split_edge(shape, &shape.left[0], &shape.right[0]))
}

/// One animal, several intervals on at least one side
pub fn h4(shape: &Shape) -> Option<Direction> {
    if shape.n_animals != 1
        || shape.left.is_empty()
        || shape.right.is_empty()
        || shape.one_each()
    {
        return None;
    }
    whole_group(shape)
        .or_else(|| single_side_body(shape))
        .or_else(|| longest_body(shape))
}

/// The side with one interval is the body; pair it with the other side's
/// interval of closest duration
fn single_side_body(shape: &Shape) -> Option<Direction> {
    if shape.left.len() == 1 {
        let body = shape.left[0];
        edge_order(&body, closest_duration(&body, shape.right)?)
    } else if shape.right.len() == 1 {
        let body = shape.right[0];
        edge_order(closest_duration(&body, shape.left)?, &body)
    } else {
        None
    }
}

fn closest_duration<'a>(body: &Interval, others: &'a [Interval]) -> Option<&'a Interval> {
    let gap = |i: &Interval| (i.duration() - body.duration()).abs();
    others.iter().min_by(|a, b| gap(a).total_cmp(&gap(b)))
}

/// Longest interval of the event is the body. Per side, trailing intervals
/// shorter than half the body are dropped; the last survivors' falling
/// edges decide.
fn longest_body(shape: &Shape) -> Option<Direction> {
    let body = [longest(shape.left)?, longest(shape.right)?]
        .into_iter()
        .max_by(|a, b| a.duration().total_cmp(&b.duration()))?;
    let half = body.duration() / 2.0;
    let last_kept = |side: &[Interval]| -> Option<Interval> {
        let mut kept = side.len();
        while kept > 0 && side[kept - 1].duration() < half {
            kept -= 1;
        }
        side.get(kept.checked_sub(1)?).copied()
    };
    edge(last_kept(shape.left)?.end, last_kept(shape.right)?.end)
}

/// Several animals, several intervals on both sides: whole-group test only
pub fn h5(shape: &Shape) -> Option<Direction> {
    if shape.n_animals < 2 || shape.left.len() < 2 || shape.right.len() < 2 {
        return None;
    }
    whole_group(shape)
}
