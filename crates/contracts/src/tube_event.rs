//! Tube events - reconstructed passages through one tube

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{TagId, TubeId};

/// Closed time interval (world ms)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Overlap after widening both intervals by `margin` on each side
    #[inline]
    pub fn overlaps(&self, other: &Interval, margin: f64) -> bool {
        self.start - margin <= other.end + margin && other.start - margin <= self.end + margin
    }
}

/// Presence of one tag in a tube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfidInterval {
    pub interval: Interval,
    pub tag: TagId,
}

/// Direction of travel through a tube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    #[default]
    Unknown,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Unknown => "unknown",
        }
    }

    #[inline]
    pub fn is_resolved(self) -> bool {
        self != Direction::Unknown
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::Unknown => Direction::Unknown,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic that resolved a tube event's direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicLevel {
    H0,
    H1,
    H2,
    H3,
    H4,
    H5,
    TailCorrection,
}

impl HeuristicLevel {
    /// Confidence carried into occupancy derived from this level
    pub fn confidence(self) -> f64 {
        match self {
            HeuristicLevel::H0 => 1.0,
            HeuristicLevel::H2 => 0.9,
            HeuristicLevel::H1 => 0.75,
            HeuristicLevel::H4 => 0.7,
            HeuristicLevel::H3 => 0.6,
            HeuristicLevel::H5 | HeuristicLevel::TailCorrection => 0.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HeuristicLevel::H0 => "h0",
            HeuristicLevel::H1 => "h1",
            HeuristicLevel::H2 => "h2",
            HeuristicLevel::H3 => "h3",
            HeuristicLevel::H4 => "h4",
            HeuristicLevel::H5 => "h5",
            HeuristicLevel::TailCorrection => "tail",
        }
    }
}

impl fmt::Display for HeuristicLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate passage through a tube
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TubeEvent {
    pub tube: TubeId,
    pub start: f64,
    pub end: f64,
    /// Sorted, deduplicated
    pub animals: Vec<TagId>,
    pub left: Vec<Interval>,
    pub right: Vec<Interval>,
    pub rfid: Vec<RfidInterval>,
    pub direction: Direction,
    /// `None` while the direction is unknown
    pub level: Option<HeuristicLevel>,
}

impl TubeEvent {
    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_single_animal(&self) -> bool {
        self.animals.len() == 1
    }

    pub fn has_animal(&self, tag: &TagId) -> bool {
        self.animals.binary_search(tag).is_ok()
    }

    pub fn resolve(&mut self, direction: Direction, level: HeuristicLevel) {
        self.direction = direction;
        self.level = direction.is_resolved().then_some(level);
    }

    pub fn demote(&mut self) {
        self.direction = Direction::Unknown;
        self.level = None;
    }

    /// Space separated animal list for tabular output
    pub fn animals_label(&self) -> String {
        self.animals
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_overlap_margin() {
        let a = Interval::new(0.0, 10.0);
        let b = Interval::new(15.0, 20.0);
        assert!(!a.overlaps(&b, 0.0));
        assert!(a.overlaps(&b, 2.5));
        assert!(a.overlaps(&Interval::new(10.0, 12.0), 0.0));
    }

    #[test]
    fn test_level_confidence_order() {
        assert!(HeuristicLevel::H0.confidence() > HeuristicLevel::H2.confidence());
        assert!(HeuristicLevel::H1.confidence() > HeuristicLevel::H3.confidence());
        assert_eq!(HeuristicLevel::TailCorrection.confidence(), 0.5);
    }

    #[test]
    fn test_resolve_unknown_clears_level() {
        let mut e = TubeEvent {
            tube: 0,
            start: 0.0,
            end: 1.0,
            animals: vec!["A".into()],
            left: vec![],
            right: vec![],
            rfid: vec![],
            direction: Direction::Unknown,
            level: None,
        };
        e.resolve(Direction::Right, HeuristicLevel::H0);
        assert_eq!(e.level, Some(HeuristicLevel::H0));
        e.demote();
        assert_eq!(e.direction, Direction::Unknown);
        assert_eq!(e.level, None);
        assert!(e.has_animal(&"a".into()));
    }
}
