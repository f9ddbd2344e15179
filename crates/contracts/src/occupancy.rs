//! Derived records: occupancy, chases, teleports.

use serde::{Deserialize, Serialize};

use crate::{CageId, TagId, TubeId};

/// How an occupancy record was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyOrigin {
    /// Read pair on two adjacent tubes
    Crossing,
    /// Spliced from an accepted prediction chain
    PredictionChain,
    /// Batch tube event path
    TubeEvent,
    /// Two sources agreed on the cage
    Merged,
    /// Traced through an animal's whole read sequence
    ReadSequence,
}

impl OccupancyOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            OccupancyOrigin::Crossing => "crossing",
            OccupancyOrigin::PredictionChain => "prediction_chain",
            OccupancyOrigin::TubeEvent => "tube_event",
            OccupancyOrigin::Merged => "merged",
            OccupancyOrigin::ReadSequence => "read_sequence",
        }
    }
}

/// Animal-to-cage assignment over `[enter_time, exit_time]` (world ms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub enter_time: f64,
    pub exit_time: f64,
    #[serde(rename = "cage_id")]
    pub cage: CageId,
    #[serde(rename = "animal_id")]
    pub animal: TagId,
    pub confidence: f64,
    pub origin: OccupancyOrigin,
}

impl OccupancyRecord {
    #[inline]
    pub fn duration(&self) -> f64 {
        self.exit_time - self.enter_time
    }

    /// Strict overlap; records that only touch at a boundary do not overlap
    #[inline]
    pub fn overlaps(&self, other: &OccupancyRecord) -> bool {
        self.enter_time < other.exit_time && other.enter_time < self.exit_time
    }
}

/// Two animals read on one tube within the multi-animal threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChaseRecord {
    pub time: f64,
    #[serde(rename = "tube_id")]
    pub tube: TubeId,
    #[serde(rename = "chaser_animal_id")]
    pub chaser: TagId,
    #[serde(rename = "chasee_animal_id")]
    pub chasee: TagId,
}

/// A topologically impossible jump between non-adjacent tubes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleportRecord {
    pub time: f64,
    pub from_tube: TubeId,
    pub to_tube: TubeId,
}

/// Chaser x chasee counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChaseMatrix {
    /// Row / column order
    pub animals: Vec<TagId>,
    /// `counts[chaser][chasee]`
    pub counts: Vec<Vec<u32>>,
}

impl ChaseMatrix {
    /// Tally chase records over a fixed animal order. Records naming an
    /// animal outside the order are skipped.
    pub fn from_records<'a>(
        animals: Vec<TagId>,
        records: impl IntoIterator<Item = &'a ChaseRecord>,
    ) -> Self {
        let n = animals.len();
        let mut counts = vec![vec![0u32; n]; n];
        for record in records {
            let chaser = animals.iter().position(|a| *a == record.chaser);
            let chasee = animals.iter().position(|a| *a == record.chasee);
            if let (Some(i), Some(j)) = (chaser, chasee) {
                counts[i][j] += 1;
            }
        }
        Self { animals, counts }
    }

    pub fn get(&self, chaser: &str, chasee: &str) -> Option<u32> {
        let i = self.animals.iter().position(|a| a == chaser)?;
        let j = self.animals.iter().position(|a| a == chasee)?;
        Some(self.counts[i][j])
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().flatten().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(enter: f64, exit: f64) -> OccupancyRecord {
        OccupancyRecord {
            enter_time: enter,
            exit_time: exit,
            cage: 1,
            animal: "A1".into(),
            confidence: 1.0,
            origin: OccupancyOrigin::Crossing,
        }
    }

    #[test]
    fn test_touching_records_do_not_overlap() {
        assert!(!record(0.0, 10.0).overlaps(&record(10.0, 20.0)));
        assert!(record(0.0, 10.0).overlaps(&record(9.0, 20.0)));
    }

    #[test]
    fn test_chase_matrix_counts() {
        let chases = vec![
            ChaseRecord {
                time: 1.0,
                tube: 0,
                chaser: "B".into(),
                chasee: "A".into(),
            },
            ChaseRecord {
                time: 2.0,
                tube: 1,
                chaser: "B".into(),
                chasee: "A".into(),
            },
            ChaseRecord {
                time: 3.0,
                tube: 1,
                chaser: "C".into(),
                chasee: "B".into(),
            },
        ];
        let m = ChaseMatrix::from_records(vec!["A".into(), "B".into()], &chases);
        assert_eq!(m.get("B", "A"), Some(2));
        assert_eq!(m.get("A", "B"), Some(0));
        assert_eq!(m.get("C", "B"), None);
        assert_eq!(m.total(), 2);
    }
}
