//! Merge error types

use contracts::{OccupancyRecord, TagId};
use thiserror::Error;

/// Merge error
#[derive(Debug, Error)]
pub enum MergeError {
    /// Overlapping same-animal records that do not describe the same stay
    #[error("{} overlapping records for {animal} disagree on enter/exit", .records.len())]
    OverlapGraphInconsistency {
        animal: TagId,
        records: Vec<OccupancyRecord>,
    },

    /// A per-animal merge was handed records of another animal
    #[error("expected records for {expected}, found {found}")]
    MixedAnimals { expected: TagId, found: TagId },
}

impl MergeError {
    pub fn inconsistency(records: Vec<OccupancyRecord>) -> Self {
        let animal = records
            .first()
            .map(|r| r.animal.clone())
            .unwrap_or_else(|| TagId::from(""));
        Self::OverlapGraphInconsistency { animal, records }
    }
}

/// Merge Result alias
pub type Result<T> = std::result::Result<T, MergeError>;
