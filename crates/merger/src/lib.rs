//! # Merger
//!
//! Combines occupancy lists into one colony timeline.
//!
//! - [`merge_occupancies`]: concatenate, sort and cull duplicate stays
//! - [`merge_tube_event_occupancies`]: reconcile two sources for one animal
//!   through the cage adjacency table, reporting what cannot be reconciled

mod cull;
mod error;
mod sweep;

// Re-exports
pub use cull::merge_occupancies;
pub use error::{MergeError, Result};
pub use sweep::{
    merge_tube_event_occupancies, merge_tube_event_occupancies_by_animal, CageAdjacency,
    OpenConflict, SweepOutcome,
};
