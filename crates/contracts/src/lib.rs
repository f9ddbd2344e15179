//! # Contracts
//!
//! Shared data contracts for the colony tracker workspace. Every other crate
//! depends on this one; it depends on nothing in the workspace.
//!
//! ## Time model
//! - Boards stamp events with a wrapping `u32` millisecond tick counter
//! - World time is `f64` milliseconds, produced by the colony clock
//! - Before the clock is synced, world time is the unwrapped tick count

mod config;
mod diagnostics;
mod error;
mod event;
mod layout;
mod occupancy;
mod tag_id;
mod tube_event;

pub use config::*;
pub use diagnostics::{DiagnosticSink, TrackerDiagnostic, VecDiagnostics};
pub use error::*;
pub use event::*;
pub use layout::{CageId, ColonyLayout, Topology, TubeId};
pub use occupancy::*;
pub use tag_id::TagId;
pub use tube_event::*;
