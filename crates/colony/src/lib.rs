//! # Colony
//!
//! Streaming occupancy inference.
//!
//! Responsibilities:
//! - Unwrap board tick counters and map them onto world time
//! - Track each tagged animal through tube crossings
//! - Confirm cage stays and splice prediction chains
//! - Detect chases and teleports
//! - Autotune the same-tube merge threshold
//!
//! ## Usage Example
//!
//! ```
//! use colony::Colony;
//! use contracts::{ColonyConfig, ColonyLayout, Event};
//!
//! let mut colony = Colony::new(ColonyConfig::new(ColonyLayout::linear(3)));
//! for mut event in [Event::rfid(0, 0, "2a006d2d1b"), Event::rfid(1500, 1, "2a006d2d1b")] {
//!     colony.process_event(&mut event);
//! }
//! assert_eq!(colony.get_occupancy(None).len(), 1);
//! ```

mod animal;
mod clock;
mod colony;
mod diagnostics;
mod tube;

// Re-exports
pub use animal::{
    AnimalTracker, OccupancySpan, Prediction, ReadOutcome, ReadPoint, CROSSING_CONFIDENCE,
    PREDICTION_CHAIN_CONFIDENCE,
};
pub use clock::{Clock, Regression, ROLLOVER_SPAN};
pub use colony::{Colony, ColonySummary, EventCounters};
pub use diagnostics::TracingDiagnostics;
pub use tube::{Tube, TubeCounters};
