//! Tracing-backed diagnostic sink

use contracts::{DiagnosticSink, TrackerDiagnostic};
use tracing::debug;

/// Forwards tracker diagnostics to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn name(&self) -> &str {
        "tracing"
    }

    fn emit(&mut self, diagnostic: TrackerDiagnostic) {
        match diagnostic {
            TrackerDiagnostic::OccupancySet {
                tag,
                cage,
                enter,
                exit,
            } => debug!(%tag, cage, enter, exit, "set_occupancy"),
            TrackerDiagnostic::PredictionSet {
                tag,
                cage,
                tube,
                time,
            } => debug!(%tag, cage, tube, time, "set_prediction"),
            TrackerDiagnostic::PredictionsAccepted { tag, count } => {
                debug!(%tag, count, "accept_predictions")
            }
            TrackerDiagnostic::PredictionsCleared { tag, count, reason } => {
                debug!(%tag, count, reason, "clear_predictions")
            }
            TrackerDiagnostic::Teleport {
                tag,
                from_tube,
                to_tube,
                time,
            } => debug!(%tag, from_tube, to_tube, time, "teleport"),
        }
    }
}
