//! DiagnosticSink trait - per-animal tracker introspection
//!
//! A colony can attach a sink to any animal to observe how its occupancy is
//! built up, read by read.

use std::sync::{Arc, Mutex};

use crate::{CageId, TagId, TubeId};

/// One step of the tracker protocol for a single animal
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerDiagnostic {
    /// A crossing confirmed the animal in `cage` over `[enter, exit]`
    OccupancySet {
        tag: TagId,
        cage: CageId,
        enter: f64,
        exit: f64,
    },
    /// Next cage predicted after a read on `tube`
    PredictionSet {
        tag: TagId,
        cage: CageId,
        tube: TubeId,
        time: f64,
    },
    /// A prediction chain was confirmed and spliced into occupancy
    PredictionsAccepted { tag: TagId, count: usize },
    /// Outstanding predictions dropped
    PredictionsCleared {
        tag: TagId,
        count: usize,
        reason: &'static str,
    },
    /// Jump between non-adjacent tubes
    Teleport {
        tag: TagId,
        from_tube: TubeId,
        to_tube: TubeId,
        time: f64,
    },
}

impl TrackerDiagnostic {
    pub fn tag(&self) -> &TagId {
        match self {
            TrackerDiagnostic::OccupancySet { tag, .. }
            | TrackerDiagnostic::PredictionSet { tag, .. }
            | TrackerDiagnostic::PredictionsAccepted { tag, .. }
            | TrackerDiagnostic::PredictionsCleared { tag, .. }
            | TrackerDiagnostic::Teleport { tag, .. } => tag,
        }
    }
}

/// Receiver for tracker diagnostics
///
/// Implementations must not fail; the tracker never waits on a sink.
pub trait DiagnosticSink: Send {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    fn emit(&mut self, diagnostic: TrackerDiagnostic);
}

impl std::fmt::Debug for dyn DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DiagnosticSink({})", self.name())
    }
}

/// Collects diagnostics in memory. Clones share one buffer, so a clone can
/// be attached to a colony while the original is read back.
#[derive(Debug, Clone, Default)]
pub struct VecDiagnostics {
    diagnostics: Arc<Mutex<Vec<TrackerDiagnostic>>>,
}

impl VecDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn snapshot(&self) -> Vec<TrackerDiagnostic> {
        self.diagnostics
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticSink for VecDiagnostics {
    fn name(&self) -> &str {
        "vec"
    }

    fn emit(&mut self, diagnostic: TrackerDiagnostic) {
        if let Ok(mut d) = self.diagnostics.lock() {
            d.push(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let sink = VecDiagnostics::new();
        let mut attached: Box<dyn DiagnosticSink> = Box::new(sink.clone());
        attached.emit(TrackerDiagnostic::PredictionsAccepted {
            tag: "A1".into(),
            count: 2,
        });
        let seen = sink.snapshot();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].tag(), "A1");
    }
}
