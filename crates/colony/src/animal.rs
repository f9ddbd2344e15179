//! AnimalTracker - per-tag predictive state machine.
//!
//! Reads on two adjacent tubes pin the animal in the cage between them.
//! After each crossing the tracker predicts the cage beyond the new tube;
//! returns to the same tube flip that prediction. Once a later crossing
//! agrees with the newest prediction the whole chain is spliced into the
//! confirmed occupancy, so consecutive stays share their boundary reads.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{
    AnimalProfile, CageId, ColonyLayout, DiagnosticSink, OccupancyOrigin, OccupancyRecord,
    TagId, TeleportRecord, TrackerDiagnostic, TubeId,
};
use tracing::{debug, trace};

/// Confidence of a stay bounded by two direct reads
pub const CROSSING_CONFIDENCE: f64 = 1.0;

/// Confidence of a stay spliced from a prediction chain
pub const PREDICTION_CHAIN_CONFIDENCE: f64 = 0.8;

/// A valid read of this animal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadPoint {
    pub tube: TubeId,
    pub time: f64,
}

/// Predicted cage, entered at `at`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub cage: CageId,
    pub at: ReadPoint,
}

/// Confirmed stay bounded by two reads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancySpan {
    pub cage: CageId,
    pub enter: ReadPoint,
    pub exit: ReadPoint,
    pub origin: OccupancyOrigin,
}

/// How a read was interpreted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    /// First read of the animal
    Bootstrap,
    /// Same tube within the merge threshold
    Duplicate,
    /// Same tube after a gap
    Return,
    /// Adjacent tube; `transit` is the elapsed time since the previous read
    Crossing { cage: CageId, transit: f64 },
    /// Non-adjacent tube
    Teleport,
}

/// Tracking state for one tagged animal
pub struct AnimalTracker {
    profile: AnimalProfile,
    last_read: Option<ReadPoint>,
    predictions: Vec<Prediction>,
    confirmed: Vec<OccupancySpan>,
    reads_per_tube: BTreeMap<TubeId, u64>,
    teleports: Vec<TeleportRecord>,
    diagnostics: Option<Box<dyn DiagnosticSink>>,
}

impl fmt::Debug for AnimalTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimalTracker")
            .field("tag", &self.profile.tag)
            .field("last_read", &self.last_read)
            .field("predictions", &self.predictions.len())
            .field("confirmed", &self.confirmed.len())
            .field("teleports", &self.teleports.len())
            .field(
                "diagnostics",
                &self.diagnostics.as_ref().map(|d| d.name().to_string()),
            )
            .finish()
    }
}

impl AnimalTracker {
    pub fn new(profile: AnimalProfile) -> Self {
        Self {
            profile,
            last_read: None,
            predictions: Vec::new(),
            confirmed: Vec::new(),
            reads_per_tube: BTreeMap::new(),
            teleports: Vec::new(),
            diagnostics: None,
        }
    }

    #[inline]
    pub fn tag(&self) -> &TagId {
        &self.profile.tag
    }

    pub fn profile(&self) -> &AnimalProfile {
        &self.profile
    }

    pub(crate) fn set_profile(&mut self, profile: AnimalProfile) {
        self.profile = profile;
    }

    pub(crate) fn attach_diagnostics(&mut self, sink: Box<dyn DiagnosticSink>) {
        self.diagnostics = Some(sink);
    }

    pub fn last_read(&self) -> Option<ReadPoint> {
        self.last_read
    }

    /// Cage named by the newest outstanding prediction
    pub fn get_predicted_cage(&self) -> Option<CageId> {
        self.predictions.last().map(|p| p.cage)
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    /// Confirmed stays with their bounding reads
    pub fn confirmed_occupancy(&self) -> &[OccupancySpan] {
        &self.confirmed
    }

    /// Confirmed stays as occupancy records
    pub fn occupancy(&self) -> Vec<OccupancyRecord> {
        self.confirmed
            .iter()
            .map(|span| OccupancyRecord {
                enter_time: span.enter.time,
                exit_time: span.exit.time,
                cage: span.cage,
                animal: self.profile.tag.clone(),
                confidence: match span.origin {
                    OccupancyOrigin::PredictionChain => PREDICTION_CHAIN_CONFIDENCE,
                    _ => CROSSING_CONFIDENCE,
                },
                origin: span.origin,
            })
            .collect()
    }

    pub fn reads_per_tube(&self) -> &BTreeMap<TubeId, u64> {
        &self.reads_per_tube
    }

    pub fn n_reads(&self) -> u64 {
        self.reads_per_tube.values().sum()
    }

    pub fn teleports(&self) -> &[TeleportRecord] {
        &self.teleports
    }

    /// Run the tracker protocol for one valid read
    pub(crate) fn observe(
        &mut self,
        read: ReadPoint,
        layout: &ColonyLayout,
        merge_threshold: f64,
    ) -> ReadOutcome {
        *self.reads_per_tube.entry(read.tube).or_insert(0) += 1;
        let outcome = match self.last_read {
            None => ReadOutcome::Bootstrap,
            Some(last) if last.tube == read.tube => {
                if read.time - last.time <= merge_threshold {
                    ReadOutcome::Duplicate
                } else {
                    self.returned(read, layout)
                }
            }
            Some(last) => self.moved(last, read, layout),
        };
        trace!(tag = %self.tag(), tube = read.tube, time = read.time, ?outcome, "read");
        self.last_read = Some(read);
        outcome
    }

    /// Same tube after a gap: the animal went through and came back, or
    /// passed on to the far cage
    fn returned(&mut self, read: ReadPoint, layout: &ColonyLayout) -> ReadOutcome {
        let Some(predicted) = self.get_predicted_cage() else {
            return ReadOutcome::Return;
        };
        match layout.opposite_cage(read.tube, predicted) {
            Some(next) => self.set_prediction(next, read),
            None => {
                let from_tube = self.last_read.map(|l| l.tube).unwrap_or(read.tube);
                self.teleported(read.time, from_tube, read.tube);
            }
        }
        ReadOutcome::Return
    }

    fn moved(&mut self, last: ReadPoint, read: ReadPoint, layout: &ColonyLayout) -> ReadOutcome {
        let transit = read.time - last.time;
        if layout.is_right_step(last.tube, read.tube) {
            let cage = layout.right_cage(last.tube);
            self.set_occupancy(cage, last, read);
            self.set_prediction(layout.right_cage(read.tube), read);
            ReadOutcome::Crossing { cage, transit }
        } else if layout.is_left_step(last.tube, read.tube) {
            let cage = layout.left_cage(last.tube);
            self.set_occupancy(cage, last, read);
            self.set_prediction(layout.left_cage(read.tube), read);
            ReadOutcome::Crossing { cage, transit }
        } else {
            self.teleported(read.time, last.tube, read.tube);
            ReadOutcome::Teleport
        }
    }

    /// Confirm a stay in `cage` between two reads, settling any predictions
    fn set_occupancy(&mut self, cage: CageId, last: ReadPoint, read: ReadPoint) {
        let mut current = OccupancySpan {
            cage,
            enter: last,
            exit: read,
            origin: OccupancyOrigin::Crossing,
        };
        if let Some(newest) = self.predictions.last().copied() {
            if newest.cage == cage {
                self.accept_predictions();
                current.enter = newest.at;
            } else {
                self.clear_predictions("crossing disagrees with prediction");
            }
        }
        self.emit(TrackerDiagnostic::OccupancySet {
            tag: self.tag().clone(),
            cage,
            enter: current.enter.time,
            exit: current.exit.time,
        });
        self.confirmed.push(current);
    }

    fn set_prediction(&mut self, cage: CageId, at: ReadPoint) {
        self.emit(TrackerDiagnostic::PredictionSet {
            tag: self.tag().clone(),
            cage,
            tube: at.tube,
            time: at.time,
        });
        self.predictions.push(Prediction { cage, at });
    }

    /// Splice the prediction chain: each prediction's cage is held from its
    /// read until the next prediction's read
    fn accept_predictions(&mut self) {
        let predictions = std::mem::take(&mut self.predictions);
        for pair in predictions.windows(2) {
            self.confirmed.push(OccupancySpan {
                cage: pair[0].cage,
                enter: pair[0].at,
                exit: pair[1].at,
                origin: OccupancyOrigin::PredictionChain,
            });
        }
        debug!(tag = %self.tag(), count = predictions.len(), "predictions accepted");
        self.emit(TrackerDiagnostic::PredictionsAccepted {
            tag: self.tag().clone(),
            count: predictions.len(),
        });
    }

    fn clear_predictions(&mut self, reason: &'static str) {
        if self.predictions.is_empty() {
            return;
        }
        let count = self.predictions.len();
        self.predictions.clear();
        self.emit(TrackerDiagnostic::PredictionsCleared {
            tag: self.tag().clone(),
            count,
            reason,
        });
    }

    fn teleported(&mut self, time: f64, from_tube: TubeId, to_tube: TubeId) {
        self.teleports.push(TeleportRecord {
            time,
            from_tube,
            to_tube,
        });
        self.emit(TrackerDiagnostic::Teleport {
            tag: self.tag().clone(),
            from_tube,
            to_tube,
            time,
        });
        self.clear_predictions("teleport");
    }

    fn emit(&mut self, diagnostic: TrackerDiagnostic) {
        if let Some(sink) = self.diagnostics.as_mut() {
            sink.emit(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::VecDiagnostics;

    fn tracker() -> AnimalTracker {
        AnimalTracker::new(AnimalProfile::anonymous("A1".into()))
    }

    fn read(tube: TubeId, time: f64) -> ReadPoint {
        ReadPoint { tube, time }
    }

    #[test]
    fn test_bootstrap_then_crossing() {
        let layout = ColonyLayout::linear(4);
        let mut a = tracker();
        assert_eq!(a.observe(read(0, 0.0), &layout, 800.0), ReadOutcome::Bootstrap);
        let outcome = a.observe(read(1, 2000.0), &layout, 800.0);
        assert_eq!(
            outcome,
            ReadOutcome::Crossing {
                cage: 1,
                transit: 2000.0
            }
        );
        assert_eq!(a.confirmed_occupancy().len(), 1);
        assert_eq!(a.get_predicted_cage(), Some(2));
        assert_eq!(a.n_reads(), 2);
    }

    #[test]
    fn test_left_crossing_cage() {
        let layout = ColonyLayout::linear(4);
        let mut a = tracker();
        a.observe(read(2, 0.0), &layout, 800.0);
        a.observe(read(1, 1000.0), &layout, 800.0);
        assert_eq!(a.confirmed_occupancy()[0].cage, 2);
        assert_eq!(a.get_predicted_cage(), Some(1));
    }

    #[test]
    fn test_duplicate_and_return() {
        let layout = ColonyLayout::linear(4);
        let mut a = tracker();
        a.observe(read(1, 0.0), &layout, 800.0);
        assert_eq!(a.observe(read(1, 500.0), &layout, 800.0), ReadOutcome::Duplicate);
        assert_eq!(a.observe(read(1, 5000.0), &layout, 800.0), ReadOutcome::Return);
        // no prediction yet: nothing inferred
        assert!(a.predictions().is_empty());
        assert_eq!(a.last_read(), Some(read(1, 5000.0)));
    }

    #[test]
    fn test_prediction_chain_spliced_contiguously() {
        let layout = ColonyLayout::linear(4);
        let mut a = tracker();
        a.observe(read(0, 0.0), &layout, 800.0);
        a.observe(read(1, 1000.0), &layout, 800.0); // cage 1, predict 2
        a.observe(read(1, 10_000.0), &layout, 800.0); // back out: predict 1
        a.observe(read(1, 20_000.0), &layout, 800.0); // through again: predict 2
        assert_eq!(a.predictions().len(), 3);
        a.observe(read(2, 21_000.0), &layout, 800.0); // crossing in cage 2 confirms

        let spans = a.confirmed_occupancy();
        let cages: Vec<CageId> = spans.iter().map(|s| s.cage).collect();
        assert_eq!(cages, vec![1, 2, 1, 2]);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].exit.time, pair[1].enter.time);
        }
        assert_eq!(spans[3].enter.time, 20_000.0);
        assert_eq!(spans[1].origin, OccupancyOrigin::PredictionChain);
        assert_eq!(a.get_predicted_cage(), Some(3));
    }

    #[test]
    fn test_mismatched_crossing_clears_predictions() {
        let layout = ColonyLayout::linear(4);
        let mut a = tracker();
        a.observe(read(0, 0.0), &layout, 800.0);
        a.observe(read(1, 1000.0), &layout, 800.0); // predict 2
        a.observe(read(0, 2000.0), &layout, 800.0); // crossing cage 1, mismatch
        let last = a.confirmed_occupancy().last().copied().unwrap();
        assert_eq!(last.cage, 1);
        assert_eq!(last.enter.time, 1000.0);
        assert_eq!(a.get_predicted_cage(), Some(0));
        assert_eq!(a.predictions().len(), 1);
    }

    #[test]
    fn test_ring_teleport_clears_prediction() {
        let layout = ColonyLayout::ring(5);
        let mut a = tracker();
        a.observe(read(0, 0.0), &layout, 800.0);
        a.observe(read(1, 1000.0), &layout, 800.0);
        assert!(a.get_predicted_cage().is_some());
        assert_eq!(a.observe(read(3, 2000.0), &layout, 800.0), ReadOutcome::Teleport);
        assert_eq!(a.get_predicted_cage(), None);
        assert_eq!(
            a.teleports(),
            &[TeleportRecord {
                time: 2000.0,
                from_tube: 1,
                to_tube: 3
            }]
        );
    }

    #[test]
    fn test_ring_wrap_is_adjacent() {
        let layout = ColonyLayout::ring(5);
        let mut a = tracker();
        a.observe(read(4, 0.0), &layout, 800.0);
        let outcome = a.observe(read(0, 900.0), &layout, 800.0);
        assert!(matches!(outcome, ReadOutcome::Crossing { cage: 0, .. }));
        assert_eq!(a.get_predicted_cage(), Some(1));
    }

    #[test]
    fn test_diagnostics_emitted() {
        let layout = ColonyLayout::linear(3);
        let sink = VecDiagnostics::new();
        let mut a = tracker();
        a.attach_diagnostics(Box::new(sink.clone()));
        a.observe(read(0, 0.0), &layout, 800.0);
        a.observe(read(1, 1000.0), &layout, 800.0);
        a.observe(read(2, 2000.0), &layout, 800.0);
        let seen = sink.snapshot();
        assert!(seen
            .iter()
            .any(|d| matches!(d, TrackerDiagnostic::PredictionsAccepted { count: 1, .. })));
        assert!(seen
            .iter()
            .any(|d| matches!(d, TrackerDiagnostic::OccupancySet { cage: 2, .. })));
    }
}
