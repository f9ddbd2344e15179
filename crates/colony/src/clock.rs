//! Board tick to world time conversion.
//!
//! Boards count milliseconds in a `u32` that wraps roughly every 49.7 days.
//! The clock unwraps the counter by watching for backwards steps and maps the
//! unwrapped tick onto world time with a least-squares line fitted to
//! `(tick, world_ms)` sync samples.

use contracts::Event;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Ticks added per detected rollover
pub const ROLLOVER_SPAN: f64 = 4_294_967_296.0;

const SVD_EPS: f64 = 1e-12;

/// World time = tick * slope + intercept
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

impl Regression {
    #[inline]
    pub fn apply(&self, ticks: f64) -> f64 {
        ticks * self.slope + self.intercept
    }
}

/// Rollover-aware device clock
///
/// Ticks must be fed in device order within a segment. A tick smaller than
/// the previous one is read as a counter wrap, so out-of-order input inflates
/// the offset. Call [`Clock::reset_rollover`] at every segment boundary.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    last_device_time: Option<u32>,
    rollover_offset: f64,
    rollovers: u32,
    regression: Option<Regression>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit slope / intercept over `(device_ticks, world_ms)` samples.
    ///
    /// With fewer than two samples, or when every sample has the same device
    /// time, the clock stays (or becomes) unsynced and keeps returning raw
    /// unwrapped ticks. Returns whether a regression is active afterwards.
    pub fn sync(&mut self, samples: &[(f64, f64)]) -> bool {
        match fit_line(samples) {
            Some(regression) => {
                debug!(
                    slope = regression.slope,
                    intercept = regression.intercept,
                    samples = samples.len(),
                    "clock synced"
                );
                self.regression = Some(regression);
            }
            None => {
                warn!(
                    samples = samples.len(),
                    "clock sync needs two distinct sync samples, using raw ticks"
                );
                self.regression = None;
            }
        }
        self.regression.is_some()
    }

    /// Convert a device tick to world time, unwrapping rollovers
    pub fn teensy_to_world(&mut self, t: u32) -> f64 {
        if let Some(last) = self.last_device_time {
            if t < last {
                self.rollover_offset += ROLLOVER_SPAN;
                self.rollovers += 1;
                debug!(last, t, rollovers = self.rollovers, "device clock rollover");
            }
        }
        self.last_device_time = Some(t);
        let unwrapped = t as f64 + self.rollover_offset;
        match self.regression {
            Some(r) => r.apply(unwrapped),
            None => unwrapped,
        }
    }

    /// Stamp an event in place and return its world time
    pub fn annotate(&mut self, event: &mut Event) -> f64 {
        let world = self.teensy_to_world(event.timestamp());
        event.annotate_world_timestamp(world);
        world
    }

    /// Forget rollover state; required at segment boundaries
    pub fn reset_rollover(&mut self) {
        self.last_device_time = None;
        self.rollover_offset = 0.0;
    }

    /// Elapsed ticks from `earlier` to `later`, allowing one wrap
    #[inline]
    pub fn teensy_dt(later: u32, earlier: u32) -> u32 {
        later.wrapping_sub(earlier)
    }

    pub fn regression(&self) -> Option<Regression> {
        self.regression
    }

    #[inline]
    pub fn is_synced(&self) -> bool {
        self.regression.is_some()
    }

    /// Rollovers detected since construction
    pub fn rollover_count(&self) -> u32 {
        self.rollovers
    }
}

/// Least squares line through `(x, y)` samples via SVD
fn fit_line(samples: &[(f64, f64)]) -> Option<Regression> {
    if samples.len() < 2 {
        return None;
    }
    let first_x = samples[0].0;
    if samples.iter().all(|(x, _)| *x == first_x) {
        return None;
    }
    let n = samples.len();
    // Center x so large tick counts do not swamp the intercept column
    let x_mean = samples.iter().map(|(x, _)| x).sum::<f64>() / n as f64;
    let a = DMatrix::from_fn(n, 2, |i, j| if j == 0 { samples[i].0 - x_mean } else { 1.0 });
    let b = DVector::from_iterator(n, samples.iter().map(|(_, y)| *y));
    let solution = a.svd(true, true).solve(&b, SVD_EPS).ok()?;
    let slope = solution[0];
    let intercept = solution[1] - slope * x_mean;
    (slope.is_finite() && intercept.is_finite()).then_some(Regression { slope, intercept })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollover_sequence() {
        let mut clock = Clock::new();
        let out: Vec<f64> = [10u32, 20, 5, 15]
            .iter()
            .map(|&t| clock.teensy_to_world(t))
            .collect();
        assert_eq!(out, vec![10.0, 20.0, 5.0 + ROLLOVER_SPAN, 15.0 + ROLLOVER_SPAN]);
        assert_eq!(clock.rollover_count(), 1);
    }

    #[test]
    fn test_reset_rollover() {
        let mut clock = Clock::new();
        clock.teensy_to_world(100);
        clock.teensy_to_world(50);
        clock.reset_rollover();
        assert_eq!(clock.teensy_to_world(40), 40.0);
    }

    #[test]
    fn test_sync_fits_line() {
        let mut clock = Clock::new();
        let samples = [(0.0, 1000.0), (1000.0, 3000.0), (2000.0, 5000.0)];
        assert!(clock.sync(&samples));
        let r = clock.regression().unwrap();
        assert!((r.slope - 2.0).abs() < 1e-9);
        assert!((r.intercept - 1000.0).abs() < 1e-6);
        assert!((clock.teensy_to_world(500) - 2000.0).abs() < 1e-6);
    }

    #[test]
    fn test_sync_large_ticks() {
        let mut clock = Clock::new();
        let base = 1.7e12;
        let samples = [(3.0e9, base), (3.6e9, base + 6.0e8), (4.2e9, base + 1.2e9)];
        assert!(clock.sync(&samples));
        let world = clock.teensy_to_world(3_300_000_000);
        assert!((world - (base + 3.0e8)).abs() < 1e-2);
    }

    #[test]
    fn test_degenerate_sync_leaves_raw_ticks() {
        let mut clock = Clock::new();
        assert!(!clock.sync(&[(5.0, 1.0)]));
        assert!(!clock.sync(&[(5.0, 1.0), (5.0, 9.0)]));
        assert_eq!(clock.teensy_to_world(77), 77.0);
    }

    #[test]
    fn test_teensy_dt_wraps() {
        assert_eq!(Clock::teensy_dt(20, 10), 10);
        assert_eq!(Clock::teensy_dt(5, u32::MAX - 4), 10);
    }

    #[test]
    fn test_annotate() {
        let mut clock = Clock::new();
        let mut e = Event::rfid(42, 0, "aa");
        assert_eq!(clock.annotate(&mut e), 42.0);
        assert_eq!(e.world_timestamp(), Some(42.0));
    }

    #[test]
    fn test_sync_noisy_samples() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let tick = i as f64 * 60_000.0;
                (tick, 1.0e12 + tick * 1.0001 + rng.random_range(-5.0..5.0))
            })
            .collect();
        let mut clock = Clock::new();
        assert!(clock.sync(&samples));
        let r = clock.regression().unwrap();
        assert!((r.slope - 1.0001).abs() < 1e-6);
        assert!((r.intercept - 1.0e12).abs() < 10.0);
    }
}
