//! Command implementations.

mod detect;
mod sequence;
mod track;
mod validate;

pub use detect::run_detect;
pub use sequence::run_sequence;
pub use track::run_track;
pub use validate::run_validate;

use std::ops::Range;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colony::{Clock, Colony};
use contracts::{
    ChaseRecord, ColonyBlueprint, ColonyLayout, Event, OccupancyRecord, TagId, Topology,
};
use ingestion::{clock_samples, load_segments, IngestionStats, LogSegment};
use tracing::{info, warn};

use crate::cli::ColonyArgs;
use crate::error::CliError;
use crate::output::STDOUT;

/// Blueprint from `--config` (or defaults from `--n-tubes`), with CLI
/// overrides applied and validated
pub(crate) fn load_blueprint(args: &ColonyArgs) -> Result<ColonyBlueprint> {
    let mut blueprint = match (&args.config, args.n_tubes) {
        (Some(path), _) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        (None, Some(n_tubes)) => ColonyBlueprint::with_layout(ColonyLayout::linear(n_tubes)),
        (None, None) => return Err(CliError::MissingLayout.into()),
    };

    if let (Some(_), Some(n_tubes)) = (&args.config, args.n_tubes) {
        info!(n_tubes, "Overriding tube count from CLI");
        blueprint.colony.n_tubes = n_tubes;
    }
    if args.ring {
        blueprint.colony.topology = Topology::Ring;
    }
    if let Some(ref path) = args.occupancy {
        blueprint.output.occupancy = Some(path.clone());
    }
    if let Some(min_reads) = args.min_reads {
        blueprint.output.min_reads = min_reads;
    }

    config_loader::ConfigLoader::validate(&blueprint).context("Invalid colony configuration")?;

    info!(
        n_tubes = blueprint.colony.n_tubes,
        topology = ?blueprint.colony.topology,
        animals = blueprint.animals.len(),
        "Configuration loaded"
    );
    Ok(blueprint)
}

/// Load segments in capture order and total their line counts
pub(crate) fn read_segments(files: &[PathBuf]) -> Result<(Vec<LogSegment>, IngestionStats)> {
    let segments = load_segments(files).context("Failed to read log segments")?;
    let mut stats = IngestionStats::new();
    for segment in &segments {
        stats.merge(&segment.stats);
    }
    if segments.is_empty() {
        return Err(CliError::NoEvents { count: files.len() }.into());
    }
    if segments.iter().any(|s| s.anchor_ms.is_none()) {
        warn!("some segment names carry no capture time; their clock samples are skipped");
    }
    info!(
        segments = segments.len(),
        events = stats.events,
        malformed = stats.malformed,
        "Segments loaded"
    );
    Ok((segments, stats))
}

/// Events of every segment stamped with world time by one clock
#[derive(Debug, Default)]
pub(crate) struct StampedEvents {
    pub events: Vec<Event>,
    /// Index range of each segment within `events`
    pub spans: Vec<Range<usize>>,
    /// Sync samples the clock was fitted to
    pub samples: Vec<(f64, f64)>,
    pub clock_synced: bool,
}

impl StampedEvents {
    /// Stamp segments in order, resetting rollover tracking at every
    /// boundary. Events from boards outside the layout are dropped.
    pub fn stamp(segments: Vec<LogSegment>, n_tubes: usize) -> Self {
        let samples = clock_samples(&segments);
        let mut clock = Clock::new();
        let clock_synced = clock.sync(&samples);
        if !clock_synced {
            warn!("Clock not synced, world time is raw board ticks");
        }

        let mut stamped = Self {
            events: Vec::with_capacity(segments.iter().map(|s| s.events.len()).sum()),
            spans: Vec::with_capacity(segments.len()),
            samples,
            clock_synced,
        };
        let mut dropped = 0usize;
        for segment in segments {
            clock.reset_rollover();
            let first = stamped.events.len();
            for mut event in segment.events {
                clock.annotate(&mut event);
                if event.board() < n_tubes {
                    stamped.events.push(event);
                } else {
                    dropped += 1;
                }
            }
            stamped.spans.push(first..stamped.events.len());
        }
        if dropped > 0 {
            warn!(dropped, n_tubes, "events from unknown boards ignored");
        }
        stamped
    }

    /// Feed the stamped events to a streaming tracker with the same clock
    /// fit and segment boundaries. Stamps are kept as they are.
    pub fn replay(&mut self, colony: &mut Colony) {
        colony.sync_clock(&self.samples);
        for span in &self.spans {
            colony.begin_segment();
            for event in &mut self.events[span.clone()] {
                colony.process_event(event);
            }
        }
    }
}

/// Occupancy destination: CLI / config path, else stdout
pub(crate) fn occupancy_path(blueprint: &ColonyBlueprint) -> PathBuf {
    blueprint
        .output
        .occupancy
        .clone()
        .unwrap_or_else(|| PathBuf::from(STDOUT))
}

/// Keep records of animals in `animals`
pub(crate) fn retain_animals(records: &mut Vec<OccupancyRecord>, animals: &[TagId]) {
    records.retain(|r| animals.contains(&r.animal));
}

/// Keep chases whose both parties are in `animals`
pub(crate) fn retain_chases(chases: &mut Vec<ChaseRecord>, animals: &[TagId]) {
    chases.retain(|c| animals.contains(&c.chaser) && animals.contains(&c.chasee));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn colony_args() -> ColonyArgs {
        ColonyArgs {
            config: None,
            n_tubes: None,
            ring: false,
            occupancy: None,
            min_reads: None,
            json: false,
        }
    }

    #[test]
    fn test_blueprint_needs_layout() {
        let err = load_blueprint(&colony_args()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::MissingLayout)
        ));
    }

    #[test]
    fn test_blueprint_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colony.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[colony]\nn_tubes = 3\n\n[output]\nmin_reads = 2").unwrap();

        let mut args = colony_args();
        args.config = Some(path);
        args.ring = true;
        args.min_reads = Some(10);
        let blueprint = load_blueprint(&args).unwrap();
        assert_eq!(blueprint.colony.n_tubes, 3);
        assert_eq!(blueprint.colony.topology, Topology::Ring);
        assert_eq!(blueprint.output.min_reads, 10);
        assert_eq!(occupancy_path(&blueprint), PathBuf::from("-"));
    }

    fn segment(name: &str, ticks: &[(u32, Event)]) -> LogSegment {
        let events = ticks
            .iter()
            .map(|(t, e)| Event::new(*t, e.board(), e.payload().clone()))
            .collect();
        LogSegment::from_events(name, events)
    }

    #[test]
    fn test_stamp_and_replay_keep_segment_boundaries() {
        let first = segment(
            "240101_000000.csv",
            &[
                (1000, Event::sync(0, 0)),
                (5000, Event::rfid(0, 0, "AA")),
                (9000, Event::rfid(0, 1, "AA")),
            ],
        );
        // board counters restarted: ticks go back below the first segment's
        let second = segment(
            "240101_000100.csv",
            &[
                (500, Event::sync(0, 0)),
                (2500, Event::rfid(0, 1, "AA")),
                (3000, Event::rfid(0, 7, "AA")),
            ],
        );

        let mut stamped = StampedEvents::stamp(vec![first, second], 2);
        assert_eq!(stamped.spans, vec![0..3, 3..5]);
        assert_eq!(stamped.samples.len(), 2);
        assert!(stamped.clock_synced);
        let times: Vec<f64> = stamped.events.iter().map(Event::world_time).collect();

        let mut colony = Colony::new(contracts::ColonyConfig::new(ColonyLayout::linear(2)));
        stamped.replay(&mut colony);
        let summary = colony.summary();
        assert!(summary.clock_synced);
        assert_eq!(summary.rollovers, 0);
        assert_eq!(summary.counters.events, 5);
        // replay keeps the stamps
        let after: Vec<f64> = stamped.events.iter().map(Event::world_time).collect();
        assert_eq!(times, after);
    }

    #[test]
    fn test_ring_of_two_rejected() {
        let mut args = colony_args();
        args.n_tubes = Some(2);
        args.ring = true;
        assert!(load_blueprint(&args).is_err());
    }
}
