//! `detect` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use colony::Colony;
use contracts::{ColonyBlueprint, DetectorConfig, Event, TubeEvent};
use tokio::task::JoinSet;
use tracing::info;
use tube_events::{occupancy_from_tube_events, sort_events, DetectionReport, TubeEventDetector};

use crate::cli::DetectArgs;
use crate::commands::{
    load_blueprint, occupancy_path, read_segments, retain_animals, StampedEvents,
};
use crate::output::{write_occupancy, write_tube_events};
use crate::stats::RunStats;

fn detector_config(args: &DetectArgs, blueprint: &ColonyBlueprint) -> DetectorConfig {
    let mut config = blueprint.detector;
    if let Some(margin) = args.margin {
        config.margin = margin;
    }
    if let Some(min_duration) = args.min_duration {
        config.min_duration = min_duration;
    }
    if args.no_tails {
        config.ignore_tails = false;
    }
    if args.keep_conflicts {
        config.remove_conflicts = false;
    }
    config
}

/// Run the detector on every tube, one blocking task per tube
async fn detect_parallel(
    detector: TubeEventDetector,
    events: &[Event],
) -> Result<(Vec<TubeEvent>, DetectionReport)> {
    let mut tasks = JoinSet::new();
    for (tube, tube_events) in tube_events::split_by_tube(events) {
        let owned: Vec<Event> = tube_events.into_iter().cloned().collect();
        tasks.spawn_blocking(move || detector.detect_tube(tube, &owned));
    }

    let mut found = Vec::new();
    let mut report = DetectionReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (events, tube_report) = joined.context("Detector task failed")?;
        found.extend(events);
        report.merge(&tube_report);
    }
    sort_events(&mut found);
    Ok((found, report))
}

/// Execute the `detect` command
pub async fn run_detect(args: &DetectArgs) -> Result<()> {
    let started = Instant::now();
    let blueprint = load_blueprint(&args.colony)?;
    let layout = blueprint.colony.layout();
    let detector = TubeEventDetector::new(detector_config(args, &blueprint));

    let (segments, ingestion) = read_segments(&args.files)?;
    let mut stats = RunStats {
        segments: segments.len(),
        ingestion,
        ..Default::default()
    };

    let mut stamped = StampedEvents::stamp(segments, layout.n_tubes);
    stats.clock_synced = stamped.clock_synced;

    let (found, report) = detect_parallel(detector, &stamped.events).await?;
    stats.unknown_tube_events = report.unknown();
    info!(
        tube_events = report.events,
        unknown = report.unknown(),
        tails_corrected = report.tails_corrected,
        conflicts_demoted = report.conflicts_demoted,
        "Detection completed"
    );

    let mut occupancy = occupancy_from_tube_events(&found, &layout);
    let mut colony = None;
    if args.with_tracker {
        let mut tracker = Colony::from_blueprint(&blueprint).context("Invalid animal profile")?;
        stamped.replay(&mut tracker);
        let merged = merger::merge_tube_event_occupancies_by_animal(
            &tracker.get_occupancy(None),
            &occupancy,
            &layout,
        )
        .context("Occupancy merge failed")?;
        stats.open_conflicts = merged.conflicts.len();
        occupancy = merged.records;
        colony = Some(tracker);
    }

    if blueprint.output.min_reads > 0 {
        let animals = match colony {
            Some(ref tracker) => tracker.animals_with_min_reads(blueprint.output.min_reads as u64),
            None => reads_per_animal_at_least(&stamped.events, blueprint.output.min_reads),
        };
        retain_animals(&mut occupancy, &animals);
    }
    let occupancy = merger::merge_occupancies([occupancy], blueprint.merge.cull)
        .context("Occupancy merge failed")?;

    write_occupancy(&occupancy_path(&blueprint), &occupancy, &blueprint)?;
    let events_path = args
        .tube_events
        .clone()
        .or_else(|| blueprint.output.tube_events.clone());
    if let Some(path) = events_path {
        write_tube_events(&path, &found, &blueprint)?;
    }

    observability::record_tube_event_metrics(&found);
    observability::record_occupancy_metrics(&occupancy);
    stats.outputs.update_tube_events(&found);
    stats.outputs.update_occupancy(&occupancy);
    stats.colony = colony.map(|c| c.summary());
    stats.duration = started.elapsed();

    if args.colony.json {
        let json = serde_json::to_string_pretty(&stats.report())
            .context("Failed to serialize run report")?;
        eprintln!("{}", json);
    } else {
        stats.print_summary();
    }
    Ok(())
}

/// Tags with at least `n` valid reads in `events`
fn reads_per_animal_at_least(events: &[Event], n: usize) -> Vec<contracts::TagId> {
    let mut counts: std::collections::BTreeMap<&contracts::TagId, usize> = Default::default();
    for tag in events.iter().filter_map(|e| e.valid_tag()) {
        *counts.entry(tag).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, c)| *c >= n)
        .map(|(tag, _)| tag.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColonyArgs;

    fn detect_args() -> DetectArgs {
        DetectArgs {
            files: vec![],
            colony: ColonyArgs {
                config: None,
                n_tubes: Some(2),
                ring: false,
                occupancy: None,
                min_reads: None,
                json: false,
            },
            tube_events: None,
            margin: Some(30.0),
            min_duration: None,
            no_tails: true,
            keep_conflicts: false,
            with_tracker: false,
        }
    }

    #[test]
    fn test_detector_overrides() {
        let blueprint = load_blueprint(&detect_args().colony).unwrap();
        let config = detector_config(&detect_args(), &blueprint);
        assert_eq!(config.margin, 30.0);
        assert!(!config.ignore_tails);
        assert!(config.remove_conflicts);
        assert_eq!(config.edge_split_duration, 1500.0);
    }

    #[test]
    fn test_min_reads_from_events() {
        let events = vec![
            Event::rfid(0, 0, "AA"),
            Event::rfid(1, 0, "AA"),
            Event::rfid(2, 1, "BB"),
            Event::rfid_invalid(3, 1, "BB"),
        ];
        let tags = reads_per_animal_at_least(&events, 2);
        assert_eq!(tags, vec![contracts::TagId::from("AA")]);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        use contracts::{BeamSide, BeamState, RfidEdge};
        let mut events = Vec::new();
        for tube in 0..2usize {
            let t0 = tube as f64 * 2000.0;
            for (dt, e) in [
                (0.0, Event::beam(0, tube, BeamSide::Left, BeamState::Broken)),
                (50.0, Event::rfid_edge(0, tube, RfidEdge::Rise)),
                (100.0, Event::rfid(0, tube, "AA")),
                (150.0, Event::beam(0, tube, BeamSide::Right, BeamState::Broken)),
                (200.0, Event::rfid_edge(0, tube, RfidEdge::Fall)),
                (300.0, Event::beam(0, tube, BeamSide::Left, BeamState::Unbroken)),
                (450.0, Event::beam(0, tube, BeamSide::Right, BeamState::Unbroken)),
            ] {
                events.push(e.with_world_timestamp(t0 + dt));
            }
        }
        let detector = TubeEventDetector::default();
        let (parallel, report) = detect_parallel(detector, &events).await.unwrap();
        assert_eq!(parallel, detector.detect(&events));
        assert_eq!(report.events, 2);
        assert_eq!(report.unknown(), 0);
    }
}
