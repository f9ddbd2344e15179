//! `sequence` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use colony::Colony;
use contracts::{ChaseRecord, ColonyBlueprint, TubeId};
use sequences::{analyze, MultiAnimalEvent, SequenceSettings};
use tracing::info;

use crate::cli::SequenceArgs;
use crate::commands::{
    load_blueprint, occupancy_path, read_segments, retain_animals, retain_chases, StampedEvents,
};
use crate::output::{write_associations, write_chases, write_multi_animal_events, write_occupancy};
use crate::stats::RunStats;

fn sequence_settings(args: &SequenceArgs, blueprint: &ColonyBlueprint) -> SequenceSettings {
    let mut settings = SequenceSettings::from_blueprint(blueprint);
    if let Some(threshold) = args.merge_threshold {
        settings.merge_threshold = Some(threshold);
    }
    settings
}

/// Chases of every event, optionally on one tube only
fn event_chases(events: &[MultiAnimalEvent], tube: Option<TubeId>) -> Vec<ChaseRecord> {
    events
        .iter()
        .filter(|e| tube.map_or(true, |t| e.tube == t))
        .flat_map(MultiAnimalEvent::chases)
        .collect()
}

/// Execute the `sequence` command
pub fn run_sequence(args: &SequenceArgs) -> Result<()> {
    let started = Instant::now();
    let blueprint = load_blueprint(&args.colony)?;
    let layout = blueprint.colony.layout();
    let settings = sequence_settings(args, &blueprint);

    let (segments, ingestion) = read_segments(&args.files)?;
    let mut stats = RunStats {
        segments: segments.len(),
        ingestion,
        ..Default::default()
    };

    let mut stamped = StampedEvents::stamp(segments, layout.n_tubes);
    stats.clock_synced = stamped.clock_synced;

    let report = analyze(&stamped.events, &layout, &settings);
    let mut occupancy = report.occupancy.clone();
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

    let mut chases = event_chases(&report.multi_animal_events, args.chase_tube);
    if blueprint.output.min_reads > 0 {
        let animals: Vec<_> = match colony {
            Some(ref tracker) => tracker.animals_with_min_reads(blueprint.output.min_reads as u64),
            None => sequences::reads_by_animal(&stamped.events)
                .into_iter()
                .filter(|(_, reads)| reads.len() >= blueprint.output.min_reads)
                .map(|(tag, _)| tag)
                .collect(),
        };
        retain_animals(&mut occupancy, &animals);
        retain_chases(&mut chases, &animals);
    }
    let occupancy = merger::merge_occupancies([occupancy], blueprint.merge.cull)
        .context("Occupancy merge failed")?;

    write_occupancy(&occupancy_path(&blueprint), &occupancy, &blueprint)?;
    if let Some(ref path) = args.events {
        write_multi_animal_events(path, &report.multi_animal_events, &blueprint)?;
    }
    if let Some(ref path) = args.associations {
        write_associations(path, &report.associations(), &blueprint)?;
    }
    let chase_path = args.chases.clone().or_else(|| blueprint.output.chases.clone());
    if let Some(path) = chase_path {
        write_chases(&path, &chases, &blueprint)?;
    }

    observability::record_occupancy_metrics(&occupancy);
    observability::record_chase_metrics(&chases);
    stats.outputs.update_occupancy(&occupancy);
    stats.outputs.update_chases(&chases);
    stats.colony = colony.map(|c| c.summary());
    stats.duration = started.elapsed();

    let unreliable = report
        .reliability
        .values()
        .filter(|r| r.is_some_and(|r| r < 1.0))
        .count();
    info!(
        animals = report.reliability.len(),
        skipped = report.skipped_animals,
        unreliable,
        merge_threshold = report.merge_threshold,
        occupancy = occupancy.len(),
        chases = chases.len(),
        duration_secs = stats.duration.as_secs_f64(),
        "Sequence tracing completed"
    );
    if args.colony.json {
        let json = serde_json::to_string_pretty(&stats.report())
            .context("Failed to serialize run report")?;
        eprintln!("{}", json);
    } else {
        stats.print_summary();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ColonyArgs;

    fn sequence_args() -> SequenceArgs {
        SequenceArgs {
            files: vec![],
            colony: ColonyArgs {
                config: None,
                n_tubes: Some(3),
                ring: false,
                occupancy: None,
                min_reads: None,
                json: false,
            },
            merge_threshold: Some(120.0),
            events: None,
            associations: None,
            chases: None,
            chase_tube: None,
            with_tracker: false,
        }
    }

    #[test]
    fn test_merge_threshold_override() {
        let args = sequence_args();
        let blueprint = load_blueprint(&args.colony).unwrap();
        let settings = sequence_settings(&args, &blueprint);
        assert_eq!(settings.merge_threshold, Some(120.0));
        assert_eq!(settings.event_gap, 800.0);
    }

    #[test]
    fn test_event_chases_tube_filter() {
        let events = vec![
            MultiAnimalEvent {
                tube: 0,
                times: vec![0.0, 10.0],
                animals: vec!["AA".into(), "BB".into()],
            },
            MultiAnimalEvent {
                tube: 2,
                times: vec![50.0, 60.0, 70.0],
                animals: vec!["BB".into(), "AA".into(), "CC".into()],
            },
        ];
        assert_eq!(event_chases(&events, None).len(), 3);
        let on_two = event_chases(&events, Some(2));
        assert_eq!(on_two.len(), 2);
        assert!(on_two.iter().all(|c| c.chaser.as_str() == "CC" && c.time == 70.0));
    }
}
