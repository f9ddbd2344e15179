//! `track` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use colony::{Colony, TracingDiagnostics};
use ingestion::clock_samples;
use tracing::{info, warn};

use crate::cli::TrackArgs;
use crate::commands::{load_blueprint, occupancy_path, read_segments, retain_animals, retain_chases};
use crate::output::{write_chases, write_occupancy};
use crate::stats::RunStats;

/// Execute the `track` command
pub fn run_track(args: &TrackArgs) -> Result<()> {
    let started = Instant::now();
    let blueprint = load_blueprint(&args.colony)?;
    let mut colony = Colony::from_blueprint(&blueprint).context("Invalid animal profile")?;
    for tag in &args.trace_tags {
        info!(tag = %tag, "Tracing tracker decisions");
        colony.attach_diagnostics(tag.as_str(), Box::new(TracingDiagnostics));
    }

    let (segments, ingestion) = read_segments(&args.files)?;
    let mut stats = RunStats {
        segments: segments.len(),
        ingestion,
        ..Default::default()
    };

    stats.clock_synced = colony.sync_clock(&clock_samples(&segments));
    if !stats.clock_synced {
        warn!("Clock not synced, world time is raw board ticks");
    }

    for segment in segments {
        colony.begin_segment();
        for mut event in segment.events {
            colony.process_event(&mut event);
        }
    }

    let animals = colony.animals_with_min_reads(blueprint.output.min_reads as u64);
    let mut occupancy = colony.get_occupancy(None);
    retain_animals(&mut occupancy, &animals);
    let occupancy = merger::merge_occupancies([occupancy], blueprint.merge.cull)
        .context("Occupancy merge failed")?;
    let mut chases = colony.chase_events();
    retain_chases(&mut chases, &animals);

    write_occupancy(&occupancy_path(&blueprint), &occupancy, &blueprint)?;
    let chase_path = args.chases.clone().or_else(|| blueprint.output.chases.clone());
    if let Some(path) = chase_path {
        write_chases(&path, &chases, &blueprint)?;
    }

    observability::record_occupancy_metrics(&occupancy);
    observability::record_chase_metrics(&chases);
    stats.outputs.update_occupancy(&occupancy);
    stats.outputs.update_chases(&chases);
    stats.colony = Some(colony.summary());
    stats.duration = started.elapsed();

    info!(
        animals = animals.len(),
        occupancy = occupancy.len(),
        chases = chases.len(),
        duration_secs = stats.duration.as_secs_f64(),
        "Tracking completed"
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
