//! CSV outputs: occupancy, chases, tube events, multi-animal events and
//! association counts.
//!
//! Animal columns carry display names from the blueprint.

use std::io;
use std::path::Path;

use contracts::{ChaseRecord, ColonyBlueprint, OccupancyRecord, TubeEvent};
use sequences::{AssociationCounts, MultiAnimalEvent};
use serde::Serialize;
use tracing::info;

use crate::error::CliError;

/// Path that selects stdout
pub const STDOUT: &str = "-";

#[derive(Debug, Serialize)]
struct OccupancyRow<'a> {
    enter_time: f64,
    exit_time: f64,
    cage_id: usize,
    animal_id: String,
    confidence: f64,
    origin: &'a str,
}

#[derive(Debug, Serialize)]
struct ChaseRow {
    time: f64,
    tube_id: usize,
    chaser_animal_id: String,
    chasee_animal_id: String,
}

#[derive(Debug, Serialize)]
struct TubeEventRow<'a> {
    tube: usize,
    start: f64,
    end: f64,
    direction: &'a str,
    level: &'a str,
    animals: String,
}

#[derive(Debug, Serialize)]
struct MultiAnimalEventRow {
    tube: usize,
    start: f64,
    end: f64,
    reads: usize,
    animals: String,
}

#[derive(Debug, Serialize)]
struct AssociationRow {
    first_animal_id: String,
    second_animal_id: String,
    count: u32,
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, CliError> {
    let to_stdout = path.as_os_str() == STDOUT;
    let mut writer: csv::Writer<Box<dyn io::Write>> = if to_stdout {
        csv::Writer::from_writer(Box::new(io::stdout().lock()))
    } else {
        let file = std::fs::File::create(path)
            .map_err(|e| CliError::output(path, csv::Error::from(e)))?;
        csv::Writer::from_writer(Box::new(io::BufWriter::new(file)))
    };

    let mut count = 0;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| CliError::output(path, e))?;
        count += 1;
    }
    writer
        .flush()
        .map_err(|e| CliError::output(path, csv::Error::from(e)))?;

    if !to_stdout {
        info!(path = %path.display(), rows = count, "output written");
    }
    Ok(count)
}

/// `enter_time,exit_time,cage_id,animal_id,confidence,origin`
pub fn write_occupancy(
    path: &Path,
    records: &[OccupancyRecord],
    blueprint: &ColonyBlueprint,
) -> Result<usize, CliError> {
    write_rows(
        path,
        records.iter().map(|r| OccupancyRow {
            enter_time: r.enter_time,
            exit_time: r.exit_time,
            cage_id: r.cage,
            animal_id: blueprint.display_name(&r.animal),
            confidence: r.confidence,
            origin: r.origin.as_str(),
        }),
    )
}

/// `time,tube_id,chaser_animal_id,chasee_animal_id`
pub fn write_chases(
    path: &Path,
    chases: &[ChaseRecord],
    blueprint: &ColonyBlueprint,
) -> Result<usize, CliError> {
    write_rows(
        path,
        chases.iter().map(|c| ChaseRow {
            time: c.time,
            tube_id: c.tube,
            chaser_animal_id: blueprint.display_name(&c.chaser),
            chasee_animal_id: blueprint.display_name(&c.chasee),
        }),
    )
}

/// `tube,start,end,direction,level,animals`
pub fn write_tube_events(
    path: &Path,
    events: &[TubeEvent],
    blueprint: &ColonyBlueprint,
) -> Result<usize, CliError> {
    write_rows(
        path,
        events.iter().map(|e| TubeEventRow {
            tube: e.tube,
            start: e.start,
            end: e.end,
            direction: e.direction.as_str(),
            level: e.level.map(|l| l.as_str()).unwrap_or(""),
            animals: e
                .animals
                .iter()
                .map(|a| blueprint.display_name(a))
                .collect::<Vec<_>>()
                .join(" "),
        }),
    )
}

/// `tube,start,end,reads,animals`, animals in read order
pub fn write_multi_animal_events(
    path: &Path,
    events: &[MultiAnimalEvent],
    blueprint: &ColonyBlueprint,
) -> Result<usize, CliError> {
    write_rows(
        path,
        events.iter().map(|e| MultiAnimalEventRow {
            tube: e.tube,
            start: e.start(),
            end: e.end(),
            reads: e.times.len(),
            animals: e
                .animals
                .iter()
                .map(|a| blueprint.display_name(a))
                .collect::<Vec<_>>()
                .join(" "),
        }),
    )
}

/// `first_animal_id,second_animal_id,count`
pub fn write_associations(
    path: &Path,
    associations: &AssociationCounts,
    blueprint: &ColonyBlueprint,
) -> Result<usize, CliError> {
    write_rows(
        path,
        associations.iter().map(|(a, b, count)| AssociationRow {
            first_animal_id: blueprint.display_name(a),
            second_animal_id: blueprint.display_name(b),
            count,
        }),
    )
}
