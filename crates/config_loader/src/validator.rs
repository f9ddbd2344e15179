//! Configuration validation
//!
//! Rules:
//! - n_tubes >= 1, a ring needs n_tubes >= 3
//! - thresholds > 0 (sequence thresholds too, when set)
//! - detector margin / min_duration >= 0
//! - animal tags unique and non-empty, names non-empty
//! - animal metadata never uses a reserved key

use std::collections::HashSet;

use contracts::{ColonyBlueprint, ContractError, Topology};

/// Validate a ColonyBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ColonyBlueprint) -> Result<(), ContractError> {
    validate_topology(blueprint)?;
    validate_thresholds(blueprint)?;
    validate_detector(blueprint)?;
    validate_sequence(blueprint)?;
    validate_animals(blueprint)?;
    Ok(())
}

fn validate_topology(blueprint: &ColonyBlueprint) -> Result<(), ContractError> {
    let colony = &blueprint.colony;
    if colony.n_tubes == 0 {
        return Err(ContractError::config_validation(
            "colony.n_tubes",
            "a colony needs at least one tube",
        ));
    }
    if colony.topology == Topology::Ring && colony.n_tubes < 3 {
        return Err(ContractError::config_validation(
            "colony.n_tubes",
            format!("a ring needs at least 3 tubes, got {}", colony.n_tubes),
        ));
    }
    Ok(())
}

fn validate_thresholds(blueprint: &ColonyBlueprint) -> Result<(), ContractError> {
    let colony = &blueprint.colony;
    if colony.rfid_merge_threshold_ms <= 0.0 {
        return Err(ContractError::config_validation(
            "colony.rfid_merge_threshold_ms",
            format!(
                "rfid_merge_threshold_ms must be > 0, got {}",
                colony.rfid_merge_threshold_ms
            ),
        ));
    }
    if let Some(t) = colony.multi_animal_event_threshold_ms {
        if t <= 0.0 {
            return Err(ContractError::config_validation(
                "colony.multi_animal_event_threshold_ms",
                format!("multi_animal_event_threshold_ms must be > 0, got {t}"),
            ));
        }
    }
    if colony.autotune_merge_threshold && colony.autotune_min_samples == 0 {
        return Err(ContractError::config_validation(
            "colony.autotune_min_samples",
            "autotune_min_samples must be >= 1 when autotuning",
        ));
    }
    Ok(())
}

fn validate_detector(blueprint: &ColonyBlueprint) -> Result<(), ContractError> {
    let d = &blueprint.detector;
    if d.margin < 0.0 {
        return Err(ContractError::config_validation(
            "detector.margin",
            format!("margin must be >= 0, got {}", d.margin),
        ));
    }
    if d.min_duration < 0.0 {
        return Err(ContractError::config_validation(
            "detector.min_duration",
            format!("min_duration must be >= 0, got {}", d.min_duration),
        ));
    }
    if d.edge_split_duration <= 0.0 {
        return Err(ContractError::config_validation(
            "detector.edge_split_duration",
            format!(
                "edge_split_duration must be > 0, got {}",
                d.edge_split_duration
            ),
        ));
    }
    if d.read_cluster_gap <= 0.0 {
        return Err(ContractError::config_validation(
            "detector.read_cluster_gap",
            format!("read_cluster_gap must be > 0, got {}", d.read_cluster_gap),
        ));
    }
    Ok(())
}

fn validate_sequence(blueprint: &ColonyBlueprint) -> Result<(), ContractError> {
    let s = &blueprint.sequence;
    if let Some(t) = s.merge_threshold_ms {
        if t <= 0.0 {
            return Err(ContractError::config_validation(
                "sequence.merge_threshold_ms",
                format!("merge_threshold_ms must be > 0, got {t}"),
            ));
        }
    }
    if let Some(t) = s.event_gap_ms {
        if t <= 0.0 {
            return Err(ContractError::config_validation(
                "sequence.event_gap_ms",
                format!("event_gap_ms must be > 0, got {t}"),
            ));
        }
    }
    Ok(())
}

fn validate_animals(blueprint: &ColonyBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, animal) in blueprint.animals.iter().enumerate() {
        if animal.tag.is_empty() {
            return Err(ContractError::config_validation(
                format!("animals[{idx}].tag"),
                "animal tag cannot be empty",
            ));
        }
        if animal.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("animals[tag={}].name", animal.tag),
                "animal name cannot be empty",
            ));
        }
        if !seen.insert(&animal.tag) {
            return Err(ContractError::config_validation(
                format!("animals[tag={}]", animal.tag),
                "duplicate animal tag",
            ));
        }
        animal.check_meta()?;
    }
    Ok(())
}
