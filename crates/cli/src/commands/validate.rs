//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ColonyBlueprint, Topology};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    n_tubes: usize,
    n_cages: usize,
    topology: Topology,
    merge_threshold_ms: f64,
    autotune: bool,
    animal_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let layout = blueprint.colony.layout();
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    n_tubes: layout.n_tubes,
                    n_cages: layout.n_cages(),
                    topology: layout.topology,
                    merge_threshold_ms: blueprint.colony.rfid_merge_threshold_ms,
                    autotune: blueprint.colony.autotune_merge_threshold,
                    animal_count: blueprint.animals.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal configuration issues
fn collect_warnings(blueprint: &ColonyBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.animals.is_empty() {
        warnings.push("No animals configured - outputs will use raw tag ids".to_string());
    }

    if let Some(multi) = blueprint.colony.multi_animal_event_threshold_ms {
        if multi > blueprint.colony.rfid_merge_threshold_ms {
            warnings.push(format!(
                "multi_animal_event_threshold_ms ({multi}) exceeds rfid_merge_threshold_ms ({})",
                blueprint.colony.rfid_merge_threshold_ms
            ));
        }
    }

    if blueprint.detector.margin > blueprint.detector.edge_split_duration {
        warnings.push("detector.margin exceeds edge_split_duration".to_string());
    }

    if !blueprint.merge.cull {
        warnings.push("merge.cull is off - duplicate stays are kept".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Layout: {} tubes, {} cages ({:?})",
                summary.n_tubes, summary.n_cages, summary.topology
            );
            println!(
                "  Merge threshold: {} ms (autotune: {})",
                summary.merge_threshold_ms, summary.autotune
            );
            println!("  Animals: {}", summary.animal_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
