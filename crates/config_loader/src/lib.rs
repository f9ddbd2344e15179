//! # Config Loader
//!
//! Turns a colony description file into a checked [`ColonyBlueprint`].
//!
//! A file names the tube count and topology (`[colony]`), tunes the tube
//! event detector (`[detector]`) and the read-sequence path (`[sequence]`),
//! sets the merge policy (`[merge]`), lists known animals (`[[animals]]`)
//! and routes outputs (`[output]`). Only `[colony]` is required.
//!
//! Loading rejects, among others:
//! - a ring of fewer than three tubes (two tubes cannot close a ring)
//! - non-positive merge or chase thresholds
//! - a tag listed twice (tags compare case-insensitively)
//! - animal metadata using the keys `name`, `rfid` or `tag`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("colony.toml")).unwrap();
//! let layout = blueprint.colony.layout();
//! println!("{} tubes, {} cages", layout.n_tubes, layout.n_cages());
//! ```

mod parser;
mod validator;

pub use contracts::ColonyBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Loads, checks and writes back colony blueprints
pub struct ConfigLoader;

impl ConfigLoader {
    /// Read a `.toml` or `.json` colony file and check it
    pub fn load_from_path(path: &Path) -> Result<ColonyBlueprint, ContractError> {
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ConfigFormat::from_extension)
            .ok_or_else(|| {
                ContractError::config_parse(format!(
                    "{}: colony files must end in .toml or .json",
                    path.display()
                ))
            })?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Parse colony file content and check it
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<ColonyBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Check a blueprint assembled in code or patched by CLI overrides
    pub fn validate(blueprint: &ColonyBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Blueprint as TOML, defaults written out
    pub fn to_toml(blueprint: &ColonyBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Blueprint as JSON, defaults written out
    pub fn to_json(blueprint: &ColonyBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}
