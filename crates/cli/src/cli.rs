//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Colony Tracker - occupancy inference from tube RFID and beam-break logs
#[derive(Parser, Debug)]
#[command(
    name = "colony-tracker",
    author,
    version,
    about = "Colony RFID / beam-break occupancy tracker",
    long_about = "Reconstructs which cage every tagged animal occupied over time.\n\n\
                  Reads board log segments, synchronizes board clocks, and either \n\
                  tracks animals read by read (track), reconstructs tube passages \n\
                  from beam-break intervals (detect), or traces each animal's whole \n\
                  read sequence (sequence)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "COLONY_TRACKER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "COLONY_TRACKER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", global = true, env = "COLONY_TRACKER_METRICS_PORT")]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream events through the per-animal tracker
    Track(TrackArgs),

    /// Reconstruct tube passages from beam-break intervals
    Detect(DetectArgs),

    /// Trace each animal's read sequence; report multi-animal events
    Sequence(SequenceArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),
}

/// Colony settings shared by the analysis commands
#[derive(Args, Debug, Clone)]
pub struct ColonyArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "COLONY_TRACKER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of tubes (required without a config file)
    #[arg(long, env = "COLONY_TRACKER_N_TUBES")]
    pub n_tubes: Option<usize>,

    /// Ring topology: the last tube connects back to cage 0
    #[arg(long)]
    pub ring: bool,

    /// Occupancy CSV output ("-" = stdout)
    #[arg(short, long, env = "COLONY_TRACKER_OCCUPANCY")]
    pub occupancy: Option<PathBuf>,

    /// Drop animals with fewer valid reads from the outputs
    #[arg(long, env = "COLONY_TRACKER_MIN_READS")]
    pub min_reads: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `track` command
#[derive(Parser, Debug, Clone)]
pub struct TrackArgs {
    /// Log segment files (`%y%m%d_%H%M%S` names carry the capture start)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub colony: ColonyArgs,

    /// Chase CSV output
    #[arg(long, env = "COLONY_TRACKER_CHASES")]
    pub chases: Option<PathBuf>,

    /// Log tracker decisions for this tag at debug level (repeatable)
    #[arg(long = "trace-tag")]
    pub trace_tags: Vec<String>,
}

/// Arguments for the `detect` command
#[derive(Parser, Debug, Clone)]
pub struct DetectArgs {
    /// Log segment files (`%y%m%d_%H%M%S` names carry the capture start)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub colony: ColonyArgs,

    /// Tube event CSV output
    #[arg(long, env = "COLONY_TRACKER_TUBE_EVENTS")]
    pub tube_events: Option<PathBuf>,

    /// Interval overlap margin (ms)
    #[arg(long)]
    pub margin: Option<f64>,

    /// Minimum interval duration (ms)
    #[arg(long)]
    pub min_duration: Option<f64>,

    /// Skip the tail correction pass
    #[arg(long)]
    pub no_tails: bool,

    /// Keep repeated same-direction passages
    #[arg(long)]
    pub keep_conflicts: bool,

    /// Also run the streaming tracker and merge both occupancy sources
    #[arg(long)]
    pub with_tracker: bool,
}

/// Arguments for the `sequence` command
#[derive(Parser, Debug, Clone)]
pub struct SequenceArgs {
    /// Log segment files (`%y%m%d_%H%M%S` names carry the capture start)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub colony: ColonyArgs,

    /// Read merge threshold (ms); derived from the data when unset
    #[arg(long)]
    pub merge_threshold: Option<f64>,

    /// Multi-animal event CSV output
    #[arg(long, env = "COLONY_TRACKER_MULTI_ANIMAL_EVENTS")]
    pub events: Option<PathBuf>,

    /// Association count CSV output
    #[arg(long, env = "COLONY_TRACKER_ASSOCIATIONS")]
    pub associations: Option<PathBuf>,

    /// Chase CSV output, one row per chaser / chasee pair of an event
    #[arg(long, env = "COLONY_TRACKER_CHASES")]
    pub chases: Option<PathBuf>,

    /// Only report chases on this tube
    #[arg(long)]
    pub chase_tube: Option<usize>,

    /// Also run the streaming tracker and merge both occupancy sources
    #[arg(long)]
    pub with_tracker: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "colony.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
