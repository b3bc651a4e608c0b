//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one algorithm and print its result envelope
    Run {
        /// Algorithm id (see `sigrun algorithms`)
        #[arg(long, value_name = "ID")]
        algorithm: String,

        /// Input as JSON (example: --input-json='{"data":[1,2,3],"sampleRate":100}')
        #[arg(long, value_name = "JSON", conflicts_with = "input_file")]
        input_json: Option<String>,

        /// Read the input JSON from a file
        #[arg(long, value_name = "PATH", required_unless_present = "input_json")]
        input_file: Option<PathBuf>,

        /// Algorithm configuration overrides as a JSON object
        #[arg(long, value_name = "JSON")]
        config_json: Option<String>,

        /// Force a fresh computation, ignoring cached results
        #[arg(long)]
        manual: bool,

        /// Timeout in seconds (defaults to the engine setting)
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,

        /// Equipment the signal belongs to
        #[arg(long, value_name = "ID")]
        equipment: Option<String>,

        /// Compute everything in this process instead of starting workers
        #[arg(long)]
        no_workers: bool,
    },

    /// List registered algorithms
    Algorithms {
        /// Only algorithms of this category (spectral, filtering, statistical, ...)
        #[arg(long, value_name = "CATEGORY")]
        category: Option<String>,

        /// Only algorithms carrying this tag
        #[arg(long, value_name = "TAG")]
        tag: Option<String>,

        /// Only algorithms applicable to this device type
        #[arg(long, value_name = "TYPE")]
        device_type: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print or write a sample configuration file
    Sample {
        /// Output file path; stdout when omitted
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Show the configuration in use after file and environment overrides
    Show {
        /// Output format: yaml, json
        #[arg(long, value_name = "FORMAT", default_value = "yaml")]
        format: String,
    },
}
