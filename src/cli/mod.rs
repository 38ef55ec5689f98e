//! CLI definitions for config-aggregator
//!
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Json,
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

/// Load layered configuration and print the merged result
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding one sub-directory per tier
    #[arg(short, long, default_value = "./config", global = true)]
    pub config_dir: PathBuf,

    /// Environment tier to load (overrides CONFIG__APP_ENV)
    #[arg(short, long, global = true)]
    pub env: Option<String>,

    /// Environment variable prefix
    #[arg(short, long, default_value = "CONFIG", global = true)]
    pub prefix: String,

    /// Dotenv file layered under the process environment
    #[arg(long, default_value = ".env", global = true)]
    pub env_file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Json, global = true)]
    pub format: FormatArg,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the whole merged tree (default if no subcommand given)
    List,

    /// Print the value at a dotted path
    Get {
        /// Dotted key, e.g. `app.auth.client_id`
        key: String,
    },

    /// Print the loaded environment tier
    Env,
}
