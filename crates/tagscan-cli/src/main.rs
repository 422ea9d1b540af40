//! # Tagscan CLI
//!
//! Command-line interface for the Tagscan annotation scanner.
//!
//! ## Commands
//!
//! - `tagscan scan [PATHS]` - Scan and print a grouped report
//! - `tagscan review [PATHS]` - Scan and browse results interactively
//! - `tagscan config` - Show or create the configuration file
//!
//! ## Example Usage
//!
//! ```bash
//! # Report every annotation under the current directory
//! tagscan scan
//!
//! # Scan one file and emit JSON
//! tagscan scan --current-file src/lib.rs --output json
//!
//! # Scan an unsaved editor buffer piped on stdin
//! cat draft.rs | tagscan scan --buffer src/draft.rs --open-files-only
//! ```

mod app;
mod commands;
mod tui;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tagscan - Find TODO, FIXME and friends
#[derive(Parser)]
#[command(name = "tagscan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan files and print the report
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Scan files and browse the results
    #[command(alias = "r")]
    Review {
        #[command(flatten)]
        scan: ScanArgs,
    },

    /// Show the configuration file location and contents
    Config {
        /// Write a default configuration file if none exists
        #[arg(long)]
        init: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

/// What to scan and how.
#[derive(Args, Clone, Debug, Default)]
pub struct ScanArgs {
    /// Directories to walk or files to scan (default: include_paths, else the current directory)
    pub paths: Vec<PathBuf>,

    /// Additional file to scan (can be used multiple times)
    #[arg(short = 'f', long = "file")]
    pub files: Vec<PathBuf>,

    /// Scan only this file
    #[arg(long, conflicts_with_all = ["open_files_only"])]
    pub current_file: Option<PathBuf>,

    /// Treat stdin as the unsaved content of this path
    #[arg(long, value_name = "PATH")]
    pub buffer: Option<PathBuf>,

    /// Also scan open buffers
    #[arg(long)]
    pub open_files: bool,

    /// Scan open buffers only
    #[arg(long)]
    pub open_files_only: bool,

    /// Match tags and exclude globs case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,

    /// Encoding used to read files (e.g. utf-8, latin1)
    #[arg(long)]
    pub encoding: Option<String>,

    /// Do not resolve symlinks when de-duplicating files
    #[arg(long)]
    pub no_resolve_symlinks: bool,

    /// Additional file glob to exclude (can be used multiple times)
    #[arg(long)]
    pub exclude_file: Vec<String>,

    /// Additional folder glob to exclude (can be used multiple times)
    #[arg(long)]
    pub exclude_folder: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Filter directive for the stderr log layer.
///
/// The review screen owns the terminal, so unless asked for with `-v` only
/// warnings and errors are logged while it runs.
fn log_level(quiet: bool, verbose: u8, configured: &str, interactive: bool) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose {
        0 if interactive => match configured.trim().to_ascii_lowercase().as_str() {
            level @ ("error" | "off") => level.to_string(),
            _ => "warn".to_string(),
        },
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration, with the project layer from the first scanned path
    let roots: &[PathBuf] = match &cli.command {
        Commands::Scan { scan, .. } | Commands::Review { scan } => &scan.paths,
        Commands::Config { .. } => &[],
    };
    let config = app::load_config(cli.config.as_deref(), roots)?;

    // Setup logging
    let interactive = matches!(cli.command, Commands::Review { .. });
    let log_level = log_level(
        cli.quiet,
        cli.verbose,
        &config.general.log_level,
        interactive,
    );

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .init();

    // Execute command
    match cli.command {
        Commands::Scan { scan, output } => commands::scan::run(config, scan, output, cli.quiet),
        Commands::Review { scan } => tui::run(config, scan),
        Commands::Config { init, show } => commands::config::run(config, cli.config, init, show),
    }
}
