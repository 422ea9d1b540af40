//! # Tagscan Core Library
//!
//! This crate finds annotation comments such as `TODO:` and `FIXME:` across a
//! set of files, and turns the results into an ordered, grouped report. It has
//! no user interface of its own; the editor or terminal front end supplies the
//! workspace folders and any unsaved buffer content.
//!
//! ## Architecture
//!
//! - **Pattern** (`pattern`): Compiles exclude globs and tag regexes
//! - **Enumerate** (`enumerate`): Walks roots and yields each file once
//! - **Source** (`source`): Reads lines from open buffers or disk
//! - **Extract** (`extract`): Turns lines into findings
//! - **Scan** (`scan`): Runs a scan on a worker thread with progress
//! - **Organize** (`organize`): Sorts and groups findings by tag
//! - **Report** (`report`), **Navigate** (`navigate`): Presentation helpers
//! - **Config** (`config`): Layered configuration
//!
//! ## Example
//!
//! ```rust,ignore
//! use tagscan_core::{organize, scan, Config, Renderer, ScanRequest};
//!
//! let config = Config::load()?;
//! let request = ScanRequest::new(vec!["./src".into()], Vec::new(), config.clone());
//! let outcome = scan::run(request, None)?;
//!
//! let groups = organize(outcome.findings, &config.weights);
//! let report = Renderer::new(config.render, Vec::new()).render(&groups, &outcome.metrics);
//! print!("{}", report.to_text());
//! ```

pub mod config;
pub mod enumerate;
pub mod error;
pub mod extract;
pub mod navigate;
pub mod organize;
pub mod pattern;
pub mod report;
pub mod scan;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, ScanError};
pub use navigate::{Cursor, Move};
pub use organize::{organize, TagGroup};
pub use report::{Renderer, Report};
pub use scan::{
    ChannelProgress, LoggingProgress, ScanEvent, ScanHandle, ScanProgress, ScanRequest,
};
pub use source::{OpenBuffers, StaticWorkspace, Workspace};
pub use types::{Finding, ScanMetrics, ScanOutcome, Weight};
