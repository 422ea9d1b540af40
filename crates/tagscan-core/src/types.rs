//! Core data types for Tagscan.
//!
//! These are the values that flow out of a scan: individual findings, the
//! metrics describing the scan itself, and the per-tag sort weights used when
//! organizing results for display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Priority assigned to a finding whose note carries no `(N)` marker.
pub const DEFAULT_PRIORITY: u32 = 50;

/// A single annotation found in a file.
///
/// Findings are created once by the extractor and never modified. The `line`
/// is 1-based and refers to the content as it was read during the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// File the annotation was found in
    pub file: PathBuf,

    /// Tag name (the named capture group that matched)
    pub tag: String,

    /// Captured note text, possibly empty
    pub note: String,

    /// 1-based line number
    pub line: usize,

    /// Lower values sort first
    pub priority: u32,
}

impl Finding {
    /// `file:line` location string, as used to jump to a result
    pub fn location(&self) -> String {
        format!("{}:{}", self.file.display(), self.line)
    }
}

/// Measurements for one completed scan.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanMetrics {
    /// Wall-clock seconds, rounded to two decimals
    pub elapsed_secs: f64,

    /// Files for which extraction was attempted, successful or not
    pub files_scanned: u64,
}

impl ScanMetrics {
    /// Build metrics from a measured duration, rounding to hundredths.
    pub fn new(elapsed: Duration, files_scanned: u64) -> Self {
        ScanMetrics {
            elapsed_secs: (elapsed.as_secs_f64() * 100.0).round() / 100.0,
            files_scanned,
        }
    }
}

/// Everything a scan hands to its completion callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// All findings, in no particular order
    pub findings: Vec<Finding>,

    /// Timing and file count
    pub metrics: ScanMetrics,
}

/// A per-tag sort weight.
///
/// Weights may be written as strings or numbers in configuration. They are
/// always compared by their textual form, so `10` sorts before `9`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Weight {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Weight {
    /// The string used as the primary sort key
    pub fn sort_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weight::Integer(n) => write!(f, "{}", n),
            Weight::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
            Weight::Float(x) => write!(f, "{}", x),
            Weight::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Weight {
    fn from(n: i64) -> Self {
        Weight::Integer(n)
    }
}

impl From<&str> for Weight {
    fn from(s: &str) -> Self {
        Weight::Text(s.to_string())
    }
}
