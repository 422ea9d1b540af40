//! Error types for Tagscan core operations.
//!
//! Errors fall in two groups. Configuration errors (bad tag regexes, bad
//! exclude globs, unknown encodings, unreadable config files) are raised
//! before any file is touched and abort the scan. Per-file errors (read and
//! decode failures) are swallowed by the scan coordinator: the file is simply
//! absent from the results.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ScanError
pub type Result<T> = std::result::Result<T, ScanError>;

/// Core error types for Tagscan operations.
#[derive(Error, Debug)]
pub enum ScanError {
    // === Configuration Errors ===
    /// A tag pattern fragment is not a valid regular expression
    #[error("invalid tag pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// An exclude glob could not be parsed
    #[error("invalid exclude glob {pattern}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    /// The configured text encoding is not a known label
    #[error("unknown encoding: {label}")]
    UnknownEncoding { label: String },

    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === Per-file Errors ===
    /// The file could not be opened or read
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file contents are not valid under the configured encoding
    #[error("cannot decode {} as {encoding}", path.display())]
    Decode { path: PathBuf, encoding: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Internal Errors ===
    /// Internal error that should not happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Returns true if this error must stop a scan before it starts
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidPattern { .. }
                | ScanError::InvalidGlob { .. }
                | ScanError::UnknownEncoding { .. }
                | ScanError::ConfigError { .. }
        )
    }

    /// Returns true if this error only concerns a single file
    pub fn is_per_file(&self) -> bool {
        matches!(self, ScanError::Read { .. } | ScanError::Decode { .. })
    }

    /// Create a configuration error
    pub fn config(reason: impl Into<String>) -> Self {
        ScanError::ConfigError {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let err = ScanError::InvalidPattern {
            pattern: "(".to_string(),
            reason: "unclosed group".to_string(),
        };
        assert!(err.is_config_error());
        assert!(!err.is_per_file());

        let err = ScanError::Decode {
            path: PathBuf::from("/tmp/a.bin"),
            encoding: "UTF-8".to_string(),
        };
        assert!(err.is_per_file());
        assert!(!err.is_config_error());

        let err = ScanError::Read {
            path: PathBuf::from("/tmp/missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_per_file());
    }

    #[test]
    fn test_display() {
        let err = ScanError::UnknownEncoding {
            label: "klingon".to_string(),
        };
        assert_eq!(err.to_string(), "unknown encoding: klingon");
    }
}
