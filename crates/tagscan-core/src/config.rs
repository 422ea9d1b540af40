//! Configuration management for Tagscan.
//!
//! Configuration is TOML. Settings are layered: built-in defaults, then the
//! user file in the platform config directory, then a project file
//! (`.tagscan.toml`) in the scanned tree. A later layer overrides an earlier
//! one key by key inside each section; the `patterns` and `weights` tables
//! are replaced as a whole so a project can narrow the tag set.

use crate::error::{Result, ScanError};
use crate::types::Weight;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the per-project configuration layer.
pub const PROJECT_CONFIG_FILE: &str = ".tagscan.toml";

/// Tables that a later layer replaces instead of merging into.
const REPLACED_TABLES: &[&str] = &["patterns", "weights"];

/// Main configuration structure for Tagscan.
///
/// ## Example Configuration File (tagscan.toml)
///
/// ```toml
/// [scan]
/// case_sensitive = false
/// encoding = "utf-8"
/// resolve_symlinks = true
///
/// [exclude]
/// files = ["*.min.js"]
/// folders = ["*/node_modules/*"]
///
/// [patterns]
/// TODO = 'TODO[\s]*?:+(?P<todo>.*)$'
/// HACK = 'HACK:\s*(?P<hack>.*)$'
///
/// [weights]
/// HACK = 1
/// TODO = 2
///
/// [render]
/// folder_depth = "auto"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to scan and how to read it
    pub scan: ScanConfig,

    /// Glob exclusions
    pub exclude: ExcludeConfig,

    /// Tag name to regex fragment
    pub patterns: BTreeMap<String, String>,

    /// Tag name (upper-case) to sort weight
    pub weights: BTreeMap<String, Weight>,

    /// Report layout
    pub render: RenderConfig,

    /// Result navigation
    pub navigation: NavigationConfig,

    /// Performance tuning
    pub performance: PerformanceConfig,

    /// General settings
    pub general: GeneralConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan: ScanConfig::default(),
            exclude: ExcludeConfig::default(),
            patterns: default_patterns(),
            weights: default_weights(),
            render: RenderConfig::default(),
            navigation: NavigationConfig::default(),
            performance: PerformanceConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

fn default_patterns() -> BTreeMap<String, String> {
    [
        ("TODO", r"TODO[\s]*?:+(?P<todo>.*)$"),
        ("FIXME", r"FIX ?ME[\s]*?:+(?P<fixme>.*)$"),
        ("NOTE", r"NOTE[\s]*?:+(?P<note>.*)$"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_weights() -> BTreeMap<String, Weight> {
    [("FIXME", 1), ("TODO", 2), ("NOTE", 3)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Weight::Integer(v)))
        .collect()
}

/// Scan behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Match tag patterns and excludes case-sensitively
    pub case_sensitive: bool,

    /// Encoding label used for files read from disk
    pub encoding: String,

    /// Canonicalize paths through symlinks before filtering
    pub resolve_symlinks: bool,

    /// Roots used when no paths are given explicitly
    pub include_paths: Vec<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            case_sensitive: false,
            encoding: "utf-8".to_string(),
            resolve_symlinks: true,
            include_paths: Vec::new(),
        }
    }
}

/// Exclusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeConfig {
    /// Globs matched against file paths
    pub files: Vec<String>,

    /// Globs matched against directory paths (with a trailing separator)
    /// and against every candidate file path
    pub folders: Vec<String>,
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        ExcludeConfig {
            files: vec!["*.min.js".to_string(), "*.min.css".to_string(), "*.map".to_string()],
            folders: vec![
                "*/.git/*".to_string(),
                "*/.hg/*".to_string(),
                "*/.svn/*".to_string(),
                "*/node_modules/*".to_string(),
            ],
        }
    }
}

/// How many parent folders to show next to a file name in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFolderDepth", into = "RawFolderDepth")]
pub enum FolderDepth {
    /// Show this many trailing parent folders. `0` shows the full path.
    Levels(usize),
    /// Show the path relative to the workspace folder containing the file
    Auto,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawFolderDepth {
    Levels(usize),
    Named(String),
}

impl TryFrom<RawFolderDepth> for FolderDepth {
    type Error = String;

    fn try_from(raw: RawFolderDepth) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawFolderDepth::Levels(n) => Ok(FolderDepth::Levels(n)),
            RawFolderDepth::Named(s) if s.eq_ignore_ascii_case("auto") => Ok(FolderDepth::Auto),
            RawFolderDepth::Named(s) => Err(format!(
                "folder_depth must be a number or \"auto\", got {:?}",
                s
            )),
        }
    }
}

impl From<FolderDepth> for RawFolderDepth {
    fn from(depth: FolderDepth) -> Self {
        match depth {
            FolderDepth::Levels(n) => RawFolderDepth::Levels(n),
            FolderDepth::Auto => RawFolderDepth::Named("auto".to_string()),
        }
    }
}

/// Report layout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Header template (`%d` date, `%t` seconds, `%c` file count)
    pub header_format: String,

    /// strftime format for `%d`
    pub header_date: String,

    /// Upper bound for the file label column width
    pub max_spaces: usize,

    /// Show parent folders next to file names
    pub include_folder: bool,

    /// Number of parent folders, or "auto"
    pub folder_depth: FolderDepth,

    /// Item template (`%i` index, `%f` file, `%l` line, `%s` note)
    pub item_format: String,
}

impl RenderConfig {
    pub const DEFAULT_HEADER_FORMAT: &'static str = "%d - %c files in %t secs";
    pub const DEFAULT_HEADER_DATE: &'static str = "%A %m/%d/%y at %I:%M%p";
    pub const DEFAULT_ITEM_FORMAT: &'static str = "%i. %f:%l";

    /// Header template, falling back to the default when left empty
    pub fn header_format(&self) -> &str {
        if self.header_format.is_empty() {
            Self::DEFAULT_HEADER_FORMAT
        } else {
            &self.header_format
        }
    }

    /// Date format, falling back to the default when left empty
    pub fn header_date(&self) -> &str {
        if self.header_date.is_empty() {
            Self::DEFAULT_HEADER_DATE
        } else {
            &self.header_date
        }
    }

    /// Item template, falling back to the default when left empty
    pub fn item_format(&self) -> &str {
        if self.item_format.is_empty() {
            Self::DEFAULT_ITEM_FORMAT
        } else {
            &self.item_format
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            header_format: Self::DEFAULT_HEADER_FORMAT.to_string(),
            header_date: Self::DEFAULT_HEADER_DATE.to_string(),
            max_spaces: 50,
            include_folder: false,
            folder_depth: FolderDepth::Levels(1),
            item_format: Self::DEFAULT_ITEM_FORMAT.to_string(),
        }
    }
}

/// Result navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Results skipped by a forward jump
    pub forward_skip: usize,

    /// Results skipped by a backward jump
    pub backward_skip: usize,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            forward_skip: 10,
            backward_skip: 10,
        }
    }
}

/// Performance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Extract files on the rayon pool inside the scan worker
    pub parallel_extract: bool,

    /// Minimum file count before extraction goes parallel
    pub parallel_threshold: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            parallel_extract: true,
            parallel_threshold: 64,
        }
    }
}

/// General configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load the user configuration from the default location.
    ///
    /// Returns default config if no config file exists.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_layered(&[path])
    }

    /// Load configuration from several files, later files taking precedence.
    ///
    /// Missing files are skipped.
    pub fn load_layered(paths: &[&Path]) -> Result<Self> {
        let mut merged = toml::Value::try_from(Config::default())
            .map_err(|e| ScanError::config(format!("Failed to serialize defaults: {}", e)))?;

        for path in paths {
            if !path.exists() {
                debug!(path = %path.display(), "Config file not found, skipping layer");
                continue;
            }

            info!(path = %path.display(), "Loading configuration");
            let contents = fs::read_to_string(path)?;
            let layer: toml::Value = toml::from_str(&contents).map_err(|e| {
                ScanError::config(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            merge_layer(&mut merged, layer, 0);
        }

        merged
            .try_into()
            .map_err(|e| ScanError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        info!(path = %path.display(), "Saving configuration");
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ScanError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "tagscan")
            .ok_or_else(|| ScanError::config("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("tagscan.toml"))
    }

    /// Path of the project layer for a scan root.
    pub fn project_config_path(root: &Path) -> PathBuf {
        root.join(PROJECT_CONFIG_FILE)
    }

    /// Weight configured for a tag, looked up by its upper-case name.
    pub fn weight_of(&self, tag: &str) -> Option<&Weight> {
        self.weights.get(&tag.to_uppercase())
    }
}

/// Merge `layer` into `base`. Nested tables merge key by key, except the
/// top-level tables listed in `REPLACED_TABLES`.
fn merge_layer(base: &mut toml::Value, layer: toml::Value, depth: usize) {
    match (base, layer) {
        (toml::Value::Table(base), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                let replace = depth == 0 && REPLACED_TABLES.contains(&key.as_str());
                match base.get_mut(&key) {
                    Some(existing) if !replace && existing.is_table() && value.is_table() => {
                        merge_layer(existing, value, depth + 1)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
