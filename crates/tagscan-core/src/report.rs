//! Plain-text report rendering.
//!
//! A report is a header line followed by one section per tag group:
//!
//! ```text
//! // Friday 10/17/26 at 09:12AM - 42 files in 0.08 secs
//!
//! ## FIXME (1)
//! 1. parser.rs:88   handle escaped quotes
//!
//! ## TODO (2)
//! 1. lib.rs:10      (1) split this module
//! 2. main.rs:3      wire up logging
//! ```
//!
//! Templates use `%x` placeholders. Substitution is a single left-to-right
//! pass, so text produced by a placeholder is never substituted again.

use crate::config::{FolderDepth, RenderConfig};
use crate::organize::TagGroup;
use crate::types::{Finding, ScanMetrics};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Replace `%x` placeholders in one pass. Unknown placeholders are kept.
pub fn substitute(template: &str, values: &[(char, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            if let Some(&next) = chars.peek() {
                if let Some((_, value)) = values.iter().find(|(key, _)| *key == next) {
                    out.push_str(value);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Seconds as shown in the header: two decimals at most, at least one.
fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{:.1}", secs)
    } else {
        secs.to_string()
    }
}

/// A rendered report with a map from line index back to its finding.
#[derive(Debug, Clone, Default)]
pub struct Report {
    lines: Vec<String>,
    entries: BTreeMap<usize, Finding>,
}

impl Report {
    /// Every rendered line, without terminators
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The finding rendered on line `index`, if that line is a result
    pub fn finding_at(&self, index: usize) -> Option<&Finding> {
        self.entries.get(&index)
    }

    /// Line indexes of results, in display order
    pub fn result_lines(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    /// Findings in display order
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.entries.values()
    }

    /// Number of results
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The whole report as text, one trailing newline per line
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Renders organized results using the `[render]` settings.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RenderConfig,
    folders: Vec<PathBuf>,
}

impl Renderer {
    /// `folders` are the workspace folders used for `folder_depth = "auto"`.
    pub fn new(config: RenderConfig, folders: Vec<PathBuf>) -> Self {
        Renderer { config, folders }
    }

    /// Render with the current local time in the header.
    pub fn render(&self, groups: &[TagGroup], metrics: &ScanMetrics) -> Report {
        self.render_at(groups, metrics, Local::now())
    }

    /// Render with an explicit header time.
    pub fn render_at(
        &self,
        groups: &[TagGroup],
        metrics: &ScanMetrics,
        now: DateTime<Local>,
    ) -> Report {
        let mut report = Report::default();
        report.lines.push(self.header(metrics, now));

        let width = self.label_width(groups);
        let item_format = self.config.item_format();
        let inline_note = item_format.contains("%s");

        for group in groups {
            let count = group.len().to_string();
            let tag = group.tag.to_uppercase();
            report.lines.push(String::new());
            report
                .lines
                .push(substitute("## %t (%n)", &[('t', tag.as_str()), ('n', count.as_str())]));

            for (idx, finding) in group.findings.iter().enumerate() {
                let index = (idx + 1).to_string();
                let line = finding.line.to_string();
                let label = self.file_label(&finding.file);
                let mut text = substitute(
                    item_format,
                    &[
                        ('i', index.as_str()),
                        ('f', label.as_str()),
                        ('l', line.as_str()),
                        ('s', finding.note.as_str()),
                    ],
                );

                if !inline_note {
                    let pad = width.saturating_sub(text.chars().count()).max(1);
                    text.extend(std::iter::repeat(' ').take(pad));
                    text.push_str(&finding.note);
                }

                report.entries.insert(report.lines.len(), finding.clone());
                report.lines.push(text);
            }
        }

        report
    }

    fn header(&self, metrics: &ScanMetrics, now: DateTime<Local>) -> String {
        let date = format_date(now, self.config.header_date());
        let secs = format_secs(metrics.elapsed_secs);
        let files = metrics.files_scanned.to_string();
        let body = substitute(
            self.config.header_format(),
            &[('d', date.as_str()), ('t', secs.as_str()), ('c', files.as_str())],
        );
        format!("// {}", body)
    }

    /// Width of the item column: longest `label:line`, capped, plus room for
    /// the index.
    fn label_width(&self, groups: &[TagGroup]) -> usize {
        let longest = groups
            .iter()
            .flat_map(|g| g.findings.iter())
            .map(|f| format!("{}:{}", self.file_label(&f.file), f.line).chars().count())
            .max()
            .unwrap_or(0);
        longest.min(self.config.max_spaces) + 6
    }

    /// How a file is named in the report.
    pub fn file_label(&self, file: &Path) -> String {
        if !self.config.include_folder {
            return file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.to_string_lossy().into_owned());
        }

        match self.config.folder_depth {
            FolderDepth::Auto => {
                let relative = self
                    .folders
                    .iter()
                    .find_map(|folder| file.strip_prefix(folder).ok())
                    .unwrap_or(file);
                relative.to_string_lossy().replace('\\', "/")
            }
            FolderDepth::Levels(depth) => {
                let text = file.to_string_lossy().replace('\\', "/");
                let (dir, name) = match text.rfind('/') {
                    Some(split) if depth > 0 => (&text[..split], &text[split + 1..]),
                    _ => return text,
                };
                if dir.is_empty() {
                    return name.to_string();
                }
                let parts: Vec<&str> = dir.split('/').collect();
                let start = parts.len().saturating_sub(depth);
                format!("{}/{}", parts[start..].join("/"), name)
            }
        }
    }
}

fn format_date(now: DateTime<Local>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", now.format(format)).is_err() {
        out.clear();
        let _ = write!(out, "{}", now.format(RenderConfig::DEFAULT_HEADER_DATE));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn finding(file: &str, tag: &str, line: usize, note: &str) -> Finding {
        Finding {
            file: PathBuf::from(file),
            tag: tag.to_string(),
            note: note.to_string(),
            line,
            priority: 50,
        }
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 9, 5, 0).unwrap()
    }

    fn groups() -> Vec<TagGroup> {
        vec![
            TagGroup {
                tag: "fixme".to_string(),
                findings: vec![finding("/work/src/parser.rs", "fixme", 88, "quotes")],
            },
            TagGroup {
                tag: "TODO".to_string(),
                findings: vec![
                    finding("/work/src/lib.rs", "TODO", 10, "(1) split"),
                    finding("/work/main.rs", "TODO", 3, "logging"),
                ],
            },
        ]
    }

    #[test]
    fn test_substitute_single_pass() {
        assert_eq!(
            substitute("%a and %b", &[('a', "%b"), ('b', "x")]),
            "%b and x"
        );
        assert_eq!(substitute("100%", &[('a', "x")]), "100%");
        assert_eq!(substitute("%z%a", &[('a', "1")]), "%z1");
    }

    #[test]
    fn test_layout() {
        let metrics = ScanMetrics {
            elapsed_secs: 0.08,
            files_scanned: 42,
        };
        let renderer = Renderer::new(RenderConfig::default(), Vec::new());
        let report = renderer.render_at(&groups(), &metrics, fixed_time());

        // longest label "parser.rs:88" is 12 chars, so items pad to 18 columns
        assert_eq!(
            report.lines(),
            [
                "// Friday 10/16/26 at 09:05AM - 42 files in 0.08 secs",
                "",
                "## FIXME (1)",
                "1. parser.rs:88   quotes",
                "",
                "## TODO (2)",
                "1. lib.rs:10      (1) split",
                "2. main.rs:3      logging",
            ]
        );
        assert_eq!(report.result_lines(), vec![3, 6, 7]);
        assert_eq!(report.finding_at(6).unwrap().location(), "/work/src/lib.rs:10");
        assert!(report.finding_at(5).is_none());
        assert!(report.to_text().ends_with("logging\n"));
    }

    #[test]
    fn test_padding_is_capped_but_never_zero() {
        let mut config = RenderConfig::default();
        config.max_spaces = 4;
        let renderer = Renderer::new(config, Vec::new());
        let report = renderer.render_at(&groups(), &ScanMetrics::default(), fixed_time());
        assert_eq!(report.lines()[3], "1. parser.rs:88 quotes");
    }

    #[test]
    fn test_header_template() {
        let mut config = RenderConfig::default();
        config.header_format = "%c files, %t s (%x)".to_string();
        let renderer = Renderer::new(config, Vec::new());
        let metrics = ScanMetrics {
            elapsed_secs: 2.0,
            files_scanned: 7,
        };
        let report = renderer.render_at(&[], &metrics, fixed_time());
        assert_eq!(report.lines(), ["// 7 files, 2.0 s (%x)"]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_empty_formats_fall_back() {
        let mut config = RenderConfig::default();
        config.header_format = String::new();
        config.header_date = String::new();
        let renderer = Renderer::new(config, Vec::new());
        let report = renderer.render_at(&[], &ScanMetrics::default(), fixed_time());
        assert_eq!(
            report.lines()[0],
            "// Friday 10/16/26 at 09:05AM - 0 files in 0.0 secs"
        );
    }

    #[test]
    fn test_inline_note_template() {
        let mut config = RenderConfig::default();
        config.item_format = "%f:%l [%s]".to_string();
        let renderer = Renderer::new(config, Vec::new());
        let report = renderer.render_at(&groups(), &ScanMetrics::default(), fixed_time());
        assert_eq!(report.lines()[3], "parser.rs:88 [quotes]");
    }

    #[test]
    fn test_file_labels() {
        let mut config = RenderConfig::default();
        config.include_folder = true;

        let renderer = Renderer::new(config.clone(), Vec::new());
        assert_eq!(renderer.file_label(Path::new("/work/src/lib.rs")), "src/lib.rs");
        assert_eq!(renderer.file_label(Path::new("lib.rs")), "lib.rs");

        config.folder_depth = FolderDepth::Levels(2);
        let renderer = Renderer::new(config.clone(), Vec::new());
        assert_eq!(renderer.file_label(Path::new("/work/src/lib.rs")), "work/src/lib.rs");

        config.folder_depth = FolderDepth::Levels(0);
        let renderer = Renderer::new(config.clone(), Vec::new());
        assert_eq!(renderer.file_label(Path::new("/work/src/lib.rs")), "/work/src/lib.rs");
        assert_eq!(renderer.file_label(Path::new(r"C:\proj\lib.rs")), "C:/proj/lib.rs");
        assert_eq!(renderer.file_label(Path::new("lib.rs")), "lib.rs");

        config.folder_depth = FolderDepth::Auto;
        let renderer = Renderer::new(config, vec![PathBuf::from("/work")]);
        assert_eq!(renderer.file_label(Path::new("/work/src/lib.rs")), "src/lib.rs");
        assert_eq!(renderer.file_label(Path::new("/other/x.rs")), "/other/x.rs");
    }

    #[test]
    fn test_backslashes_shown_as_slashes() {
        let mut config = RenderConfig::default();
        config.include_folder = true;
        let renderer = Renderer::new(config, Vec::new());
        assert_eq!(renderer.file_label(Path::new(r"C:\proj\src\lib.rs")), "src/lib.rs");
    }
}
