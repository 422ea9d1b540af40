//! Per-line annotation extraction.

use crate::pattern::{PriorityMatcher, TagMatcher};
use crate::types::{Finding, DEFAULT_PRIORITY};
use std::path::Path;

/// Extract every finding from the lines of one file.
///
/// Each line is searched for all non-overlapping matches of the merged tag
/// regex. Within a match, every named group that took part yields a finding,
/// including groups that matched the empty string. Groups that did not take
/// part are skipped.
pub fn extract(
    path: &Path,
    lines: &[String],
    tags: &TagMatcher,
    priority: &PriorityMatcher,
) -> Vec<Finding> {
    let Some(regex) = tags.regex() else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        for caps in regex.captures_iter(line) {
            for tag in tags.tags() {
                let Some(note) = caps.name(tag) else {
                    continue;
                };
                let note = note.as_str();
                findings.push(Finding {
                    file: path.to_path_buf(),
                    tag: tag.clone(),
                    note: note.to_string(),
                    line: idx + 1,
                    priority: priority.find(note).unwrap_or(DEFAULT_PRIORITY),
                });
            }
        }
    }

    findings
}
