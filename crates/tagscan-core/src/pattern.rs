//! Pattern compilation.
//!
//! Turns the user-facing configuration into compiled matchers:
//!
//! - exclude globs become one combined regex per list, where `/` in a glob
//!   matches either separator in a path
//! - tag fragments become one alternation regex with a named group per tag
//! - a fixed matcher finds `(N)` priority markers inside note text
//!
//! Everything here fails fast: a malformed glob or regex is reported before
//! any file is scanned.

use crate::config::Config;
use crate::error::{Result, ScanError};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Regex class matching either directory separator.
const SEPARATOR: &str = r"[\\/]";

/// Regex class matching a single non-separator character.
const NOT_SEPARATOR: &str = r"[^\\/]";

/// Convert a glob into an unanchored regex fragment.
///
/// - `*` matches any run of characters except separators
/// - `**` matches across separators (`**/` may also match nothing)
/// - `?` matches one non-separator character
/// - `[...]` and `[!...]` are character classes
/// - `/` (or `\`) matches either separator
///
/// The glob is expected to have passed `glob::Pattern` validation, which
/// [`PathMatcher::from_globs`] applies first, so an unterminated `[` never
/// reaches a matcher. Called directly, it is escaped.
pub fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                if chars.get(i) == Some(&'*') {
                    while chars.get(i) == Some(&'*') {
                        i += 1;
                    }
                    if matches!(chars.get(i), Some('/') | Some('\\')) {
                        i += 1;
                        out.push_str(&format!("(?:.*{})?", SEPARATOR));
                    } else {
                        out.push_str(".*");
                    }
                } else {
                    out.push_str(NOT_SEPARATOR);
                    out.push('*');
                }
            }
            '?' => out.push_str(NOT_SEPARATOR),
            '/' | '\\' => out.push_str(SEPARATOR),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i..end]));
                    i = end + 1;
                }
                None => out.push_str(r"\["),
            },
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }

    out
}

/// Index of the `]` closing a class whose body starts at `start`.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    // A leading `]` is part of the class
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() && chars[j] != ']' {
        j += 1;
    }
    (j < chars.len()).then_some(j)
}

fn translate_class(body: &[char]) -> String {
    let mut out = String::from("[");
    let mut rest = body;
    let negated = matches!(rest.first(), Some('!'));
    if negated {
        out.push('^');
        rest = &rest[1..];
    }
    for (idx, &c) in rest.iter().enumerate() {
        match c {
            '\\' | '[' | ']' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            }
            '^' if idx == 0 => out.push_str(r"\^"),
            _ => out.push(c),
        }
    }
    // A negated class never matches a separator
    if negated {
        out.push_str(r"\\/");
    }
    out.push(']');
    out
}

/// Join regexes into `(?:r1)|(?:r2)|...`.
///
/// Returns `None` for an empty list; the caller must treat that as a matcher
/// that never matches, since an empty alternation would match everything.
pub fn merge_regexes<I, S>(regexes: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = regexes
        .into_iter()
        .map(|r| format!("(?:{})", r.as_ref()))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("|"))
    }
}

fn build_regex(pattern: &str, case_sensitive: bool) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
}

/// Matcher over path strings built from a list of globs.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    regex: Option<Regex>,
}

impl PathMatcher {
    /// A matcher that rejects every path.
    pub fn never() -> Self {
        PathMatcher { regex: None }
    }

    /// Compile a list of globs into one matcher.
    pub fn from_globs<S: AsRef<str>>(globs: &[S], case_sensitive: bool) -> Result<Self> {
        for glob in globs {
            let glob = glob.as_ref();
            glob::Pattern::new(glob).map_err(|e| ScanError::InvalidGlob {
                pattern: glob.to_string(),
                reason: e.msg.to_string(),
            })?;
        }

        let Some(merged) = merge_regexes(globs.iter().map(|g| glob_to_regex(g.as_ref()))) else {
            return Ok(Self::never());
        };

        let regex = build_regex(&merged, case_sensitive).map_err(|e| ScanError::InvalidGlob {
            pattern: globs
                .iter()
                .map(|g| g.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            reason: e.to_string(),
        })?;

        Ok(PathMatcher { regex: Some(regex) })
    }

    /// True if any glob matches somewhere in `path`.
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.as_ref().map_or(false, |re| re.is_match(path))
    }
}

/// The merged tag regex, one named group per tag.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    regex: Option<Regex>,
    tags: Vec<String>,
}

impl TagMatcher {
    /// Compile tag fragments into one alternation.
    ///
    /// A fragment that already defines named groups is used verbatim and
    /// its group names become the tags it reports. A fragment without named
    /// groups is wrapped whole in a group named after its tag, so the entire
    /// match becomes the note.
    pub fn compile<'a, I>(patterns: I, case_sensitive: bool) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut fragments = Vec::new();
        for (tag, fragment) in patterns {
            fragments.push(tag_fragment(tag, fragment, case_sensitive)?);
        }

        let Some(merged) = merge_regexes(&fragments) else {
            return Ok(TagMatcher {
                regex: None,
                tags: Vec::new(),
            });
        };

        let regex = build_regex(&merged, case_sensitive).map_err(|e| ScanError::InvalidPattern {
            pattern: merged.clone(),
            reason: e.to_string(),
        })?;
        let tags = regex.capture_names().flatten().map(str::to_string).collect();

        debug!(pattern = %merged, "Compiled tag matcher");
        Ok(TagMatcher {
            regex: Some(regex),
            tags,
        })
    }

    /// The compiled regex, if any tag is configured.
    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Names of every group that can report a finding.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

fn tag_fragment(tag: &str, fragment: &str, case_sensitive: bool) -> Result<String> {
    let invalid = |reason: String| ScanError::InvalidPattern {
        pattern: format!("{} = {}", tag, fragment),
        reason,
    };

    let alone = build_regex(fragment, case_sensitive).map_err(|e| invalid(e.to_string()))?;
    if alone.capture_names().flatten().next().is_some() {
        return Ok(fragment.to_string());
    }

    if !is_group_name(tag) {
        return Err(invalid(format!(
            "fragment has no named group and {:?} cannot be used as a group name",
            tag
        )));
    }
    Ok(format!("(?P<{}>{})", tag, fragment))
}

fn is_group_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Finds an embedded `(N)` marker (one or two digits) anywhere in a note.
#[derive(Debug, Clone)]
pub struct PriorityMatcher {
    regex: Regex,
}

impl PriorityMatcher {
    pub fn new() -> Self {
        PriorityMatcher {
            regex: Regex::new(r"\(([0-9]{1,2})\)").expect("priority regex is valid"),
        }
    }

    /// Priority from the first marker in `note`, if there is one.
    pub fn find(&self, note: &str) -> Option<u32> {
        self.regex
            .captures(note)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

impl Default for PriorityMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// All matchers needed for one scan.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    pub tags: TagMatcher,
    pub exclude_files: PathMatcher,
    pub exclude_folders: PathMatcher,
    pub priority: PriorityMatcher,
}

impl CompiledPatterns {
    /// Compile every matcher from configuration.
    pub fn compile(config: &Config) -> Result<Self> {
        let case_sensitive = config.scan.case_sensitive;
        Ok(CompiledPatterns {
            tags: TagMatcher::compile(
                config
                    .patterns
                    .iter()
                    .map(|(tag, fragment)| (tag.as_str(), fragment.as_str())),
                case_sensitive,
            )?,
            exclude_files: PathMatcher::from_globs(&config.exclude.files, case_sensitive)?,
            exclude_folders: PathMatcher::from_globs(&config.exclude.folders, case_sensitive)?,
            priority: PriorityMatcher::new(),
        })
    }
}
