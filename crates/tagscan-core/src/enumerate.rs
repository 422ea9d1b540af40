//! File enumeration.
//!
//! Walks root directories (following symlinked directories), merges in an
//! explicit file list, and yields each distinct file once:
//!
//! 1. Directories whose path (with a trailing separator) matches the
//!    exclude-folder matcher are pruned: nothing below them is visited.
//! 2. Every candidate is resolved (home expansion, absolute, and optionally
//!    canonical) and de-duplicated on the resolved path.
//! 3. Candidates whose full path matches the exclude-folder or exclude-file
//!    matcher are dropped. This also catches explicit files that live under an
//!    excluded folder.
//!
//! The sequence is lazy and single-pass. No ordering is promised.

use crate::pattern::PathMatcher;
use directories::BaseDirs;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};
use tracing::debug;
use walkdir::WalkDir;

/// Turns user-supplied paths into the form used for filtering and dedup.
#[derive(Debug, Clone)]
pub struct PathResolver {
    resolve_symlinks: bool,
    home: Option<PathBuf>,
    cwd: PathBuf,
}

impl PathResolver {
    /// Resolver relative to the process working directory.
    pub fn new(resolve_symlinks: bool) -> Self {
        PathResolver {
            resolve_symlinks,
            home: BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            cwd: std::env::current_dir().unwrap_or_default(),
        }
    }

    /// Override the home directory used for `~` expansion.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Override the directory relative paths are resolved against.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Expand `~`, make absolute, normalize, and canonicalize if enabled.
    ///
    /// Canonicalization failures (e.g. a path that does not exist) leave the
    /// normalized absolute path in place.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let expanded = match (path.strip_prefix("~"), &self.home) {
            (Ok(rest), Some(home)) => home.join(rest),
            _ => path.to_path_buf(),
        };

        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        };
        let normalized = normalize(&absolute);

        if self.resolve_symlinks {
            dunce::canonicalize(&normalized).unwrap_or(normalized)
        } else {
            normalized
        }
    }
}

/// Remove `.` components and fold `..` into its parent, lexically.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Lazily yields distinct files under the roots plus the explicit files.
pub struct Files {
    roots: Vec<PathBuf>,
    explicit: Vec<PathBuf>,
    exclude_folders: PathMatcher,
    exclude_files: PathMatcher,
    resolver: PathResolver,
    candidates: Option<std::vec::IntoIter<PathBuf>>,
    seen: HashSet<PathBuf>,
}

/// Enumerate the files to scan.
///
/// Directory walking happens on the first call to `next()`.
pub fn enumerate(
    roots: Vec<PathBuf>,
    explicit: Vec<PathBuf>,
    exclude_folders: PathMatcher,
    exclude_files: PathMatcher,
    resolver: PathResolver,
) -> Files {
    Files {
        roots,
        explicit,
        exclude_folders,
        exclude_files,
        resolver,
        candidates: None,
        seen: HashSet::new(),
    }
}

impl Files {
    fn collect_candidates(&mut self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        for root in std::mem::take(&mut self.roots) {
            self.walk_root(&root, &mut candidates);
        }
        candidates.append(&mut self.explicit);
        candidates
    }

    fn walk_root(&self, root: &Path, out: &mut Vec<PathBuf>) {
        let root = self.resolver.resolve(root);
        debug!(root = %root.display(), "Walking root");

        let walker = WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                if entry.file_type().is_dir() && self.is_excluded_folder(entry.path()) {
                    debug!(path = %entry.path().display(), "Pruning excluded folder");
                    return false;
                }
                true
            });

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => out.push(entry.into_path()),
                Ok(_) => {}
                Err(err) => debug!(error = %err, "Skipping unreadable entry"),
            }
        }
    }

    fn is_excluded_folder(&self, dir: &Path) -> bool {
        let mut text = dir.to_string_lossy().into_owned();
        if !text.ends_with(MAIN_SEPARATOR) {
            text.push(MAIN_SEPARATOR);
        }
        self.exclude_folders.is_match(&text)
    }
}

impl Iterator for Files {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        if self.candidates.is_none() {
            let collected = self.collect_candidates();
            self.candidates = Some(collected.into_iter());
        }

        loop {
            let candidate = self.candidates.as_mut()?.next()?;
            let path = self.resolver.resolve(&candidate);
            if self.seen.contains(&path) {
                continue;
            }

            let text = path.to_string_lossy();
            if self.exclude_folders.is_match(&text) {
                debug!(path = %text, "Skipping file under excluded folder");
                continue;
            }
            if self.exclude_files.is_match(&text) {
                debug!(path = %text, "Skipping excluded file");
                continue;
            }

            self.seen.insert(path.clone());
            return Some(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg/lib")).unwrap();
        fs::write(root.join("README.md"), "x").unwrap();
        fs::write(root.join("src/main.rs"), "x").unwrap();
        fs::write(root.join("src/app.min.js"), "x").unwrap();
        fs::write(root.join("src/nested/util.rs"), "x").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(root.join("node_modules/pkg/lib/deep.js"), "x").unwrap();
        (dir, root)
    }

    fn matchers() -> (PathMatcher, PathMatcher) {
        (
            PathMatcher::from_globs(&["*/node_modules/*"], false).unwrap(),
            PathMatcher::from_globs(&["*.min.js"], false).unwrap(),
        )
    }

    fn run(roots: Vec<PathBuf>, explicit: Vec<PathBuf>, resolve: bool) -> Vec<PathBuf> {
        let (folders, files) = matchers();
        enumerate(roots, explicit, folders, files, PathResolver::new(resolve)).collect()
    }

    fn set(paths: Vec<PathBuf>) -> BTreeSet<PathBuf> {
        paths.into_iter().collect()
    }

    #[test]
    fn test_walk_prunes_and_filters() {
        let (_dir, root) = tree();
        let found = set(run(vec![root.clone()], vec![], true));

        let expected: BTreeSet<PathBuf> = [
            root.join("README.md"),
            root.join("src/main.rs"),
            root.join("src/nested/util.rs"),
        ]
        .into_iter()
        .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_same_set_on_repeat() {
        let (_dir, root) = tree();
        let first = set(run(vec![root.clone()], vec![], true));
        let second = set(run(vec![root], vec![], true));
        assert_eq!(first, second);
    }

    #[test]
    fn test_walked_and_explicit_file_yields_once() {
        let (_dir, root) = tree();
        let explicit = root.join("src/main.rs");
        let found = run(vec![root.clone()], vec![explicit.clone(), explicit.clone()], true);

        assert_eq!(found.iter().filter(|p| **p == explicit).count(), 1);
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_explicit_file_under_excluded_folder() {
        let (_dir, root) = tree();
        let found = run(vec![], vec![root.join("node_modules/pkg/index.js")], true);
        assert!(found.is_empty());
    }

    #[test]
    fn test_explicit_files_are_not_walked() {
        let (_dir, root) = tree();
        let found = run(vec![], vec![root.join("README.md")], true);
        assert_eq!(found, vec![root.join("README.md")]);
    }

    #[test]
    fn test_empty_and_missing_roots() {
        let (_dir, root) = tree();
        assert!(run(vec![], vec![], true).is_empty());
        assert!(run(vec![root.join("does-not-exist")], vec![], true).is_empty());
    }

    #[test]
    fn test_excluded_root_is_pruned() {
        let (_dir, root) = tree();
        let found = run(vec![root.join("node_modules")], vec![], true);
        assert!(found.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_dedup() {
        let (_dir, root) = tree();
        std::os::unix::fs::symlink(root.join("src"), root.join("src-link")).unwrap();

        let resolved = run(vec![root.clone()], vec![], true);
        assert_eq!(resolved.len(), 3);

        // Without canonicalization the link yields its own copies
        let literal = run(vec![root.clone()], vec![], false);
        assert_eq!(literal.len(), 5);
        assert!(literal.contains(&root.join("src-link/main.rs")));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolver() {
        let resolver = PathResolver::new(false)
            .with_home("/home/someone")
            .with_cwd("/work/project");

        assert_eq!(
            resolver.resolve(Path::new("~/notes/todo.txt")),
            PathBuf::from("/home/someone/notes/todo.txt")
        );
        assert_eq!(
            resolver.resolve(Path::new("src/../lib/./a.rs")),
            PathBuf::from("/work/project/lib/a.rs")
        );
        assert_eq!(
            resolver.resolve(Path::new("/abs/path")),
            PathBuf::from("/abs/path")
        );
    }
}
