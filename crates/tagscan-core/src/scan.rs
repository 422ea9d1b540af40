//! Scan coordination.
//!
//! A scan is described by a [`ScanRequest`]: roots to walk, explicit files,
//! the open-buffer overlay, and a configuration snapshot. The request is
//! compiled on the caller's thread (so configuration errors surface before
//! anything starts) and then moved into a dedicated worker thread, which
//! enumerates files, reads and extracts each one, and hands the complete
//! result list to a completion callback exactly once.
//!
//! ## Progress
//!
//! After every file attempt, successful or not, the scanned-file counter is
//! incremented and published to the optional [`ScanProgress`] sink. The
//! increment and the publish happen under one lock, so observers see counts
//! in order even when extraction runs on the rayon pool.
//!
//! ## Errors
//!
//! Only configuration errors leave this module. A file that cannot be read
//! or decoded is skipped and still counted.

use crate::config::{Config, PerformanceConfig};
use crate::enumerate::{enumerate, Files, PathResolver};
use crate::error::{Result, ScanError};
use crate::extract::extract;
use crate::pattern::CompiledPatterns;
use crate::source::{read_lines, OpenBuffers, TextEncoding, Workspace};
use crate::types::{Finding, ScanMetrics, ScanOutcome};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, instrument};

/// Everything one scan needs, captured by value.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Directories to walk
    pub roots: Vec<PathBuf>,

    /// Files to scan without walking
    pub files: Vec<PathBuf>,

    /// Live content that takes precedence over disk
    pub buffers: OpenBuffers,

    /// Configuration snapshot
    pub config: Config,
}

impl ScanRequest {
    /// Create a request with no open buffers.
    pub fn new(roots: Vec<PathBuf>, files: Vec<PathBuf>, config: Config) -> Self {
        ScanRequest {
            roots,
            files,
            buffers: OpenBuffers::new(),
            config,
        }
    }

    /// Attach an open-buffer overlay.
    pub fn with_buffers(mut self, buffers: OpenBuffers) -> Self {
        self.buffers = buffers;
        self
    }

    /// Start building a request from invocation options.
    pub fn builder(config: Config) -> ScanRequestBuilder {
        ScanRequestBuilder {
            config,
            paths: Vec::new(),
            files: Vec::new(),
            current_file: None,
            open_files: false,
            open_files_only: false,
        }
    }
}

/// Resolves how a scan was invoked into roots and explicit files.
#[derive(Debug, Clone)]
pub struct ScanRequestBuilder {
    config: Config,
    paths: Vec<PathBuf>,
    files: Vec<PathBuf>,
    current_file: Option<PathBuf>,
    open_files: bool,
    open_files_only: bool,
}

impl ScanRequestBuilder {
    /// Paths named by the caller. Directories are walked, files are scanned.
    pub fn paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.paths.extend(paths);
        self
    }

    /// Additional explicit files.
    pub fn files(mut self, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.files.extend(files);
        self
    }

    /// Scan only this one file.
    pub fn current_file(mut self, file: Option<PathBuf>) -> Self {
        self.current_file = file;
        self
    }

    /// Also scan every open buffer.
    pub fn open_files(mut self, enabled: bool) -> Self {
        self.open_files = enabled;
        self
    }

    /// Scan open buffers and nothing else.
    pub fn open_files_only(mut self, enabled: bool) -> Self {
        self.open_files_only = enabled;
        self
    }

    /// Produce the request, consulting the workspace for defaults.
    pub fn build(self, workspace: &dyn Workspace) -> ScanRequest {
        let buffers = workspace.open_buffers();

        if let Some(file) = self.current_file {
            return ScanRequest::new(Vec::new(), vec![file], self.config).with_buffers(buffers);
        }

        let mut roots = self.paths;
        let mut files = self.files;

        if roots.is_empty() {
            roots = self.config.scan.include_paths.clone();
        }
        if self.open_files || self.open_files_only {
            files.extend(buffers.paths().map(Path::to_path_buf));
        }

        if self.open_files_only {
            roots.clear();
        } else if roots.is_empty() {
            roots = workspace.folders();
        } else {
            let (named_files, dirs): (Vec<_>, Vec<_>) =
                roots.into_iter().partition(|p| p.is_file());
            files.extend(named_files);
            roots = dirs;
        }

        ScanRequest {
            roots,
            files,
            buffers,
            config: self.config,
        }
    }
}

/// Receives progress from a running scan.
pub trait ScanProgress: Send + Sync {
    /// Called after each file attempt with the running count
    fn on_progress(&self, files_scanned: u64);

    /// Called once when the scan finishes
    fn on_complete(&self, _metrics: &ScanMetrics) {}
}

/// A progress reporter that logs to tracing
pub struct LoggingProgress;

impl ScanProgress for LoggingProgress {
    fn on_progress(&self, files_scanned: u64) {
        tracing::trace!(files = files_scanned, "Scanning progress");
    }

    fn on_complete(&self, metrics: &ScanMetrics) {
        tracing::debug!(
            files = metrics.files_scanned,
            secs = metrics.elapsed_secs,
            "Scan progress complete"
        );
    }
}

/// Progress events sent by [`ChannelProgress`]
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Running scanned-file count
    Progress(u64),
    /// The scan finished
    Complete(ScanMetrics),
}

/// A channel-based progress reporter
pub struct ChannelProgress {
    sender: crossbeam_channel::Sender<ScanEvent>,
}

impl ChannelProgress {
    /// Create a new channel-based reporter
    pub fn new() -> (Self, crossbeam_channel::Receiver<ScanEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (ChannelProgress { sender }, receiver)
    }
}

impl ScanProgress for ChannelProgress {
    fn on_progress(&self, files_scanned: u64) {
        let _ = self.sender.send(ScanEvent::Progress(files_scanned));
    }

    fn on_complete(&self, metrics: &ScanMetrics) {
        let _ = self.sender.send(ScanEvent::Complete(*metrics));
    }
}

/// The scanned-file counter shared by a worker and its observers.
pub struct ProgressCounter {
    count: Mutex<u64>,
    sink: Option<Arc<dyn ScanProgress>>,
}

impl ProgressCounter {
    pub fn new(sink: Option<Arc<dyn ScanProgress>>) -> Self {
        ProgressCounter {
            count: Mutex::new(0),
            sink,
        }
    }

    /// Count one file attempt and publish the new total.
    pub fn increment(&self) -> u64 {
        let mut count = self.count.lock();
        *count += 1;
        if let Some(sink) = &self.sink {
            sink.on_progress(*count);
        }
        *count
    }

    /// Current count
    pub fn get(&self) -> u64 {
        *self.count.lock()
    }

    fn complete(&self, metrics: &ScanMetrics) {
        if let Some(sink) = &self.sink {
            sink.on_complete(metrics);
        }
    }
}

/// A request with every matcher compiled and the encoding resolved.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    roots: Vec<PathBuf>,
    files: Vec<PathBuf>,
    buffers: OpenBuffers,
    patterns: CompiledPatterns,
    encoding: TextEncoding,
    resolver: PathResolver,
    performance: PerformanceConfig,
}

impl ScanPlan {
    /// Compile a request. This is where configuration errors surface.
    pub fn compile(request: ScanRequest) -> Result<Self> {
        let patterns = CompiledPatterns::compile(&request.config)?;
        let encoding = TextEncoding::for_label(&request.config.scan.encoding)?;
        let resolver = PathResolver::new(request.config.scan.resolve_symlinks);
        Ok(ScanPlan {
            roots: request.roots,
            files: request.files,
            buffers: request.buffers.rekeyed(|path| resolver.resolve(path)),
            patterns,
            encoding,
            resolver,
            performance: request.config.performance,
        })
    }

    /// Replace the path resolver (mainly for tests).
    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.buffers = self.buffers.rekeyed(|path| resolver.resolve(path));
        self.resolver = resolver;
        self
    }

    /// The lazy sequence of files this plan will scan.
    pub fn files(&self) -> Files {
        enumerate(
            self.roots.clone(),
            self.files.clone(),
            self.patterns.exclude_folders.clone(),
            self.patterns.exclude_files.clone(),
            self.resolver.clone(),
        )
    }

    fn scan_file(&self, path: &Path) -> Vec<Finding> {
        match read_lines(path, &self.buffers, self.encoding) {
            Ok(lines) => extract(path, &lines, &self.patterns.tags, &self.patterns.priority),
            Err(err) => {
                debug!(error = %err, "Skipping file");
                Vec::new()
            }
        }
    }

    /// Run the plan to completion on the current thread.
    #[instrument(skip_all, fields(roots = self.roots.len(), files = self.files.len()))]
    pub fn execute(&self, counter: &ProgressCounter) -> ScanOutcome {
        let start = Instant::now();
        debug!("Scan started");

        let mut files = self.files();
        let findings = if self.performance.parallel_extract {
            let head: Vec<PathBuf> = files
                .by_ref()
                .take(self.performance.parallel_threshold)
                .collect();

            if head.len() < self.performance.parallel_threshold {
                self.extract_sequential(head.into_iter(), counter)
            } else {
                debug!("Extracting in parallel");
                head.into_iter()
                    .chain(files)
                    .par_bridge()
                    .flat_map_iter(|path| {
                        let found = self.scan_file(&path);
                        counter.increment();
                        found
                    })
                    .collect()
            }
        } else {
            self.extract_sequential(files, counter)
        };

        let metrics = ScanMetrics::new(start.elapsed(), counter.get());
        counter.complete(&metrics);
        debug!(
            files = metrics.files_scanned,
            findings = findings.len(),
            secs = metrics.elapsed_secs,
            "Scan complete"
        );

        ScanOutcome { findings, metrics }
    }

    fn extract_sequential(
        &self,
        files: impl Iterator<Item = PathBuf>,
        counter: &ProgressCounter,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        for path in files {
            findings.extend(self.scan_file(&path));
            counter.increment();
        }
        findings
    }
}

/// Run a scan on the current thread.
pub fn run(request: ScanRequest, progress: Option<Arc<dyn ScanProgress>>) -> Result<ScanOutcome> {
    let plan = ScanPlan::compile(request)?;
    Ok(plan.execute(&ProgressCounter::new(progress)))
}

/// Handle to a scan running on its worker thread.
pub struct ScanHandle {
    counter: Arc<ProgressCounter>,
    thread: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Files attempted so far
    pub fn scanned(&self) -> u64 {
        self.counter.get()
    }

    /// True once the worker has delivered its outcome
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the worker to finish.
    pub fn join(mut self) -> Result<()> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| ScanError::Internal("scan worker panicked".to_string())),
            None => Ok(()),
        }
    }
}

/// Start a scan on a dedicated worker thread.
///
/// The request is compiled before the worker starts, so a configuration
/// error is returned here and `on_complete` is never called. Otherwise
/// `on_complete` receives the outcome exactly once, on the worker thread.
pub fn spawn<F>(
    request: ScanRequest,
    progress: Option<Arc<dyn ScanProgress>>,
    on_complete: F,
) -> Result<ScanHandle>
where
    F: FnOnce(ScanOutcome) + Send + 'static,
{
    let plan = ScanPlan::compile(request)?;
    spawn_plan(plan, progress, on_complete)
}

/// Start an already compiled plan on a dedicated worker thread.
pub fn spawn_plan<F>(
    plan: ScanPlan,
    progress: Option<Arc<dyn ScanProgress>>,
    on_complete: F,
) -> Result<ScanHandle>
where
    F: FnOnce(ScanOutcome) + Send + 'static,
{
    let counter = Arc::new(ProgressCounter::new(progress));
    let worker_counter = Arc::clone(&counter);

    let thread = thread::Builder::new()
        .name("tagscan-worker".to_string())
        .spawn(move || {
            let outcome = plan.execute(&worker_counter);
            on_complete(outcome);
        })?;

    Ok(ScanHandle {
        counter,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticWorkspace;
    use std::collections::BTreeSet;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.patterns.clear();
        config
            .patterns
            .insert("TODO".to_string(), r"TODO:\s*(?P<TODO>.*)".to_string());
        config
            .patterns
            .insert("FIXME".to_string(), r"FIXME:\s*(?P<FIXME>.*)".to_string());
        config
    }

    fn root() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_unreadable_file_is_skipped_but_counted() {
        let (_dir, root) = root();
        fs::write(root.join("a.rs"), "// TODO: first\n").unwrap();
        fs::write(root.join("b.rs"), "fn b() {}\n// FIXME: second\n").unwrap();
        let missing = root.join("c.rs");

        let request = ScanRequest::new(
            Vec::new(),
            vec![root.join("a.rs"), root.join("b.rs"), missing],
            test_config(),
        );
        let outcome = run(request, None).unwrap();

        assert_eq!(outcome.metrics.files_scanned, 3);
        let notes: BTreeSet<_> = outcome.findings.iter().map(|f| f.note.clone()).collect();
        let expected: BTreeSet<String> =
            ["first", "second"].iter().map(|s| s.to_string()).collect();
        assert_eq!(notes, expected);
    }

    #[test]
    fn test_undecodable_file_is_skipped_but_counted() {
        let (_dir, root) = root();
        fs::write(root.join("ok.txt"), "TODO: fine\n").unwrap();
        fs::write(root.join("bad.txt"), [b'T', b'O', b'D', b'O', b':', 0xff, b'\n']).unwrap();

        let outcome = run(ScanRequest::new(vec![root], Vec::new(), test_config()), None).unwrap();
        assert_eq!(outcome.metrics.files_scanned, 2);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].note, "fine");
    }

    #[test]
    fn test_overlay_content_is_scanned() {
        let (_dir, root) = root();
        let path = root.join("open.rs");
        fs::write(&path, "// nothing saved yet\n").unwrap();

        let mut buffers = OpenBuffers::new();
        buffers.insert_text(&path, "fn f() {}\n// TODO: unsaved edit\n");

        let request =
            ScanRequest::new(Vec::new(), vec![path.clone()], test_config()).with_buffers(buffers);
        let outcome = run(request, None).unwrap();

        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].note, "unsaved edit");
        assert_eq!(outcome.findings[0].line, 2);
        assert_eq!(outcome.findings[0].file, path);
    }

    #[test]
    fn test_overlay_found_through_unnormalized_path() {
        let (_dir, root) = root();
        fs::create_dir(root.join("src")).unwrap();
        let draft = root.join("src").join("..").join("draft.rs");

        let mut buffers = OpenBuffers::new();
        buffers.insert_text(&draft, "// TODO: unsaved\n");

        let request =
            ScanRequest::new(Vec::new(), vec![draft], test_config()).with_buffers(buffers);
        let outcome = run(request, None).unwrap();

        assert_eq!(outcome.metrics.files_scanned, 1);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].note, "unsaved");
        assert_eq!(outcome.findings[0].file, root.join("draft.rs"));
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        let (_dir, root) = root();
        fs::write(root.join("plain.rs"), "// TODO: cafe\n").unwrap();
        fs::write(root.join("accent.rs"), b"// TODO: caf\xe9\n").unwrap();

        let mut config = test_config();
        config.scan.encoding = "ascii".to_string();
        let outcome = run(ScanRequest::new(vec![root], Vec::new(), config), None).unwrap();

        assert_eq!(outcome.metrics.files_scanned, 2);
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].note, "cafe");
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_is_skipped_but_counted() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, root) = root();
        fs::write(root.join("a.rs"), "// TODO: first\n").unwrap();
        fs::write(root.join("b.rs"), "// FIXME: second\n").unwrap();
        let locked = root.join("c.rs");
        fs::write(&locked, "// TODO: hidden\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through the mode bits
        if fs::read(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
            return;
        }

        let outcome = run(ScanRequest::new(vec![root], Vec::new(), test_config()), None).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

        assert_eq!(outcome.metrics.files_scanned, 3);
        let notes: BTreeSet<String> = outcome.findings.iter().map(|f| f.note.clone()).collect();
        let expected: BTreeSet<String> =
            ["first", "second"].iter().map(|s| s.to_string()).collect();
        assert_eq!(notes, expected);
    }

    #[test]
    fn test_empty_root_yields_zeroed_outcome() {
        let (_dir, root) = root();
        let outcome = run(ScanRequest::new(vec![root], Vec::new(), test_config()), None).unwrap();
        assert!(outcome.findings.is_empty());
        assert_eq!(outcome.metrics.files_scanned, 0);
        assert!(outcome.metrics.elapsed_secs >= 0.0);
    }

    #[test]
    fn test_elapsed_within_wall_clock() {
        let (_dir, root) = root();
        for i in 0..5 {
            fs::write(root.join(format!("f{}.rs", i)), "// TODO: x\n").unwrap();
        }

        let start = Instant::now();
        let outcome = run(ScanRequest::new(vec![root], Vec::new(), test_config()), None).unwrap();
        let wall = start.elapsed().as_secs_f64();

        assert!(outcome.metrics.elapsed_secs >= 0.0);
        assert!(outcome.metrics.elapsed_secs <= wall + 0.005);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (_dir, root) = root();
        for i in 0..40 {
            fs::write(
                root.join(format!("f{}.rs", i)),
                format!("// TODO: item {}\n// FIXME:({}) later\n", i, i % 10),
            )
            .unwrap();
        }

        let mut sequential = test_config();
        sequential.performance.parallel_extract = false;
        let mut parallel = test_config();
        parallel.performance.parallel_threshold = 4;

        let a = run(ScanRequest::new(vec![root.clone()], Vec::new(), sequential), None).unwrap();
        let b = run(ScanRequest::new(vec![root], Vec::new(), parallel), None).unwrap();

        let key = |f: &Finding| (f.file.clone(), f.line, f.tag.clone(), f.priority);
        let left: BTreeSet<_> = a.findings.iter().map(key).collect();
        let right: BTreeSet<_> = b.findings.iter().map(key).collect();
        assert_eq!(left, right);
        assert_eq!(a.findings.len(), 80);
        assert_eq!(b.metrics.files_scanned, 40);
    }

    #[test]
    fn test_spawn_delivers_once_with_progress() {
        let (_dir, root) = root();
        for i in 0..3 {
            fs::write(root.join(format!("f{}.rs", i)), "// TODO: x\n").unwrap();
        }

        let (progress, events) = ChannelProgress::new();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let handle = spawn(
            ScanRequest::new(vec![root], Vec::new(), test_config()),
            Some(Arc::new(progress)),
            move |outcome| {
                let _ = done_tx.send(outcome);
            },
        )
        .unwrap();

        let outcome = done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        handle.join().unwrap();
        assert!(done_rx.try_recv().is_err());

        assert_eq!(outcome.findings.len(), 3);
        assert_eq!(outcome.metrics.files_scanned, 3);

        let received: Vec<ScanEvent> = events.try_iter().collect();
        assert_eq!(
            received[..3],
            [ScanEvent::Progress(1), ScanEvent::Progress(2), ScanEvent::Progress(3)]
        );
        assert_eq!(received[3], ScanEvent::Complete(outcome.metrics));
    }

    #[test]
    fn test_config_error_prevents_start() {
        let mut config = test_config();
        config
            .patterns
            .insert("BROKEN".to_string(), "BROKEN:(?P<broken>".to_string());

        let (done_tx, done_rx) = crossbeam_channel::unbounded::<ScanOutcome>();
        let result = spawn(ScanRequest::new(Vec::new(), Vec::new(), config), None, move |o| {
            let _ = done_tx.send(o);
        });

        let err = result.err().unwrap();
        assert!(err.is_config_error());
        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_unknown_encoding_prevents_start() {
        let mut config = test_config();
        config.scan.encoding = "not-an-encoding".to_string();
        let err = run(ScanRequest::new(Vec::new(), Vec::new(), config), None).unwrap_err();
        assert!(matches!(err, ScanError::UnknownEncoding { .. }));
    }

    #[test]
    fn test_builder_defaults_to_workspace_folders() {
        let (_dir, root) = root();
        let workspace = StaticWorkspace::new(vec![root.clone()]);

        let request = ScanRequest::builder(test_config()).build(&workspace);
        assert_eq!(request.roots, vec![root]);
        assert!(request.files.is_empty());
    }

    #[test]
    fn test_builder_prefers_include_paths() {
        let (_dir, root) = root();
        let mut config = test_config();
        config.scan.include_paths = vec![root.join("src")];
        let workspace = StaticWorkspace::new(vec![root.clone()]);

        let request = ScanRequest::builder(config).build(&workspace);
        assert_eq!(request.roots, vec![root.join("src")]);
    }

    #[test]
    fn test_builder_splits_named_files() {
        let (_dir, root) = root();
        fs::write(root.join("one.rs"), "").unwrap();
        let workspace = StaticWorkspace::new(Vec::new());

        let request = ScanRequest::builder(test_config())
            .paths(vec![root.clone(), root.join("one.rs")])
            .build(&workspace);
        assert_eq!(request.roots, vec![root.clone()]);
        assert_eq!(request.files, vec![root.join("one.rs")]);
    }

    #[test]
    fn test_builder_current_file_and_open_files() {
        let (_dir, root) = root();
        let mut buffers = OpenBuffers::new();
        buffers.insert_text(root.join("open.rs"), "");
        let workspace = StaticWorkspace::new(vec![root.clone()]).with_buffers(buffers);

        let request = ScanRequest::builder(test_config())
            .current_file(Some(root.join("this.rs")))
            .build(&workspace);
        assert!(request.roots.is_empty());
        assert_eq!(request.files, vec![root.join("this.rs")]);

        let request = ScanRequest::builder(test_config())
            .open_files(true)
            .build(&workspace);
        assert_eq!(request.roots, vec![root.clone()]);
        assert_eq!(request.files, vec![root.join("open.rs")]);

        let request = ScanRequest::builder(test_config())
            .open_files_only(true)
            .build(&workspace);
        assert!(request.roots.is_empty());
        assert_eq!(request.files, vec![root.join("open.rs")]);
    }
}
