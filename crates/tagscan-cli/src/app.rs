//! Application state management.

use crate::ScanArgs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tagscan_core::{Config, OpenBuffers, Renderer, ScanRequest, Workspace};
use tracing::{debug, info};

/// Load the user configuration, then the project layer found next to the
/// first scanned path (or in the current directory).
pub fn load_config(explicit: Option<&Path>, paths: &[PathBuf]) -> anyhow::Result<Config> {
    let user = match explicit {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };

    let project_root = match paths.first() {
        Some(path) if path.is_file() => path.parent().map(Path::to_path_buf).unwrap_or_default(),
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let project = Config::project_config_path(&project_root);

    Ok(Config::load_layered(&[user.as_path(), project.as_path()])?)
}

/// The terminal's view of a workspace: the current directory, plus an
/// optional unsaved buffer read from stdin.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    folders: Vec<PathBuf>,
    buffers: OpenBuffers,
}

impl FsWorkspace {
    pub fn new(buffer: Option<&Path>) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;
        let mut buffers = OpenBuffers::new();

        if let Some(path) = buffer {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                cwd.join(path)
            };
            debug!(path = %path.display(), bytes = text.len(), "Registered stdin buffer");
            buffers.insert_text(path, &text);
        }

        Ok(FsWorkspace {
            folders: vec![cwd],
            buffers,
        })
    }
}

impl Workspace for FsWorkspace {
    fn folders(&self) -> Vec<PathBuf> {
        self.folders.clone()
    }

    fn open_buffers(&self) -> OpenBuffers {
        self.buffers.clone()
    }
}

/// Shared application state.
pub struct App {
    /// Configuration, with command-line overrides applied
    pub config: Config,

    /// Where the scan was invoked from
    pub workspace: FsWorkspace,
}

impl App {
    /// Create a new application instance.
    pub fn new(mut config: Config, args: &ScanArgs) -> anyhow::Result<Self> {
        apply_overrides(&mut config, args);
        let workspace = FsWorkspace::new(args.buffer.as_deref())?;

        info!(
            folders = workspace.folders.len(),
            buffers = workspace.buffers.len(),
            "Application initialized"
        );

        Ok(App { config, workspace })
    }

    /// Build the scan request for these arguments.
    pub fn request(&self, args: &ScanArgs) -> ScanRequest {
        ScanRequest::builder(self.config.clone())
            .paths(args.paths.iter().cloned())
            .files(args.files.iter().cloned())
            .current_file(args.current_file.clone())
            .open_files(args.open_files)
            .open_files_only(args.open_files_only)
            .build(&self.workspace)
    }

    /// Report renderer for this workspace.
    pub fn renderer(&self) -> Renderer {
        Renderer::new(self.config.render.clone(), self.workspace.folders())
    }
}

/// Command-line flags take precedence over every configuration layer.
fn apply_overrides(config: &mut Config, args: &ScanArgs) {
    if args.case_sensitive {
        config.scan.case_sensitive = true;
    }
    if let Some(encoding) = &args.encoding {
        config.scan.encoding = encoding.clone();
    }
    if args.no_resolve_symlinks {
        config.scan.resolve_symlinks = false;
    }
    config.exclude.files.extend(args.exclude_file.iter().cloned());
    config.exclude.folders.extend(args.exclude_folder.iter().cloned());
}
