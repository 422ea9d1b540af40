//! File content resolution.
//!
//! A file's lines come from one of two places: the open-buffer overlay, which
//! holds the live (possibly unsaved) content of files an editor has open, or
//! the file on disk decoded with the configured encoding. The overlay always
//! wins.

use crate::error::{Result, ScanError};
use encoding_rs::Encoding;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// In-memory content of files held open by an external editor.
#[derive(Debug, Clone, Default)]
pub struct OpenBuffers {
    buffers: HashMap<PathBuf, Vec<String>>,
}

impl OpenBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the live lines of an open file.
    pub fn insert(&mut self, path: impl Into<PathBuf>, lines: Vec<String>) {
        self.buffers.insert(path.into(), lines);
    }

    /// Register an open file from its full text.
    pub fn insert_text(&mut self, path: impl Into<PathBuf>, text: &str) {
        self.insert(path, split_lines(text));
    }

    /// Lines of the buffer open at `path`, if any.
    pub fn get(&self, path: &Path) -> Option<&[String]> {
        self.buffers.get(path).map(Vec::as_slice)
    }

    /// The same buffers keyed by `resolve(path)`, so lookups by resolved
    /// path find them.
    pub fn rekeyed(self, resolve: impl Fn(&Path) -> PathBuf) -> Self {
        let buffers = self
            .buffers
            .into_iter()
            .map(|(path, lines)| (resolve(&path), lines))
            .collect();
        OpenBuffers { buffers }
    }

    /// Paths of every open buffer.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.buffers.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// The environment a scan is invoked from.
pub trait Workspace {
    /// Folders to scan when the caller names none
    fn folders(&self) -> Vec<PathBuf>;

    /// Files currently open, with their live content
    fn open_buffers(&self) -> OpenBuffers;
}

/// A workspace with fixed folders and buffers.
#[derive(Debug, Clone, Default)]
pub struct StaticWorkspace {
    pub folders: Vec<PathBuf>,
    pub buffers: OpenBuffers,
}

impl StaticWorkspace {
    pub fn new(folders: Vec<PathBuf>) -> Self {
        StaticWorkspace {
            folders,
            buffers: OpenBuffers::new(),
        }
    }

    pub fn with_buffers(mut self, buffers: OpenBuffers) -> Self {
        self.buffers = buffers;
        self
    }
}

impl Workspace for StaticWorkspace {
    fn folders(&self) -> Vec<PathBuf> {
        self.folders.clone()
    }

    fn open_buffers(&self) -> OpenBuffers {
        self.buffers.clone()
    }
}

/// How bytes are checked before and after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Decode with the encoding as is
    Plain,
    /// Reject any byte above 0x7F
    Ascii,
    /// UTF-8, dropping a leading byte order mark
    Utf8Sig,
}

/// A text encoding resolved from a configuration label.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding {
    encoding: &'static Encoding,
    mode: Mode,
}

impl TextEncoding {
    /// Resolve an encoding label.
    ///
    /// Besides the WHATWG labels (`utf-8`, `latin1`, `shift_jis`, ...) this
    /// accepts the common codec spellings `ascii`, `latin-1` and `utf-8-sig`.
    /// `ascii` is strict: any byte above 0x7F fails to decode.
    pub fn for_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['_', ' '], "-");

        let resolved = match normalized.as_str() {
            "ascii" | "us-ascii" | "646" => Some(Self::with_mode(encoding_rs::UTF_8, Mode::Ascii)),
            "utf-8-sig" | "utf8-sig" => Some(Self::with_mode(encoding_rs::UTF_8, Mode::Utf8Sig)),
            "latin-1" | "l1" => Some(Self::with_mode(encoding_rs::WINDOWS_1252, Mode::Plain)),
            _ => Encoding::for_label(trimmed.as_bytes())
                .or_else(|| Encoding::for_label(normalized.as_bytes()))
                .map(|encoding| Self::with_mode(encoding, Mode::Plain)),
        };

        resolved.ok_or_else(|| ScanError::UnknownEncoding {
            label: label.to_string(),
        })
    }

    fn with_mode(encoding: &'static Encoding, mode: Mode) -> Self {
        TextEncoding { encoding, mode }
    }

    /// Canonical encoding name
    pub fn name(&self) -> &'static str {
        match self.mode {
            Mode::Plain => self.encoding.name(),
            Mode::Ascii => "ascii",
            Mode::Utf8Sig => "utf-8-sig",
        }
    }

    /// Decode bytes, failing on any malformed sequence.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        let bytes = match self.mode {
            Mode::Plain => bytes,
            Mode::Ascii if !bytes.is_ascii() => return None,
            Mode::Ascii => bytes,
            Mode::Utf8Sig => bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes),
        };
        self.encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::with_mode(encoding_rs::UTF_8, Mode::Plain)
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

/// Split text into lines on `\n`, `\r\n` or a lone `\r`, dropping the
/// terminators. A trailing terminator does not start an extra line.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(text[start..i].to_string());
                start = i + 1;
            }
            b'\r' => {
                lines.push(text[start..i].to_string());
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        lines.push(text[start..].to_string());
    }
    lines
}

/// Lines of `path`, from the overlay when it holds the file, else from disk.
pub fn read_lines<'a>(
    path: &Path,
    overlay: &'a OpenBuffers,
    encoding: TextEncoding,
) -> Result<Cow<'a, [String]>> {
    if let Some(lines) = overlay.get(path) {
        return Ok(Cow::Borrowed(lines));
    }

    let bytes = fs::read(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = encoding.decode(&bytes).ok_or_else(|| ScanError::Decode {
        path: path.to_path_buf(),
        encoding: encoding.name().to_string(),
    })?;

    Ok(Cow::Owned(split_lines(&text)))
}
