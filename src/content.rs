//! Content handles
//!
//! A `ContentHandle` is what the selection step hands to the orchestrator:
//! a display name plus a byte stream that can be opened once per copy. The
//! orchestrator borrows handles for the duration of a run and never keeps
//! them afterwards.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Display name used when a source has no usable file name.
pub const DEFAULT_DISPLAY_NAME: &str = "game.obb";

/// A selected artifact: a name and a re-openable byte stream.
pub trait ContentHandle: Send {
    /// Name shown to the user; for blobs this is also the staged file name.
    fn display_name(&self) -> &str;

    /// Name the content is staged under.
    ///
    /// Defaults to the display name. Sources whose display name only
    /// approximates the real name refuse with `InvalidInput`.
    fn file_name(&self) -> io::Result<&str> {
        Ok(self.display_name())
    }

    /// Open a fresh reader over the content.
    ///
    /// Every call yields an independent stream positioned at the start.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    display_name: String,
    /// False when the file name is not UTF-8 and `display_name` is lossy
    exact_name: bool,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (display_name, exact_name) = match path.file_name().filter(|n| !n.is_empty()) {
            Some(name) => match name.to_str() {
                Some(name) => (name.to_string(), true),
                None => (name.to_string_lossy().into_owned(), false),
            },
            None => (DEFAULT_DISPLAY_NAME.to_string(), true),
        };
        Self {
            path,
            display_name,
            exact_name,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentHandle for LocalFile {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn file_name(&self) -> io::Result<&str> {
        if self.exact_name {
            Ok(&self.display_name)
        } else {
            Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("file name '{}' is not valid UTF-8", self.display_name),
            ))
        }
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(file))
    }
}

/// Content held in memory. Cheap to clone; each `open` reads from the start.
#[derive(Debug, Clone)]
pub struct InMemoryContent {
    display_name: String,
    bytes: Arc<[u8]>,
}

impl InMemoryContent {
    pub fn new(display_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            display_name: display_name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl ContentHandle for InMemoryContent {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }
}
