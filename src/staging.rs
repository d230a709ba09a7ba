//! Staging of artifacts on the local filesystem
//!
//! Blobs land at `<obb root>/<identifier>/<display name>`; the archive lands
//! in a single reusable slot under the cache root that every run overwrites.
//! Copies stream through a fixed-size buffer so memory use does not depend on
//! artifact size. Failed copies are not rolled back.

use crate::content::ContentHandle;
use crate::identifier::ApplicationIdentifier;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default copy buffer size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// File name of the single archive slot in the cache root.
pub const DEFAULT_ARCHIVE_FILE_NAME: &str = "temp_install.apk";

/// Where staged artifacts go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    pub obb_root: PathBuf,
    pub cache_root: PathBuf,
    pub archive_file_name: String,
    pub chunk_size: usize,
}

impl StagingLayout {
    pub fn new(obb_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            obb_root: obb_root.into(),
            cache_root: cache_root.into(),
            archive_file_name: DEFAULT_ARCHIVE_FILE_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Staging destination directory for `identifier`.
    pub fn destination_dir(&self, identifier: &ApplicationIdentifier) -> PathBuf {
        self.obb_root.join(identifier.as_str())
    }

    /// Path of the single reusable archive slot.
    pub fn archive_slot(&self) -> PathBuf {
        self.cache_root.join(&self.archive_file_name)
    }
}

/// An artifact that was copied into place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Copy `reader` into `writer` in chunks of `chunk_size` bytes.
///
/// Returns the number of bytes copied. Interrupted reads are retried; any
/// other error aborts the copy and is returned as is.
pub fn copy_stream<R, W>(reader: &mut R, writer: &mut W, chunk_size: usize) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if chunk_size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "chunk size must be greater than zero",
        ));
    }

    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buffer[..read])?;
        total += read as u64;
    }
    writer.flush()?;
    Ok(total)
}

/// Copy `blob` into the staging destination for `identifier`.
///
/// The destination directory is created if absent. The staged file keeps the
/// blob's file name, which must be a bare, exactly representable file name.
pub fn stage_blob(
    layout: &StagingLayout,
    identifier: &ApplicationIdentifier,
    blob: &dyn ContentHandle,
) -> io::Result<StagedFile> {
    let file_name = bare_file_name(blob.file_name()?)?;
    let dir = layout.destination_dir(identifier);
    fs::create_dir_all(&dir)?;

    let path = dir.join(file_name);
    let bytes = copy_into(blob, &path, layout.chunk_size)?;
    Ok(StagedFile { path, bytes })
}

/// Copy `archive` into the single archive slot, replacing what was there.
pub fn stage_archive(layout: &StagingLayout, archive: &dyn ContentHandle) -> io::Result<StagedFile> {
    fs::create_dir_all(&layout.cache_root)?;

    let path = layout.archive_slot();
    let bytes = copy_into(archive, &path, layout.chunk_size)?;
    Ok(StagedFile { path, bytes })
}

fn copy_into(source: &dyn ContentHandle, dest: &Path, chunk_size: usize) -> io::Result<u64> {
    // Reader and writer are dropped at the end of this scope on every path
    let mut reader = source.open()?;
    let mut writer = BufWriter::with_capacity(chunk_size.max(1), File::create(dest)?);
    let bytes = copy_stream(&mut reader, &mut writer, chunk_size)?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    debug!("Copied {} bytes to {}", bytes, dest.display());
    Ok(bytes)
}

fn bare_file_name(name: &str) -> io::Result<&str> {
    let bare = !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\']);
    if bare {
        Ok(name)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("'{}' is not a plain file name", name),
        ))
    }
}
