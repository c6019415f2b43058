//! Key archive payloads moving through the detection pipeline.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A key archive downloaded from the key server.
#[derive(Debug, Clone)]
pub struct DownloadedPackage {
    /// Remote path the package was downloaded from.
    pub path: String,
    /// Raw archive bytes.
    pub bytes: Bytes,
}

impl DownloadedPackage {
    /// Creates a new downloaded package.
    #[must_use]
    pub const fn new(path: String, bytes: Bytes) -> Self {
        Self { path, bytes }
    }

    /// Returns the package size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the package has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Key material unpacked to local files.
///
/// Owns the scratch directory the files live in; the directory and every
/// file in it are removed on [`cleanup`](Self::cleanup) or when dropped.
#[derive(Debug)]
pub struct UnpackedArchives {
    key_files: Vec<PathBuf>,
    scratch: TempDir,
}

impl UnpackedArchives {
    /// Wraps key files stored inside an owned scratch directory.
    #[must_use]
    pub const fn new(scratch: TempDir, key_files: Vec<PathBuf>) -> Self {
        Self { key_files, scratch }
    }

    /// Returns the local key-material files.
    #[must_use]
    pub fn key_files(&self) -> &[PathBuf] {
        &self.key_files
    }

    /// Returns the scratch directory holding the key files.
    #[must_use]
    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Deletes the scratch directory and its contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be removed.
    pub fn cleanup(self) -> std::io::Result<()> {
        self.scratch.close()
    }
}
