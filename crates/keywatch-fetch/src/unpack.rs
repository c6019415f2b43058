//! Key archive unpacking.

use async_trait::async_trait;
use keywatch_detect::ArchiveUnpacker;
use keywatch_types::{DownloadedPackage, UnpackError, UnpackedArchives};
use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

/// Archive entry holding the exported diagnosis keys.
pub const KEY_EXPORT_ENTRY: &str = "export.bin";

/// Archive entry holding the export signature.
pub const SIGNATURE_ENTRY: &str = "export.sig";

/// Extracts the key export and its signature from one archive into `dir`.
///
/// Files are named `{index}.bin` and `{index}.sig` so archives unpacked into
/// the same directory never collide. Returns both paths, key export first.
///
/// # Errors
///
/// Returns an error if the package is empty, is not a zip archive, lacks
/// either entry, or the files cannot be written.
pub fn unpack_package(
    package: &DownloadedPackage,
    dir: &Path,
    index: usize,
) -> Result<Vec<PathBuf>, UnpackError> {
    if package.is_empty() {
        return Err(UnpackError::EmptyInput(package.path.clone()));
    }

    let mut archive =
        ZipArchive::new(Cursor::new(package.bytes.as_ref())).map_err(|e| UnpackError::Malformed {
            path: package.path.clone(),
            reason: e.to_string(),
        })?;

    let mut files = Vec::with_capacity(2);
    for (entry, extension) in [(KEY_EXPORT_ENTRY, "bin"), (SIGNATURE_ENTRY, "sig")] {
        let mut source = match archive.by_name(entry) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => {
                return Err(UnpackError::MissingEntry {
                    path: package.path.clone(),
                    entry,
                });
            }
            Err(e) => {
                return Err(UnpackError::Malformed {
                    path: package.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let target = dir.join(format!("{index}.{extension}"));
        let write = |e: io::Error| UnpackError::Write {
            path: target.clone(),
            source: e,
        };
        let mut out = File::create(&target).map_err(write)?;
        io::copy(&mut source, &mut out).map_err(write)?;
        files.push(target);
    }

    Ok(files)
}

/// Unpacks zip key archives into a fresh scratch directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipUnpacker;

impl ZipUnpacker {
    /// Creates a new unpacker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn unpack_all(packages: &[DownloadedPackage]) -> Result<UnpackedArchives, UnpackError> {
        let scratch = tempfile::Builder::new()
            .prefix("keywatch-keys-")
            .tempdir()
            .map_err(UnpackError::ScratchDir)?;

        let mut key_files = Vec::with_capacity(packages.len() * 2);
        for (index, package) in packages.iter().enumerate() {
            key_files.extend(unpack_package(package, scratch.path(), index)?);
        }

        debug!(
            archives = packages.len(),
            files = key_files.len(),
            dir = %scratch.path().display(),
            "unpacked key archives"
        );
        Ok(UnpackedArchives::new(scratch, key_files))
    }
}

#[async_trait]
impl ArchiveUnpacker for ZipUnpacker {
    async fn unpack(
        &self,
        packages: Vec<DownloadedPackage>,
    ) -> Result<UnpackedArchives, UnpackError> {
        // Decompression and file I/O are blocking
        tokio::task::spawn_blocking(move || Self::unpack_all(&packages))
            .await
            .map_err(|e| UnpackError::Task(e.to_string()))?
    }
}
