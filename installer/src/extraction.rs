//! Source archive extraction.
//!
//! Unpacks `.tar.gz` archives into a destination directory with path
//! traversal protection. Failures are split into data failures (the archive
//! is not a valid gzip-compressed tar stream) and local I/O failures so the
//! installer knows when a cached download must be discarded.

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use std::io::ErrorKind;
use std::path::{Component, Path};

/// Trait for extracting source archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// Returns the archive member paths in the order they were unpacked.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Corrupt`] if the archive cannot be read,
    /// [`ExtractionError::PathTraversal`] if any entry attempts to escape
    /// the destination directory, [`ExtractionError::EmptyArchive`] if no
    /// entries are found, and [`ExtractionError::Io`] on local I/O failures.
    fn extract(
        &self,
        archive_path: &Utf8Path,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The archive is not a readable gzip-compressed tar stream.
    #[error("not a valid gzip-compressed tar archive: {0}")]
    Corrupt(#[source] std::io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// The archive contains no entries.
    #[error("archive contains no entries")]
    EmptyArchive,

    /// Local I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl ExtractionError {
    /// Whether the archive itself is unusable and should be discarded.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        !matches!(self, Self::Io(_))
    }

    /// Convert into the underlying I/O error.
    #[must_use]
    pub fn into_io(self) -> std::io::Error {
        match self {
            Self::Io(err) | Self::Corrupt(err) => err,
            other => std::io::Error::new(ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// Default extractor using the `tar` and `flate2` crates.
///
/// Reads the archive as a stream, validating each entry path before
/// unpacking it to guard against path traversal (zip-slip).
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn extract(
        &self,
        archive_path: &Utf8Path,
        dest_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, ExtractionError> {
        let file = std::fs::File::open(archive_path).map_err(ExtractionError::Io)?;
        std::fs::create_dir_all(dest_dir).map_err(ExtractionError::Io)?;
        let root = dest_dir
            .as_std_path()
            .canonicalize()
            .map_err(ExtractionError::Io)?;
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive.set_preserve_permissions(true);
        let mut extracted = Vec::new();

        for entry_result in archive.entries().map_err(classify)? {
            let mut entry = entry_result.map_err(classify)?;
            let entry_path = entry.path().map_err(classify)?.into_owned();
            validate_entry_path(&entry_path)?;
            ensure_within(&root, &entry_path)?;

            let relative = Utf8PathBuf::from_path_buf(entry_path).map_err(|path| {
                ExtractionError::Corrupt(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("non UTF-8 entry path {}", path.display()),
                ))
            })?;

            if !entry.unpack_in(&root).map_err(classify)? {
                return Err(ExtractionError::PathTraversal {
                    path: relative.into_string(),
                });
            }
            extracted.push(relative);
        }

        if extracted.is_empty() {
            return Err(ExtractionError::EmptyArchive);
        }

        Ok(extracted)
    }
}

/// Sort an I/O error raised while reading the archive into a data failure
/// or a local failure.
fn classify(err: std::io::Error) -> ExtractionError {
    match err.kind() {
        ErrorKind::InvalidData | ErrorKind::InvalidInput | ErrorKind::UnexpectedEof => {
            ExtractionError::Corrupt(err)
        }
        // flate2 and tar report malformed headers and checksums as `Other`.
        ErrorKind::Other => ExtractionError::Corrupt(err),
        _ => ExtractionError::Io(err),
    }
}

/// Check that the directory an entry lands in resolves inside `root`.
///
/// Earlier entries may have planted symlinks, so the deepest existing
/// ancestor of the entry's parent is canonicalised and compared.
fn ensure_within(root: &Path, entry_path: &Path) -> Result<(), ExtractionError> {
    let target = root.join(entry_path);
    let Some(parent) = target.parent() else {
        return Ok(());
    };
    let Some(existing) = parent
        .ancestors()
        .find(|ancestor| ancestor.symlink_metadata().is_ok())
    else {
        return Ok(());
    };
    let traversal = || ExtractionError::PathTraversal {
        path: entry_path.display().to_string(),
    };
    let resolved = match existing.canonicalize() {
        Ok(resolved) => resolved,
        // A dangling symlink used as a directory.
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(traversal()),
        Err(e) => return Err(ExtractionError::Io(e)),
    };
    if resolved.starts_with(root) {
        Ok(())
    } else {
        Err(traversal())
    }
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
