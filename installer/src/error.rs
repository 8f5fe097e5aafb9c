//! Error types for the source installer.
//!
//! Each failure is a distinct [`InstallerError`] variant with a message
//! suitable for showing to the user. Callers that only need to decide how
//! to react match on [`InstallerError::kind`], which groups variants into
//! the coarse [`ErrorKind`] categories.

use crate::config::ConfigError;
use crate::version::{RuntimeVersion, VersionError};
use camino::Utf8PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Coarse classification of an [`InstallerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested version string is malformed.
    InvalidVersion,
    /// The distribution server has no archive for the version.
    VersionNotFound,
    /// The distribution server could not be reached.
    NetworkUnavailable,
    /// The archive transfer stopped before completion.
    DownloadIncomplete,
    /// The downloaded archive is not a valid gzip-compressed tarball.
    ArchiveCorrupt,
    /// A required external tool is not installed.
    ToolMissing,
    /// The patch tool rejected a patch.
    PatchFailed,
    /// The installer configuration is invalid.
    Config,
    /// A local filesystem operation failed.
    Io,
}

/// Errors that can occur while preparing runtime sources.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The requested version string is malformed.
    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    /// The distribution server reported the archive as absent.
    #[error("cannot download {url}; is {version} a released version?")]
    VersionNotFound {
        /// The requested version.
        version: RuntimeVersion,
        /// The archive URL that was not found.
        url: String,
    },

    /// The distribution server could not be reached.
    #[error("cannot reach {url} ({reason}); make sure you are connected to the internet")]
    NetworkUnavailable {
        /// The URL being requested.
        url: String,
        /// Description of the connection failure.
        reason: String,
    },

    /// The archive transfer stopped before completion.
    #[error("the download of {url} was interrupted after {received} bytes")]
    DownloadIncomplete {
        /// The URL being downloaded.
        url: String,
        /// Bytes received before the transfer stopped.
        received: u64,
        /// Bytes the server advertised, when known.
        expected: Option<u64>,
    },

    /// The downloaded archive is corrupt and has been deleted.
    #[error("{path} is corrupted: {reason}")]
    ArchiveCorrupt {
        /// Path of the deleted archive.
        path: Utf8PathBuf,
        /// Description of the validation failure.
        reason: String,
    },

    /// The patch tool could not be launched.
    #[error("{tool} is missing; install it and try again")]
    ToolMissing {
        /// Name of the missing tool.
        tool: String,
        /// The error raised when launching the tool.
        #[source]
        source: std::io::Error,
    },

    /// The patch tool exited unsuccessfully.
    #[error("patching has failed: {patch} was rejected ({status})")]
    PatchFailed {
        /// The patch that failed to apply.
        patch: Utf8PathBuf,
        /// Exit status of the patch tool.
        status: ExitStatus,
    },

    /// The patch list for a version could not be read.
    #[error("failed to list patches for {version}")]
    PatchList {
        /// The version whose patches were requested.
        version: RuntimeVersion,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A patch file could not be opened.
    #[error("failed to read patch {path}")]
    PatchRead {
        /// Path of the patch file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No scratch directory is available.
    #[error("no scratch directory available: {reason}")]
    ScratchDir {
        /// Description of why the directory could not be provided.
        reason: String,
    },

    /// The archive did not contain the expected top-level directory.
    #[error("expected source directory {path} after extraction")]
    UnexpectedLayout {
        /// The directory that was expected.
        path: Utf8PathBuf,
    },

    /// The installer configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallerError {
    /// The coarse category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodevers_installer::error::{ErrorKind, InstallerError};
    /// use nodevers_installer::version::RuntimeVersion;
    ///
    /// let err = InstallerError::from(RuntimeVersion::parse("latest").unwrap_err());
    /// assert_eq!(err.kind(), ErrorKind::InvalidVersion);
    /// ```
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidVersion(_) => ErrorKind::InvalidVersion,
            Self::VersionNotFound { .. } => ErrorKind::VersionNotFound,
            Self::NetworkUnavailable { .. } => ErrorKind::NetworkUnavailable,
            Self::DownloadIncomplete { .. } => ErrorKind::DownloadIncomplete,
            Self::ArchiveCorrupt { .. } => ErrorKind::ArchiveCorrupt,
            Self::ToolMissing { .. } => ErrorKind::ToolMissing,
            Self::PatchFailed { .. } => ErrorKind::PatchFailed,
            Self::Config(_) => ErrorKind::Config,
            Self::PatchList { .. }
            | Self::PatchRead { .. }
            | Self::ScratchDir { .. }
            | Self::UnexpectedLayout { .. }
            | Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::exit_status;

    fn version() -> RuntimeVersion {
        RuntimeVersion::parse("0.10.48").expect("valid version")
    }

    #[test]
    fn version_not_found_names_the_archive() {
        let err = InstallerError::VersionNotFound {
            version: version(),
            url: "https://nodejs.org/dist/v0.10.48/node-v0.10.48.tar.gz".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("node-v0.10.48.tar.gz"));
        assert_eq!(err.kind(), ErrorKind::VersionNotFound);
    }

    #[test]
    fn network_unavailable_suggests_checking_connection() {
        let err = InstallerError::NetworkUnavailable {
            url: "https://nodejs.org/dist".to_owned(),
            reason: "connection refused".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("connected to the internet"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn download_incomplete_mentions_interruption() {
        let err = InstallerError::DownloadIncomplete {
            url: "https://nodejs.org/dist".to_owned(),
            received: 512,
            expected: Some(4096),
        };
        assert!(err.to_string().contains("interrupted"));
        assert_eq!(err.kind(), ErrorKind::DownloadIncomplete);
    }

    #[test]
    fn archive_corrupt_names_the_file() {
        let err = InstallerError::ArchiveCorrupt {
            path: Utf8PathBuf::from("/tmp/node-v0.10.48.tar.gz"),
            reason: "invalid gzip header".to_owned(),
        };
        assert!(err.to_string().contains("node-v0.10.48.tar.gz is corrupted"));
    }

    #[test]
    fn tool_missing_preserves_source() {
        let err = InstallerError::ToolMissing {
            tool: "patch".to_owned(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("patch is missing"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.kind(), ErrorKind::ToolMissing);
    }

    #[test]
    fn patch_failed_reports_patch_and_status() {
        let err = InstallerError::PatchFailed {
            patch: Utf8PathBuf::from("/patches/0.10.48/01-openssl.patch"),
            status: exit_status(1),
        };
        let msg = err.to_string();
        assert!(msg.contains("patching has failed"));
        assert!(msg.contains("01-openssl.patch"));
        assert_eq!(err.kind(), ErrorKind::PatchFailed);
    }

    #[test]
    fn local_failures_are_io_kind() {
        let layout = InstallerError::UnexpectedLayout {
            path: Utf8PathBuf::from("/tmp/node-v0.10.48"),
        };
        let list = InstallerError::PatchList {
            version: version(),
            source: std::io::Error::other("permission denied"),
        };
        assert_eq!(layout.kind(), ErrorKind::Io);
        assert_eq!(list.kind(), ErrorKind::Io);
    }
}
