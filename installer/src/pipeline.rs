//! Source preparation pipeline.
//!
//! [`SourceInstaller`] drives one install attempt through its fixed stages:
//!
//! 1. construction validates the version and probes the distribution
//!    server before any local state is created;
//! 2. [`SourceInstaller::download_source`] fetches the archive into the
//!    scratch directory, reusing an archive that is already there;
//! 3. [`SourceInstaller::extract_source`] unpacks it, discarding a corrupt
//!    archive so a retry downloads it again;
//! 4. [`SourceInstaller::patch`] applies the release's patches.
//!
//! Each stage returns a value the next stage consumes, so the source tree
//! location is carried explicitly instead of through the process working
//! directory. The compile step is left to the caller, which receives a
//! [`PreparedSource`] from [`SourceInstaller::prepare`].

use crate::config::InstallerConfig;
use crate::dirs::{BaseDirs, SystemBaseDirs};
use crate::download::{ArchiveFetcher, DownloadError, HttpFetcher};
use crate::error::{InstallerError, Result};
use crate::extraction::{ArchiveExtractor, ExtractionError, TarGzExtractor};
use crate::log_sink::LogSink;
use crate::patches::{DirectoryPatchRepository, PatchRepository};
use crate::patching::{PatchRunner, SystemPatchRunner, apply_patches};
use crate::version::RuntimeVersion;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};

/// File name of the attempt log below the nodevers prefix.
const LOG_FILE_NAME: &str = "log";

/// Directory below the nodevers prefix holding per-version patches.
const PATCHES_DIR_NAME: &str = "patches";

/// A request to install one runtime release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// The requested version, e.g. `18.19.0` or `v18.19.0`.
    pub version: String,
    /// Where the build step should install the runtime.
    pub install_path: Utf8PathBuf,
    /// Extra arguments for the build step's configure script.
    pub build_args: Option<Vec<String>>,
}

impl InstallRequest {
    /// Create a request without build arguments.
    pub fn new(version: impl Into<String>, install_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            version: version.into(),
            install_path: install_path.into(),
            build_args: None,
        }
    }

    /// Attach build arguments to the request.
    #[must_use]
    pub fn with_build_args(mut self, build_args: Vec<String>) -> Self {
        self.build_args = Some(build_args);
        self
    }
}

/// The collaborators an install attempt depends on.
pub struct Services {
    /// Reaches the distribution server.
    pub fetcher: Box<dyn ArchiveFetcher>,
    /// Unpacks downloaded archives.
    pub extractor: Box<dyn ArchiveExtractor>,
    /// Provides the scratch directory and nodevers prefix.
    pub dirs: Box<dyn BaseDirs>,
    /// Lists the patches for a version.
    pub patches: Box<dyn PatchRepository>,
    /// Runs the patch tool.
    pub runner: Box<dyn PatchRunner>,
}

impl Services {
    /// Production collaborators rooted at `~/.nodevers`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ScratchDir`] when the home directory cannot
    /// be determined.
    pub fn system(config: &InstallerConfig) -> Result<Self> {
        let dirs = SystemBaseDirs::new().ok_or_else(|| InstallerError::ScratchDir {
            reason: "cannot determine the home directory".to_owned(),
        })?;
        let patches_root = dirs
            .prefix()
            .map(|prefix| prefix.join(PATCHES_DIR_NAME))
            .unwrap_or_default();
        Ok(Self {
            fetcher: Box::new(HttpFetcher::new(config.connect_timeout())),
            extractor: Box::new(TarGzExtractor),
            dirs: Box::new(dirs),
            patches: Box::new(DirectoryPatchRepository::new(patches_root)),
            runner: Box::new(SystemPatchRunner::new(
                config.patch_program.clone(),
                config.patch_args.clone(),
            )),
        })
    }
}

/// An archive present in the scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArchive {
    /// Location of the archive.
    pub path: Utf8PathBuf,
    /// Whether an archive already on disk was reused.
    pub reused: bool,
}

/// An extracted source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTree {
    /// Root of the tree, `<scratch>/<runtime>-v<version>`.
    pub root: Utf8PathBuf,
    /// Archive members, relative to the scratch directory.
    pub members: Vec<Utf8PathBuf>,
}

/// The outcome of the patch stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Patches applied, in order.
    pub applied: Vec<Utf8PathBuf>,
}

/// Everything the build step needs once sources are prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSource {
    /// Root of the patched source tree; the build's working directory.
    pub source_root: Utf8PathBuf,
    /// Where the runtime should be installed.
    pub install_path: Utf8PathBuf,
    /// Extra arguments for the configure script.
    pub build_args: Vec<String>,
}

/// Per-attempt scratch state, owned exclusively by one installer.
#[derive(Debug)]
struct ScratchState {
    tmp_dir: Utf8PathBuf,
    package_filename: String,
    extracted_dir: Utf8PathBuf,
    log: LogSink,
}

/// Fetches, extracts, and patches one runtime release.
pub struct SourceInstaller {
    request: InstallRequest,
    version: RuntimeVersion,
    url: String,
    services: Services,
    scratch: ScratchState,
}

impl SourceInstaller {
    /// Validate the request and probe the distribution server using the
    /// production collaborators.
    ///
    /// # Errors
    ///
    /// See [`SourceInstaller::with_services`].
    pub fn new(request: InstallRequest, config: &InstallerConfig) -> Result<Self> {
        let services = Services::system(config)?;
        Self::with_services(request, config, services)
    }

    /// Validate the request and probe the distribution server.
    ///
    /// The scratch directory and log sink are only acquired once the probe
    /// succeeds. A log file that cannot be opened is replaced by a discard
    /// sink without error.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::InvalidVersion`] for a malformed version,
    /// [`InstallerError::VersionNotFound`] when the archive does not exist,
    /// [`InstallerError::NetworkUnavailable`] when the server cannot be
    /// reached, and [`InstallerError::ScratchDir`] when no scratch directory
    /// is available.
    pub fn with_services(
        request: InstallRequest,
        config: &InstallerConfig,
        services: Services,
    ) -> Result<Self> {
        let version = RuntimeVersion::parse(&request.version)?;
        let url = config.archive_url(&version);
        services
            .fetcher
            .probe(&url)
            .map_err(|e| download_error(&version, e))?;

        let tmp_dir = services
            .dirs
            .scratch_dir()
            .map_err(|e| InstallerError::ScratchDir {
                reason: e.to_string(),
            })?;
        let log = open_log(services.dirs.as_ref());
        let scratch = ScratchState {
            package_filename: config.package_filename(&version),
            extracted_dir: tmp_dir.join(config.source_dir_name(&version)),
            tmp_dir,
            log,
        };
        debug!("prepared scratch state {scratch:?} for {url}");

        Ok(Self {
            request,
            version,
            url,
            services,
            scratch,
        })
    }

    /// The validated version being installed.
    #[must_use]
    pub const fn version(&self) -> &RuntimeVersion {
        &self.version
    }

    /// The archive URL for this release.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The scratch directory used for downloads and extraction.
    #[must_use]
    pub fn scratch_dir(&self) -> &Utf8Path {
        &self.scratch.tmp_dir
    }

    /// The log file receiving patch tool output, if one could be opened.
    #[must_use]
    pub fn log_path(&self) -> Option<&Utf8Path> {
        self.scratch.log.path()
    }

    /// Download the archive into the scratch directory.
    ///
    /// An archive already present under the expected name is reused as is,
    /// without any integrity check.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::DownloadIncomplete`] when the transfer is
    /// cut short, [`InstallerError::NetworkUnavailable`] on connection
    /// failures, and [`InstallerError::Io`] when the file cannot be written.
    pub fn download_source(&self) -> Result<DownloadedArchive> {
        let path = self.scratch.tmp_dir.join(&self.scratch.package_filename);
        if path.exists() {
            info!("reusing {path}");
            return Ok(DownloadedArchive { path, reused: true });
        }

        let bytes = self
            .services
            .fetcher
            .fetch(&self.url, &path)
            .map_err(|e| download_error(&self.version, e))?;
        info!("downloaded {bytes} bytes to {path}");
        Ok(DownloadedArchive {
            path,
            reused: false,
        })
    }

    /// Unpack the archive into the scratch directory.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ArchiveCorrupt`] after deleting the archive
    /// when it is not a valid gzip-compressed tarball,
    /// [`InstallerError::UnexpectedLayout`] when the expected top-level
    /// directory is missing, and [`InstallerError::Io`] on local failures.
    pub fn extract_source(&self, archive: &DownloadedArchive) -> Result<SourceTree> {
        let members = self
            .services
            .extractor
            .extract(&archive.path, &self.scratch.tmp_dir)
            .map_err(|e| extraction_error(&archive.path, e))?;

        let root = self.scratch.extracted_dir.clone();
        if !root.is_dir() {
            return Err(InstallerError::UnexpectedLayout { path: root });
        }
        info!("extracted {} entries into {root}", members.len());
        Ok(SourceTree { root, members })
    }

    /// Apply the release's patches to the extracted tree.
    ///
    /// Stops at the first failing patch; patches applied before it stay
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::PatchFailed`] when the tool rejects a
    /// patch and [`InstallerError::ToolMissing`] when it cannot be started.
    pub fn patch(&self, tree: &SourceTree) -> Result<PatchReport> {
        let applied = apply_patches(
            &self.version,
            &tree.root,
            self.services.patches.as_ref(),
            self.services.runner.as_ref(),
            &self.scratch.log,
        )?;
        Ok(PatchReport { applied })
    }

    /// Run download, extraction, and patching in order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any stage.
    pub fn prepare(&self) -> Result<PreparedSource> {
        let archive = self.download_source()?;
        let tree = self.extract_source(&archive)?;
        self.patch(&tree)?;
        Ok(PreparedSource {
            source_root: tree.root,
            install_path: self.request.install_path.clone(),
            build_args: self.request.build_args.clone().unwrap_or_default(),
        })
    }
}

/// Open the attempt log below the prefix, or discard output when there is
/// no usable prefix.
fn open_log(dirs: &dyn BaseDirs) -> LogSink {
    match dirs.prefix() {
        Some(prefix) => LogSink::open_or_discard(&prefix.join(LOG_FILE_NAME)),
        None => LogSink::Discard,
    }
}

fn download_error(version: &RuntimeVersion, err: DownloadError) -> InstallerError {
    match err {
        DownloadError::NotFound { url } => InstallerError::VersionNotFound {
            version: version.clone(),
            url,
        },
        DownloadError::Network { url, reason } => {
            InstallerError::NetworkUnavailable { url, reason }
        }
        DownloadError::Interrupted {
            url,
            received,
            expected,
        } => InstallerError::DownloadIncomplete {
            url,
            received,
            expected,
        },
        DownloadError::Io(source) => InstallerError::Io(source),
    }
}

/// Convert an extraction failure, deleting the archive when it is corrupt
/// so the next download attempt does not reuse it.
fn extraction_error(archive: &Utf8Path, err: ExtractionError) -> InstallerError {
    if !err.is_corrupt() {
        return InstallerError::Io(err.into_io());
    }
    warn!("removing corrupt archive {archive}: {err}");
    if let Err(e) = std::fs::remove_file(archive) {
        warn!("failed to remove {archive}: {e}");
    }
    InstallerError::ArchiveCorrupt {
        path: archive.to_owned(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
