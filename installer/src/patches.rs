//! Patch discovery for a runtime release.
//!
//! Patches live outside this crate; [`PatchRepository`] returns the ordered
//! list to apply for one version. The bundled [`DirectoryPatchRepository`]
//! keeps them as `<root>/<version>/*.patch` (or `*.diff`) files applied in
//! file-name order.

use crate::version::RuntimeVersion;
use camino::Utf8PathBuf;
use std::io::ErrorKind;

/// File extensions recognised as patches.
const PATCH_EXTENSIONS: [&str; 2] = ["patch", "diff"];

/// Provider of the patches to apply for a release.
#[cfg_attr(test, mockall::automock)]
pub trait PatchRepository {
    /// Return the patch files for `version`, in application order.
    ///
    /// # Errors
    ///
    /// Returns an error when the patch store exists but cannot be read.
    fn patches_for(&self, version: &RuntimeVersion) -> std::io::Result<Vec<Utf8PathBuf>>;
}

/// Patches stored in per-version directories below a root.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use nodevers_installer::patches::{DirectoryPatchRepository, PatchRepository};
/// use nodevers_installer::version::RuntimeVersion;
///
/// let repo = DirectoryPatchRepository::new(Utf8PathBuf::from("/nonexistent/patches"));
/// let version = RuntimeVersion::parse("0.8.28").expect("valid version");
/// assert!(repo.patches_for(&version).expect("missing store is empty").is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPatchRepository {
    root: Utf8PathBuf,
}

impl DirectoryPatchRepository {
    /// Create a repository rooted at `root`.
    #[must_use]
    pub const fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }
}

impl PatchRepository for DirectoryPatchRepository {
    fn patches_for(&self, version: &RuntimeVersion) -> std::io::Result<Vec<Utf8PathBuf>> {
        let dir = self.root.join(version.as_str());
        let entries = match dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut patches = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let is_patch = entry
                .path()
                .extension()
                .is_some_and(|ext| PATCH_EXTENSIONS.contains(&ext));
            if is_patch {
                patches.push(entry.into_path());
            }
        }
        patches.sort();
        Ok(patches)
    }
}
