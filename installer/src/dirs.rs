//! Directory resolution for the nodevers prefix and scratch space.
//!
//! The installer needs two locations it does not own: a scratch directory
//! for downloads and extraction, and the nodevers prefix under which the
//! attempt log lives. Both are resolved through [`BaseDirs`] so tests can
//! point them at temporary directories.

use camino::Utf8PathBuf;

/// Name of the prefix directory created under the user's home.
const PREFIX_DIR_NAME: &str = ".nodevers";

/// Provider of the directories an install attempt works in.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The nodevers prefix, if one can be determined.
    fn prefix(&self) -> Option<Utf8PathBuf>;

    /// A writable scratch directory, created if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    fn scratch_dir(&self) -> std::io::Result<Utf8PathBuf>;
}

/// Directories rooted at `~/.nodevers`.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use nodevers_installer::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs::with_prefix(Utf8PathBuf::from("/opt/nodevers"));
/// assert_eq!(dirs.prefix(), Some(Utf8PathBuf::from("/opt/nodevers")));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemBaseDirs {
    prefix: Utf8PathBuf,
}

impl SystemBaseDirs {
    /// Resolve the prefix from the current user's home directory.
    ///
    /// Returns `None` when no home directory is known or it is not UTF-8.
    #[must_use]
    pub fn new() -> Option<Self> {
        let base = directories_next::BaseDirs::new()?;
        let home = Utf8PathBuf::from_path_buf(base.home_dir().to_path_buf()).ok()?;
        Some(Self::with_prefix(home.join(PREFIX_DIR_NAME)))
    }

    /// Use an explicit prefix instead of the home directory.
    #[must_use]
    pub const fn with_prefix(prefix: Utf8PathBuf) -> Self {
        Self { prefix }
    }
}

impl BaseDirs for SystemBaseDirs {
    fn prefix(&self) -> Option<Utf8PathBuf> {
        Some(self.prefix.clone())
    }

    fn scratch_dir(&self) -> std::io::Result<Utf8PathBuf> {
        let dir = self.prefix.join("tmp");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_prefix() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, path)
    }

    #[test]
    fn new_uses_home_directory() {
        let (_temp, home) = temp_prefix();
        let dirs = temp_env::with_var("HOME", Some(home.as_str()), SystemBaseDirs::new)
            .expect("home directory");
        assert_eq!(dirs.prefix(), Some(home.join(".nodevers")));
    }

    #[test]
    fn scratch_dir_is_created_under_prefix() {
        let (_temp, root) = temp_prefix();
        let dirs = SystemBaseDirs::with_prefix(root.join("nested"));
        let scratch = dirs.scratch_dir().expect("scratch dir");
        assert_eq!(scratch, root.join("nested").join("tmp"));
        assert!(scratch.is_dir());
    }

    #[test]
    fn scratch_dir_fails_when_prefix_is_a_file() {
        let (_temp, root) = temp_prefix();
        let occupied = root.join("occupied");
        std::fs::write(&occupied, b"file").expect("write file");
        let dirs = SystemBaseDirs::with_prefix(occupied);
        assert!(dirs.scratch_dir().is_err());
    }
}
