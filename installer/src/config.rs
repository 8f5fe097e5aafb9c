//! Installer configuration.
//!
//! `InstallerConfig` names the distribution server, the runtime whose
//! sources are fetched, and the patch tool invocation. Values are
//! deserialised from TOML when the caller supplies a file and fall back to
//! defaults for Node.js otherwise. Locating the file is left to the caller.

use crate::version::RuntimeVersion;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors arising from loading installer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}")]
    Read {
        /// Path to the configuration file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or has unknown keys.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for one installer instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InstallerConfig {
    /// Base URL of the distribution directory, without a trailing slash.
    pub dist_url: String,
    /// Runtime name used in archive and directory names (`node`).
    pub runtime: String,
    /// Executable that applies a patch read from standard input.
    pub patch_program: String,
    /// Extra arguments passed to the patch program.
    pub patch_args: Vec<String>,
    /// Connection timeout for the distribution server, in seconds.
    pub connect_timeout_secs: u64,
}

impl InstallerConfig {
    /// Parse configuration from a TOML document.
    ///
    /// Omitted keys take their default values.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodevers_installer::config::InstallerConfig;
    ///
    /// let config = InstallerConfig::from_toml_str("runtime = \"iojs\"").expect("valid toml");
    /// assert_eq!(config.runtime, "iojs");
    /// assert_eq!(config.patch_program, "patch");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when its contents are invalid.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Directory and archive stem for a release, e.g. `node-v18.19.0`.
    #[must_use]
    pub fn source_dir_name(&self, version: &RuntimeVersion) -> String {
        format!("{}-{}", self.runtime, version.tag())
    }

    /// Archive filename for a release, e.g. `node-v18.19.0.tar.gz`.
    #[must_use]
    pub fn package_filename(&self, version: &RuntimeVersion) -> String {
        format!("{}.tar.gz", self.source_dir_name(version))
    }

    /// Canonical download URL for a release archive.
    ///
    /// # Examples
    ///
    /// ```
    /// use nodevers_installer::config::InstallerConfig;
    /// use nodevers_installer::version::RuntimeVersion;
    ///
    /// let config = InstallerConfig::default();
    /// let version = RuntimeVersion::parse("18.19.0").expect("valid version");
    /// assert_eq!(
    ///     config.archive_url(&version),
    ///     "https://nodejs.org/dist/v18.19.0/node-v18.19.0.tar.gz"
    /// );
    /// ```
    #[must_use]
    pub fn archive_url(&self, version: &RuntimeVersion) -> String {
        format!(
            "{}/{}/{}",
            self.dist_url.trim_end_matches('/'),
            version.tag(),
            self.package_filename(version)
        )
    }

    /// Connection timeout as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            dist_url: "https://nodejs.org/dist".to_owned(),
            runtime: "node".to_owned(),
            patch_program: "patch".to_owned(),
            patch_args: Vec::new(),
            connect_timeout_secs: 30,
        }
    }
}
