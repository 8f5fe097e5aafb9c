//! Runtime release version newtype.
//!
//! Validates that a requested version is a plain `MAJOR.MINOR.PATCH`
//! triple of decimal components, the shape used by the distribution
//! server's `v<version>` release directories. A single leading `v` is
//! accepted and stripped so `v18.19.0` and `18.19.0` name the same release.

use std::fmt;
use thiserror::Error;

/// Number of dot-separated components in a release version.
const COMPONENTS: usize = 3;

/// Errors arising from malformed version strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The version string is empty (after trimming a leading `v`).
    #[error("version must not be empty")]
    Empty,

    /// The version string is not a `MAJOR.MINOR.PATCH` triple.
    #[error("invalid version \"{value}\": {reason}")]
    Malformed {
        /// The rejected version string.
        value: String,
        /// Description of the validation failure.
        reason: String,
    },
}

/// A validated runtime release version such as `18.19.0`.
///
/// # Examples
///
/// ```
/// use nodevers_installer::version::RuntimeVersion;
///
/// let version = RuntimeVersion::parse("v18.19.0").expect("valid version");
/// assert_eq!(version.as_str(), "18.19.0");
/// assert_eq!(version.tag(), "v18.19.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeVersion(String);

impl RuntimeVersion {
    /// Parse and validate a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] when the string is empty or is not three
    /// dot-separated decimal components.
    pub fn parse(value: &str) -> Result<Self, VersionError> {
        let trimmed = value.strip_prefix('v').unwrap_or(value);
        validate_version(trimmed)?;
        Ok(Self(trimmed.to_owned()))
    }

    /// Return the version as a string slice, without the `v` prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the release tag (`v<version>`) used in distribution paths.
    #[must_use]
    pub fn tag(&self) -> String {
        format!("v{}", self.0)
    }
}

impl TryFrom<&str> for RuntimeVersion {
    type Error = VersionError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl AsRef<str> for RuntimeVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn validate_version(value: &str) -> Result<(), VersionError> {
    if value.is_empty() {
        return Err(VersionError::Empty);
    }
    let malformed = |reason: String| VersionError::Malformed {
        value: value.to_owned(),
        reason,
    };

    let parts: Vec<&str> = value.split('.').collect();
    if parts.len() != COMPONENTS {
        return Err(malformed(format!(
            "expected {COMPONENTS} dot-separated components, got {}",
            parts.len()
        )));
    }
    for part in parts {
        if part.is_empty() {
            return Err(malformed("empty component".to_owned()));
        }
        if let Some(bad) = part.chars().find(|c| !c.is_ascii_digit()) {
            return Err(malformed(format!("non-digit character '{bad}'")));
        }
        if part.len() > 1 && part.starts_with('0') {
            return Err(malformed(format!("component \"{part}\" has a leading zero")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::plain("18.19.0", "18.19.0")]
    #[case::tagged("v0.10.48", "0.10.48")]
    #[case::zeroes("0.0.0", "0.0.0")]
    fn accepts_release_triples(#[case] input: &str, #[case] expected: &str) {
        let version = RuntimeVersion::parse(input).expect("valid version");
        assert_eq!(version.as_str(), expected);
    }

    #[rstest]
    #[case::two_components("18.19")]
    #[case::four_components("18.19.0.1")]
    #[case::empty_component("18..0")]
    #[case::letters("18.x.0")]
    #[case::prerelease("20.0.0-rc.1")]
    #[case::leading_zero("18.09.0")]
    #[case::double_prefix("vv18.19.0")]
    fn rejects_malformed_versions(#[case] input: &str) {
        let result = RuntimeVersion::parse(input);
        assert!(
            matches!(result, Err(VersionError::Malformed { .. })),
            "expected Malformed for {input}, got {result:?}"
        );
    }

    #[rstest]
    #[case::empty("")]
    #[case::bare_prefix("v")]
    fn rejects_empty_versions(#[case] input: &str) {
        assert_eq!(RuntimeVersion::parse(input), Err(VersionError::Empty));
    }

    #[test]
    fn tag_adds_prefix() {
        let version = RuntimeVersion::parse("16.20.2").expect("valid version");
        assert_eq!(version.tag(), "v16.20.2");
        assert_eq!(format!("{version}"), "16.20.2");
    }
}
