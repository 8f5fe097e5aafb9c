//! Patch application through an external tool.
//!
//! Each patch is fed on standard input to a `patch`-style program running
//! in the extracted source tree, with the program's output sent to the
//! attempt's [`LogSink`]. Application stops at the first failure and
//! already-applied patches are left in place.

use crate::error::{InstallerError, Result};
use crate::log_sink::{LogSink, ToolOutput};
use crate::patches::PatchRepository;
use crate::version::RuntimeVersion;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fs::File;
use std::process::{Command, ExitStatus, Stdio};

/// Abstraction for running the patch tool once.
pub trait PatchRunner {
    /// Name of the tool, used in error messages.
    fn tool(&self) -> &str;

    /// Run the tool in `source_root` with `patch` on standard input and
    /// its output streams attached to `output`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the tool cannot be launched; a tool that
    /// runs and fails is reported through the returned [`ExitStatus`].
    fn run(
        &self,
        patch: File,
        source_root: &Utf8Path,
        output: ToolOutput,
    ) -> std::io::Result<ExitStatus>;
}

/// Runs a patch program on the host system.
///
/// # Examples
///
/// ```
/// use nodevers_installer::patching::{PatchRunner, SystemPatchRunner};
///
/// let runner = SystemPatchRunner::new("patch", vec!["-p1".to_owned()]);
/// assert_eq!(runner.tool(), "patch");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPatchRunner {
    program: String,
    args: Vec<String>,
}

impl SystemPatchRunner {
    /// Create a runner for `program` invoked with `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl PatchRunner for SystemPatchRunner {
    fn tool(&self) -> &str {
        &self.program
    }

    fn run(
        &self,
        patch: File,
        source_root: &Utf8Path,
        output: ToolOutput,
    ) -> std::io::Result<ExitStatus> {
        Command::new(&self.program)
            .args(&self.args)
            .current_dir(source_root)
            .stdin(Stdio::from(patch))
            .stdout(output.stdout)
            .stderr(output.stderr)
            .status()
    }
}

/// Apply every patch the repository lists for `version`, in order.
///
/// Returns the patches that were applied. With no patches listed the tool
/// is never started and nothing is written to `log`.
///
/// # Errors
///
/// Returns [`InstallerError::PatchList`] if the patch list cannot be read,
/// [`InstallerError::PatchRead`] if a patch file cannot be opened,
/// [`InstallerError::Io`] if the log cannot be attached to the tool,
/// [`InstallerError::ToolMissing`] if the tool cannot be launched, and
/// [`InstallerError::PatchFailed`] if the tool exits unsuccessfully.
pub fn apply_patches(
    version: &RuntimeVersion,
    source_root: &Utf8Path,
    repository: &dyn PatchRepository,
    runner: &dyn PatchRunner,
    log: &LogSink,
) -> Result<Vec<Utf8PathBuf>> {
    let patches = repository
        .patches_for(version)
        .map_err(|source| InstallerError::PatchList {
            version: version.clone(),
            source,
        })?;
    if patches.is_empty() {
        debug!("no patches for {version}");
        return Ok(patches);
    }

    for patch in &patches {
        apply_patch(patch, source_root, runner, log)?;
    }
    info!("applied {} patch(es) to {source_root}", patches.len());
    Ok(patches)
}

fn apply_patch(
    patch: &Utf8Path,
    source_root: &Utf8Path,
    runner: &dyn PatchRunner,
    log: &LogSink,
) -> Result<()> {
    debug!("applying {patch}");
    let file = File::open(patch).map_err(|source| InstallerError::PatchRead {
        path: patch.to_owned(),
        source,
    })?;
    let output = log.tool_output()?;
    let status = runner
        .run(file, source_root, output)
        .map_err(|source| InstallerError::ToolMissing {
            tool: runner.tool().to_owned(),
            source,
        })?;

    if !status.success() {
        return Err(InstallerError::PatchFailed {
            patch: patch.to_owned(),
            status,
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "patching_tests.rs"]
mod tests;
