//! Shared test utilities for the installer crate.

#![expect(
    clippy::expect_used,
    reason = "fixture builders panic on setup failure"
)]

use crate::log_sink::ToolOutput;
use crate::patching::PatchRunner;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::process::ExitStatus;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Writes a `.tar.gz` archive at `path` holding regular files.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_tar_gz(path: &Utf8Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create archive");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *contents)
            .expect("append entry");
    }
    let encoder = builder.into_inner().expect("tar finish");
    encoder.finish().expect("gzip finish");
}

/// Writes a `.tar.gz` archive with entry names stored verbatim.
///
/// Unlike [`write_tar_gz`] the names are not validated, so archives with
/// `..` components can be produced.
///
/// # Panics
///
/// Panics if the archive cannot be written or a name exceeds 100 bytes.
pub fn write_tar_gz_entries(path: &Utf8Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create archive");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, contents) in files {
        let mut header = tar::Header::new_old();
        let name_field = &mut header.as_old_mut().name;
        name_field
            .get_mut(..name.len())
            .expect("entry name fits the header")
            .copy_from_slice(name.as_bytes());
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *contents).expect("append entry");
    }
    let encoder = builder.into_inner().expect("tar finish");
    encoder.finish().expect("gzip finish");
}

/// Writes a `.tar.gz` archive whose first entry is the symlink
/// `link -> target`, followed by regular `files`.
///
/// # Panics
///
/// Panics if the archive cannot be written.
pub fn write_tar_gz_with_symlink(
    path: &Utf8Path,
    link: &str,
    target: &str,
    files: &[(&str, &[u8])],
) {
    let file = File::create(path).expect("create archive");
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);
    builder
        .append_link(&mut header, link, target)
        .expect("append symlink");
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *contents)
            .expect("append entry");
    }
    let encoder = builder.into_inner().expect("tar finish");
    encoder.finish().expect("gzip finish");
}

/// How a [`RecordingPatchRunner`] responds to one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The tool runs and exits with status 0.
    Applied,
    /// The tool runs and exits with the given status.
    Rejected(i32),
    /// The tool cannot be launched.
    Missing,
}

/// A stub [`PatchRunner`] that records each patch it is given.
///
/// Outcomes are consumed in order; once exhausted every further invocation
/// reports [`PatchOutcome::Applied`].
#[derive(Debug, Default)]
pub struct RecordingPatchRunner {
    outcomes: RefCell<VecDeque<PatchOutcome>>,
    calls: RefCell<Vec<(String, Utf8PathBuf)>>,
}

impl RecordingPatchRunner {
    /// Creates a runner that answers with `outcomes` in order.
    pub fn new(outcomes: Vec<PatchOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Contents of every patch received, in invocation order.
    pub fn patch_contents(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(contents, _)| contents.clone())
            .collect()
    }

    /// Working directories of every invocation.
    pub fn working_dirs(&self) -> Vec<Utf8PathBuf> {
        self.calls
            .borrow()
            .iter()
            .map(|(_, dir)| dir.clone())
            .collect()
    }

    /// Number of times the tool was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl PatchRunner for RecordingPatchRunner {
    fn tool(&self) -> &str {
        "patch"
    }

    fn run(
        &self,
        mut patch: File,
        source_root: &Utf8Path,
        _output: ToolOutput,
    ) -> std::io::Result<ExitStatus> {
        let outcome = self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or(PatchOutcome::Applied);
        if outcome == PatchOutcome::Missing {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "No such file or directory",
            ));
        }

        let mut contents = String::new();
        patch.read_to_string(&mut contents)?;
        self.calls
            .borrow_mut()
            .push((contents, source_root.to_owned()));

        Ok(match outcome {
            PatchOutcome::Rejected(code) => exit_status(code),
            PatchOutcome::Applied | PatchOutcome::Missing => exit_status(0),
        })
    }
}
