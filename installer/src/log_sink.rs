//! Destination for external tool output during an install attempt.
//!
//! The sink writes to the nodevers log file when it can be opened and
//! otherwise swallows everything. Opening never fails: an unwritable log
//! location degrades to the discard sink.

use camino::{Utf8Path, Utf8PathBuf};
use log::warn;
use std::fs::{File, OpenOptions};
use std::io;
use std::process::Stdio;

/// Where patch tool output is written for one install attempt.
///
/// The file, if any, is closed when the sink is dropped.
#[derive(Debug)]
pub enum LogSink {
    /// Output is written to a log file.
    File {
        /// Location of the log file.
        path: Utf8PathBuf,
        /// The open, truncated log file.
        file: File,
    },
    /// Output is dropped.
    Discard,
}

impl LogSink {
    /// Open (and truncate) the log file at `path`, falling back to
    /// [`LogSink::Discard`] when it cannot be created.
    #[must_use]
    pub fn open_or_discard(path: &Utf8Path) -> Self {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
        {
            Ok(file) => Self::File {
                path: path.to_owned(),
                file,
            },
            Err(e) => {
                warn!("cannot open log file {path} ({e}); tool output will be discarded");
                Self::Discard
            }
        }
    }

    /// Path of the backing log file, or `None` for the discard sink.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Discard => None,
        }
    }

    /// Standard output and error handles for one child process.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file handle cannot be duplicated.
    pub fn tool_output(&self) -> io::Result<ToolOutput> {
        Ok(ToolOutput {
            stdout: self.stdio()?,
            stderr: self.stdio()?,
        })
    }

    fn stdio(&self) -> io::Result<Stdio> {
        match self {
            Self::File { file, .. } => Ok(Stdio::from(file.try_clone()?)),
            Self::Discard => Ok(Stdio::null()),
        }
    }
}

/// Output handles for a child process, both backed by the same [`LogSink`].
#[derive(Debug)]
pub struct ToolOutput {
    /// Handle for the child's standard output.
    pub stdout: Stdio,
    /// Handle for the child's standard error.
    pub stderr: Stdio,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("UTF-8 path");
        (temp, path)
    }

    fn run_shell(script: &str, sink: &LogSink) {
        let output = sink.tool_output().expect("output handles");
        let status = std::process::Command::new("sh")
            .args(["-c", script])
            .stdout(output.stdout)
            .stderr(output.stderr)
            .status()
            .expect("run sh");
        assert!(status.success());
    }

    #[test]
    fn opens_and_truncates_log_file() {
        let (_temp, root) = temp_root();
        let path = root.join("log");
        std::fs::write(&path, b"previous attempt\n").expect("seed log");

        let sink = LogSink::open_or_discard(&path);
        assert_eq!(sink.path(), Some(path.as_path()));
        run_shell("echo patching file src/node.cc", &sink);
        drop(sink);

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(contents, "patching file src/node.cc\n");
    }

    #[test]
    fn unwritable_location_falls_back_to_discard() {
        let (_temp, root) = temp_root();
        let path = root.join("missing-dir").join("log");

        let sink = LogSink::open_or_discard(&path);
        assert!(sink.path().is_none());
        run_shell("echo dropped; echo dropped >&2", &sink);
        assert!(!path.exists());
    }

    #[test]
    fn child_output_reaches_log_file() {
        let (_temp, root) = temp_root();
        let path = root.join("log");
        let sink = LogSink::open_or_discard(&path);
        run_shell("echo to-stdout; echo to-stderr >&2", &sink);
        drop(sink);

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert!(contents.contains("to-stdout"));
        assert!(contents.contains("to-stderr"));
    }
}
