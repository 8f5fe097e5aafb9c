//! Source archive download.
//!
//! Provides a trait-based abstraction over the distribution server so the
//! installer can probe for a release and stream its archive to disk, and so
//! tests can replace HTTP with mocks.

use camino::Utf8Path;
use log::debug;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Size of the buffer used when streaming a response body to disk.
const COPY_BUFFER_LEN: usize = 64 * 1024;

/// Trait for reaching release archives on the distribution server.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveFetcher {
    /// Check that `url` exists without downloading its body.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NotFound`] when the server reports the
    /// archive as absent and [`DownloadError::Network`] for any other
    /// failure to reach it.
    fn probe(&self, url: &str) -> Result<(), DownloadError>;

    /// Download `url` into the file at `dest`, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Interrupted`] when the transfer ends short,
    /// [`DownloadError::Network`] on connection failures, and
    /// [`DownloadError::Io`] when the file cannot be written.
    fn fetch(&self, url: &str, dest: &Utf8Path) -> Result<u64, DownloadError>;
}

/// Errors arising from archive download operations.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The requested archive was not found (HTTP 404 or 410).
    #[error("archive not found: {url}")]
    NotFound {
        /// The URL that was requested.
        url: String,
    },

    /// The server could not be reached or answered unexpectedly.
    #[error("request to {url} failed: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The response body ended before the advertised length.
    #[error("download of {url} stopped after {received} bytes")]
    Interrupted {
        /// The URL that was requested.
        url: String,
        /// Bytes received before the transfer stopped.
        received: u64,
        /// Bytes the server advertised, when known.
        expected: Option<u64>,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP-based fetcher using `ureq`.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Build a fetcher whose connections time out after `connect_timeout`.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(connect_timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn probe(&self, url: &str) -> Result<(), DownloadError> {
        debug!("probing {url}");
        self.agent
            .head(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        Ok(())
    }

    fn fetch(&self, url: &str, dest: &Utf8Path) -> Result<u64, DownloadError> {
        debug!("downloading {url} to {dest}");
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(url, &e))?;
        let expected = response
            .headers()
            .get(ureq::http::header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());

        let mut body = response.into_body();
        let mut file = std::fs::File::create(dest)?;
        let received = copy_body(url, &mut body.as_reader(), &mut file, expected)?;
        file.flush()?;
        Ok(received)
    }
}

/// Stream `reader` into `writer`, separating transfer failures from local
/// write failures and checking the advertised length.
fn copy_body(
    url: &str,
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    expected: Option<u64>,
) -> Result<u64, DownloadError> {
    let mut buffer = vec![0_u8; COPY_BUFFER_LEN];
    let mut received: u64 = 0;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_read_error(url, &e, received, expected)),
        };
        let chunk = buffer.get(..read).unwrap_or_default();
        writer.write_all(chunk)?;
        received += read as u64;
    }

    match expected {
        Some(total) if received < total => Err(DownloadError::Interrupted {
            url: url.to_owned(),
            received,
            expected,
        }),
        _ => Ok(received),
    }
}

/// A body stream that fails once bytes are owed is an interrupted
/// transfer; without an advertised length only dropped connections are.
fn classify_read_error(
    url: &str,
    err: &std::io::Error,
    received: u64,
    expected: Option<u64>,
) -> DownloadError {
    let dropped = matches!(
        err.kind(),
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    );
    if dropped || expected.is_some_and(|total| received < total) {
        DownloadError::Interrupted {
            url: url.to_owned(),
            received,
            expected,
        }
    } else {
        DownloadError::Network {
            url: url.to_owned(),
            reason: err.to_string(),
        }
    }
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404 | 410) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::StatusCode(code) => DownloadError::Network {
            url: url.to_owned(),
            reason: format!("server responded with status {code}"),
        },
        other => DownloadError::Network {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    const URL: &str = "https://example.test/dist/v1.0.0/node-v1.0.0.tar.gz";

    /// A reader that yields its bytes and then fails with `kind`.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
        kind: ErrorKind,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::new(self.kind, "stream failed")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn copy_body_writes_all_bytes() {
        let mut reader = Cursor::new(b"archive bytes".to_vec());
        let mut sink = Vec::new();
        let received = copy_body(URL, &mut reader, &mut sink, Some(13)).expect("copy");
        assert_eq!(received, 13);
        assert_eq!(sink, b"archive bytes");
    }

    #[test]
    fn copy_body_accepts_unknown_length() {
        let mut reader = Cursor::new(vec![7_u8; COPY_BUFFER_LEN * 2 + 1]);
        let mut sink = Vec::new();
        let received = copy_body(URL, &mut reader, &mut sink, None).expect("copy");
        assert_eq!(received, (COPY_BUFFER_LEN * 2 + 1) as u64);
    }

    #[test]
    fn short_body_is_interrupted() {
        let mut reader = Cursor::new(b"partial".to_vec());
        let mut sink = Vec::new();
        let result = copy_body(URL, &mut reader, &mut sink, Some(100));
        assert!(matches!(
            result,
            Err(DownloadError::Interrupted {
                received: 7,
                expected: Some(100),
                ..
            })
        ));
    }

    #[rstest]
    #[case::eof(ErrorKind::UnexpectedEof, None, true)]
    #[case::reset(ErrorKind::ConnectionReset, None, true)]
    #[case::timeout_unknown_length(ErrorKind::TimedOut, None, false)]
    #[case::timeout_owing_bytes(ErrorKind::TimedOut, Some(10), true)]
    #[case::other_unknown_length(ErrorKind::Other, None, false)]
    fn stream_errors_are_classified(
        #[case] kind: ErrorKind,
        #[case] expected: Option<u64>,
        #[case] interrupted: bool,
    ) {
        let mut reader = FailingReader {
            data: Cursor::new(b"abc".to_vec()),
            kind,
        };
        let mut sink = Vec::new();
        let result = copy_body(URL, &mut reader, &mut sink, expected);
        if interrupted {
            assert!(matches!(result, Err(DownloadError::Interrupted { .. })));
        } else {
            assert!(matches!(result, Err(DownloadError::Network { .. })));
        }
    }

    #[rstest]
    #[case::not_found(404)]
    #[case::gone(410)]
    fn map_ureq_error_maps_missing_to_not_found(#[case] status: u16) {
        let err = ureq::Error::StatusCode(status);
        let mapped = map_ureq_error(URL, &err);
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_network() {
        let err = ureq::Error::StatusCode(503);
        let mapped = map_ureq_error(URL, &err);
        assert!(
            matches!(&mapped, DownloadError::Network { reason, .. } if reason.contains("503")),
            "unexpected mapping: {mapped:?}"
        );
    }

    #[test]
    fn map_ureq_error_maps_host_not_found_to_network() {
        let err = ureq::Error::HostNotFound;
        let mapped = map_ureq_error(URL, &err);
        assert!(matches!(mapped, DownloadError::Network { .. }));
    }

    #[test]
    fn probe_reports_unreachable_server() {
        // Port 9 on the loopback interface is the discard service and is
        // closed on test machines, so the connection is refused.
        let fetcher = HttpFetcher::new(Duration::from_secs(2));
        let result = fetcher.probe("http://127.0.0.1:9/dist/v1.0.0/node-v1.0.0.tar.gz");
        assert!(matches!(result, Err(DownloadError::Network { .. })));
    }
}
