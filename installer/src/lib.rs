//! nodevers source installer library.
//!
//! This crate prepares a Node.js release for a from-source build: it checks
//! that the release exists on the distribution server, downloads its source
//! archive, unpacks it, and applies any patches registered for the version.
//! Compiling and installing the prepared tree is left to the caller.
//!
//! # Modules
//!
//! - [`config`] - Installer settings loaded from TOML
//! - [`dirs`] - Scratch and prefix directory resolution
//! - [`download`] - Probing and fetching archives over HTTP
//! - [`error`] - Error taxonomy with user-facing messages
//! - [`extraction`] - Gzip-compressed tarball extraction
//! - [`log_sink`] - Log destination for external tool output
//! - [`patches`] - Discovery of per-version patch files
//! - [`patching`] - Applying patches with an external tool
//! - [`pipeline`] - The staged source preparation flow
//! - [`version`] - Runtime version validation

pub mod config;
pub mod dirs;
pub mod download;
pub mod error;
pub mod extraction;
pub mod log_sink;
pub mod patches;
pub mod patching;
pub mod pipeline;
pub mod version;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
