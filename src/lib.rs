//! # dcmscan
//!
//! Find DICOM files under a directory tree and read their identifying tags.
//!
//! The core is a directory scanner: given a root and a file-name glob, it
//! walks the tree with an explicit work list (no recursion, so depth is not
//! bounded by the call stack) and returns every matching file. Directories
//! that cannot be read are skipped and reported as [`Diagnostic`]s; a
//! single unreadable subtree never aborts the scan.
//!
//! Around the scanner sit two collaborators: [`dicom`] decodes a fixed set
//! of tags from DICOM Part 10 files, and [`store`] accepts documents for
//! storage.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dcmscan::dicom::{Part10Reader, TagReader, DEFAULT_TAGS};
//!
//! let results = dcmscan::scan("/data/incoming")
//!     .pattern("*.dcm")
//!     .run()
//!     .unwrap();
//!
//! for file in &results.files {
//!     let values = Part10Reader.read_tags(file.path(), DEFAULT_TAGS).unwrap();
//!     println!("{}: {:?}", file.path.display(), values);
//! }
//! for skipped in &results.diagnostics {
//!     eprintln!("skipped {skipped}");
//! }
//! ```
//!
//! # Chunked scans
//!
//! Very large trees can be consumed in bounded pieces:
//!
//! ```rust,no_run
//! let chunks = dcmscan::scan("/archive").chunk_size(1000).chunks().unwrap();
//! for chunk in chunks {
//!     println!("chunk {}: {} files", chunk.index, chunk.files.len());
//! }
//! ```
//!
//! # Custom filesystems and matchers
//!
//! Implement [`FileSystem`] to scan something other than the host
//! filesystem, and [`Matcher`] for matching a glob cannot express.

#![forbid(unsafe_code)]

pub mod config;
pub mod dicom;
pub mod report;
pub mod store;

mod builder;
mod cancel;
mod engine;
mod entry;
mod error;
mod parallel;
mod results;
mod traits;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::{ScanBuilder, DEFAULT_PATTERN};
pub use cancel::CancelToken;
pub use engine::{ChunkedScan, ScanCursor};
pub use entry::{DirChild, DiscoveredFile, EntryKind};
pub use error::{Diagnostic, ScanError, SkipReason};
pub use results::{Chunk, ScanResults, ScanStats};
pub use traits::{FileSystem, Matcher, OsFileSystem};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`ScanBuilder`] rooted at `root`.
///
/// # Example
///
/// ```rust
/// use dcmscan::EntryKind;
///
/// let results = dcmscan::scan("/no/such/scan/root").run().unwrap();
/// assert_eq!(results.root_kind, EntryKind::Missing);
/// assert!(results.files.is_empty());
/// assert_eq!(results.diagnostics.len(), 1);
/// ```
pub fn scan(root: impl Into<std::path::PathBuf>) -> ScanBuilder {
    ScanBuilder::new(root.into())
}
