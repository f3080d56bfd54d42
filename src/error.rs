use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fatal errors. Returned before any traversal starts.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scan root is empty")]
    EmptyRoot,

    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid chunk size {0}: must be at least 1")]
    InvalidChunkSize(usize),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why an entry was skipped.
///
/// Every skip is recorded as a [`Diagnostic`]; none of these abort a scan.
#[derive(Error, Debug)]
pub enum SkipReason {
    // Classification
    #[error("not a directory")]
    NotADirectory,

    #[error("path not found")]
    NotFound,

    // Listing
    #[error("permission denied")]
    AccessDenied,

    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("symlink loop")]
    SymlinkLoop,

    // Control
    #[error("scan cancelled")]
    Cancelled,
}

impl SkipReason {
    /// Map an I/O failure onto the skip taxonomy.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::AccessDenied,
            _ => Self::Io(err),
        }
    }

    /// Whether the entry was skipped because of a filesystem failure, as
    /// opposed to a non-directory work item or a cancellation.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::AccessDenied | Self::Io(_) | Self::SymlinkLoop
        )
    }
}

/// A non-fatal anomaly encountered during traversal: the path and the
/// reason it was skipped.
#[derive(Debug)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub reason: SkipReason,
}

impl Diagnostic {
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        Self::new(path, SkipReason::from_io(err))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}
