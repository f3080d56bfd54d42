use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::entry::{DiscoveredFile, EntryKind};
use crate::error::Diagnostic;

/// The output of a completed (or cancelled) scan.
///
/// `files` arrive in traversal order, which is neither lexicographic nor
/// strictly depth- or breadth-first. Compare as sets.
#[derive(Debug)]
pub struct ScanResults {
    /// The root the scan started from.
    pub root: PathBuf,

    /// What the root turned out to be. `Missing` means the root could not
    /// be classified at all.
    pub root_kind: EntryKind,

    /// Matched files.
    pub files: Vec<DiscoveredFile>,

    /// Every skipped or failed entry, in the order encountered.
    pub diagnostics: Vec<Diagnostic>,

    /// `false` when the scan was cancelled before the work list emptied.
    pub completed: bool,

    pub stats: ScanStats,
}

impl ScanResults {
    pub fn matches(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(DiscoveredFile::path)
    }

    /// `true` when anything was skipped or the scan was cut short.
    pub fn is_partial(&self) -> bool {
        !self.completed || !self.diagnostics.is_empty()
    }
}

/// One group of results from a chunked scan.
#[derive(Debug)]
pub struct Chunk {
    /// Zero-based position of this chunk in the scan.
    pub index: usize,

    /// At most `chunk_size` matched files.
    pub files: Vec<DiscoveredFile>,

    /// Diagnostics recorded while this chunk was being filled.
    pub diagnostics: Vec<Diagnostic>,
}

/// Counters for a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Directories listed.
    pub dirs: usize,

    /// Non-directory entries encountered, matched or not.
    pub files: usize,

    /// Entries that matched the pattern.
    pub matches: usize,

    /// Wall-clock time from scan start to completion.
    pub duration: Duration,
}

impl ScanStats {
    /// Entries examined per second, `0` on zero-duration runs.
    pub fn entries_per_sec(&self) -> usize {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            ((self.files + self.dirs) as f64 / secs) as usize
        } else {
            0
        }
    }
}
