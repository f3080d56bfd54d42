use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::entry::{DiscoveredFile, EntryKind};
use crate::error::{Diagnostic, SkipReason};
use crate::results::{Chunk, ScanResults, ScanStats};
use crate::traits::{FileSystem, Matcher};

// ---------------------------------------------------------------------------
// Engine options
// ---------------------------------------------------------------------------

/// Internal options passed from the builder to the engines.
#[derive(Clone)]
pub(crate) struct EngineOptions {
    pub filesystem:   Arc<dyn FileSystem>,
    pub matcher:      Arc<dyn Matcher>,
    pub follow_links: bool,
    pub cancel:       Option<CancelToken>,
}

impl EngineOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

// ---------------------------------------------------------------------------
// Root classification
// ---------------------------------------------------------------------------

/// Classify the scan root, following links.
///
/// Anything other than a directory yields the diagnostic that stands in for
/// the whole scan.
pub(crate) fn classify_root(fs: &dyn FileSystem, root: &Path) -> (EntryKind, Option<Diagnostic>) {
    match fs.classify(root) {
        Ok(EntryKind::Directory) => (EntryKind::Directory, None),
        Ok(EntryKind::File) => (
            EntryKind::File,
            Some(Diagnostic::new(root, SkipReason::NotADirectory)),
        ),
        Ok(EntryKind::Missing) => (
            EntryKind::Missing,
            Some(Diagnostic::new(root, SkipReason::NotFound)),
        ),
        Err(e) => (EntryKind::Missing, Some(Diagnostic::io(root, e))),
    }
}

// ---------------------------------------------------------------------------
// ScanCursor
// ---------------------------------------------------------------------------

/// The resumable state of a sequential scan.
///
/// Holds the work list of directories still to visit and any matches that
/// have been found but not yet handed out. A cursor only ever moves
/// forward; once [`is_exhausted`](ScanCursor::is_exhausted) it yields
/// nothing more.
#[derive(Debug)]
pub struct ScanCursor {
    root:        PathBuf,
    root_kind:   EntryKind,
    stack:       Vec<PathBuf>,
    pending:     VecDeque<DiscoveredFile>,
    diagnostics: Vec<Diagnostic>,
    visited:     HashSet<PathBuf>,
    stats:       ScanStats,
    elapsed:     Duration,
    cancelled:   bool,
}

impl ScanCursor {
    pub(crate) fn new(fs: &dyn FileSystem, root: PathBuf) -> Self {
        let (root_kind, diagnostic) = classify_root(fs, &root);
        let mut stack = Vec::new();
        let mut diagnostics = Vec::new();
        match diagnostic {
            Some(d) => {
                debug!(path = %d.path.display(), reason = %d.reason, "skipping scan root");
                diagnostics.push(d);
            }
            None => stack.push(root.clone()),
        }

        Self {
            root,
            root_kind,
            stack,
            pending: VecDeque::new(),
            diagnostics,
            visited: HashSet::new(),
            stats: ScanStats::default(),
            elapsed: Duration::ZERO,
            cancelled: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_kind(&self) -> EntryKind {
        self.root_kind
    }

    /// Directories still waiting to be visited.
    pub fn remaining(&self) -> &[PathBuf] {
        &self.stack
    }

    /// Matches found but not yet returned.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// `true` once there is nothing left to visit or hand out.
    pub fn is_exhausted(&self) -> bool {
        (self.stack.is_empty() || self.cancelled)
            && self.pending.is_empty()
            && self.diagnostics.is_empty()
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            duration: self.elapsed,
            ..self.stats.clone()
        }
    }

    // ── Traversal ─────────────────────────────────────────────────────────

    /// Pop and visit one directory. Returns `false` when there was nothing
    /// to do, either because the work list is empty or the scan was
    /// cancelled.
    fn step(&mut self, opts: &EngineOptions) -> bool {
        if self.cancelled {
            return false;
        }
        let Some(next) = self.stack.last() else {
            return false;
        };

        if opts.is_cancelled() {
            info!(path = %next.display(), "scan cancelled");
            self.diagnostics.push(Diagnostic::new(next.clone(), SkipReason::Cancelled));
            self.cancelled = true;
            return false;
        }

        if let Some(dir) = self.stack.pop() {
            self.visit(opts, dir);
        }
        true
    }

    fn visit(&mut self, opts: &EngineOptions, dir: PathBuf) {
        let fs = opts.filesystem.as_ref();

        // The path was pushed as a directory; it may have changed since.
        match fs.classify(&dir) {
            Ok(EntryKind::Directory) => {}
            Ok(EntryKind::File) => return self.skip(dir, SkipReason::NotADirectory),
            Ok(EntryKind::Missing) => return self.skip(dir, SkipReason::NotFound),
            Err(e) => return self.skip(dir, SkipReason::from_io(e)),
        }

        if opts.follow_links {
            match fs.canonicalize(&dir) {
                Ok(real) => {
                    if !self.visited.insert(real) {
                        return self.skip(dir, SkipReason::SymlinkLoop);
                    }
                }
                Err(e) => return self.skip(dir, SkipReason::from_io(e)),
            }
        }

        let children = match fs.read_dir(&dir) {
            Ok(children) => children,
            Err(e) => return self.skip(dir, SkipReason::from_io(e)),
        };

        debug!(path = %dir.display(), children = children.len(), "visiting directory");
        self.stats.dirs += 1;

        let mut subdirs = Vec::new();
        for child in children {
            let kind = if child.is_symlink && opts.follow_links {
                match fs.classify(&child.path) {
                    Ok(EntryKind::Missing) => {
                        self.skip(child.path, SkipReason::NotFound);
                        continue;
                    }
                    Ok(kind) => kind,
                    Err(e) => {
                        self.skip(child.path, SkipReason::from_io(e));
                        continue;
                    }
                }
            } else {
                child.kind
            };

            if kind == EntryKind::Directory {
                subdirs.push(child.path);
                continue;
            }

            self.stats.files += 1;
            if opts.matcher.is_match(&child) {
                self.stats.matches += 1;
                self.pending.push_back(DiscoveredFile::new(child.path));
            }
        }
        self.stack.extend(subdirs);
    }

    fn skip(&mut self, path: PathBuf, reason: SkipReason) {
        debug!(path = %path.display(), %reason, "skipping entry");
        self.diagnostics.push(Diagnostic::new(path, reason));
    }

    // ── Draining ──────────────────────────────────────────────────────────

    /// Visit directories until at least `want` matches are pending or the
    /// work list is done, then hand out up to `want` of them.
    pub(crate) fn next_chunk(&mut self, opts: &EngineOptions, want: usize, index: usize) -> Option<Chunk> {
        let start = Instant::now();
        while self.pending.len() < want && self.step(opts) {}
        self.elapsed += start.elapsed();

        if self.pending.is_empty() && self.diagnostics.is_empty() {
            return None;
        }

        let take = want.min(self.pending.len());
        Some(Chunk {
            index,
            files: self.pending.drain(..take).collect(),
            diagnostics: std::mem::take(&mut self.diagnostics),
        })
    }

    /// Visit everything that is left and return the combined result.
    pub(crate) fn drain(mut self, opts: &EngineOptions) -> ScanResults {
        let start = Instant::now();
        while self.step(opts) {}
        self.elapsed += start.elapsed();

        let completed = !self.cancelled;
        if completed {
            info!(
                root = %self.root.display(),
                matches = self.stats.matches,
                skipped = self.diagnostics.len(),
                "scan complete"
            );
        }

        let stats = self.stats();
        ScanResults {
            root: self.root,
            root_kind: self.root_kind,
            files: self.pending.into_iter().collect(),
            diagnostics: self.diagnostics,
            completed,
            stats,
        }
    }
}

// ---------------------------------------------------------------------------
// ChunkedScan
// ---------------------------------------------------------------------------

/// A scan that hands out results in groups of at most `chunk_size` files.
///
/// Created by [`ScanBuilder::chunks`](crate::ScanBuilder::chunks). Dropping
/// it part-way is fine; [`cursor`](ChunkedScan::cursor) shows what is left.
pub struct ChunkedScan {
    opts:       EngineOptions,
    cursor:     ScanCursor,
    chunk_size: usize,
    next_index: usize,
}

impl ChunkedScan {
    pub(crate) fn new(opts: EngineOptions, cursor: ScanCursor, chunk_size: usize) -> Self {
        Self {
            opts,
            cursor,
            chunk_size,
            next_index: 0,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn cursor(&self) -> &ScanCursor {
        &self.cursor
    }

    /// Give up on chunking and drain the rest in one go.
    pub fn finish(self) -> ScanResults {
        self.cursor.drain(&self.opts)
    }
}

impl Iterator for ChunkedScan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let chunk = self
            .cursor
            .next_chunk(&self.opts, self.chunk_size, self.next_index)?;
        self.next_index += 1;
        Some(chunk)
    }
}

// ---------------------------------------------------------------------------
// run()
// ---------------------------------------------------------------------------

/// Execute a sequential scan over `root`, draining the work list.
pub(crate) fn run(root: PathBuf, opts: &EngineOptions) -> ScanResults {
    ScanCursor::new(opts.filesystem.as_ref(), root).drain(opts)
}
