use std::path::PathBuf;
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};

use crate::cancel::CancelToken;
use crate::engine::{self, ChunkedScan, EngineOptions, ScanCursor};
use crate::entry::DirChild;
use crate::error::ScanError;
use crate::parallel;
use crate::results::ScanResults;
use crate::traits::{FileSystem, Matcher, OsFileSystem};

/// Pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "*.dcm";

// ---------------------------------------------------------------------------
// ScanBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring and executing a scan.
///
/// Created via [`dcmscan::scan()`](crate::scan). Configure with chained
/// builder methods, then call [`run()`](ScanBuilder::run) to drain the whole
/// tree or [`chunks()`](ScanBuilder::chunks) to receive it piecewise.
///
/// # Example
///
/// ```rust,ignore
/// let results = dcmscan::scan("/data/incoming")
///     .pattern("*.dcm")
///     .cancel_token(token)
///     .run()?;
/// ```
pub struct ScanBuilder {
    root:         PathBuf,
    pattern:      String,
    matcher:      Option<Box<dyn Matcher>>,
    filesystem:   Option<Box<dyn FileSystem>>,
    chunk_size:   Option<usize>,
    threads:      usize,
    follow_links: bool,
    cancel:       Option<CancelToken>,
}

impl ScanBuilder {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self {
            root,
            pattern:      DEFAULT_PATTERN.to_string(),
            matcher:      None,
            filesystem:   None,
            chunk_size:   None,
            threads:      1,
            follow_links: false,
            cancel:       None,
        }
    }

    // ── Matching ──────────────────────────────────────────────────────────

    /// Match file names against a glob such as `*.dcm` or `IM_????`.
    ///
    /// Only the file name is matched, never the directory part. Case
    /// sensitivity follows the host platform convention.
    pub fn pattern(mut self, glob: impl Into<String>) -> Self {
        self.pattern = glob.into();
        self
    }

    /// Set a custom matcher. Overrides `.pattern()`.
    pub fn with_matcher(mut self, m: impl Matcher + 'static) -> Self {
        self.matcher = Some(Box::new(m));
        self
    }

    // ── Traversal ─────────────────────────────────────────────────────────

    /// Scan a custom [`FileSystem`] instead of the host filesystem.
    ///
    /// Only the sequential engine can walk a custom filesystem.
    pub fn filesystem(mut self, fs: impl FileSystem + 'static) -> Self {
        self.filesystem = Some(Box::new(fs));
        self
    }

    /// Descend into symlinked directories.
    ///
    /// Off by default, which makes cycles impossible. When on, directories
    /// are tracked by canonical path and a revisit is reported as a
    /// symlink loop.
    pub fn follow_links(mut self, yes: bool) -> Self {
        self.follow_links = yes;
        self
    }

    /// Number of threads listing directories.
    ///
    /// `1` (the default) runs the sequential work-list engine. Anything
    /// higher spreads listing across worker threads; `0` means one per
    /// logical CPU.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    /// Hand results out in groups of at most `n` files.
    ///
    /// Only affects [`chunks()`](ScanBuilder::chunks); `run()` always
    /// drains to completion.
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// Check `token` between directory visits and stop early once it is
    /// cancelled.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Execute the scan and return everything it found.
    ///
    /// Blocks until the work list is empty or the cancel token fires.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for configuration problems detected before any
    /// traversal: an empty root, an invalid glob, a zero chunk size, or a
    /// parallel scan over a custom filesystem. Anything that goes wrong
    /// while walking is recorded in [`ScanResults::diagnostics`].
    pub fn run(self) -> Result<ScanResults, ScanError> {
        let threads = resolve_threads(self.threads);
        let (root, opts) = self.into_options(threads > 1)?;

        if threads > 1 {
            Ok(parallel::run(root, threads, &opts))
        } else {
            Ok(engine::run(root, &opts))
        }
    }

    /// Execute the scan in chunks of at most `chunk_size` files.
    ///
    /// The returned iterator owns the remaining work list; traversal
    /// happens lazily as chunks are pulled.
    ///
    /// # Errors
    ///
    /// Same as [`run()`](ScanBuilder::run), plus `InvalidConfig` when no
    /// chunk size was set or more than one thread was requested.
    pub fn chunks(self) -> Result<ChunkedScan, ScanError> {
        let chunk_size = self
            .chunk_size
            .ok_or_else(|| ScanError::InvalidConfig("chunked scan needs a chunk size".into()))?;
        if resolve_threads(self.threads) > 1 {
            return Err(ScanError::InvalidConfig(
                "chunked scans run on a single thread".into(),
            ));
        }

        let (root, opts) = self.into_options(false)?;
        let cursor = ScanCursor::new(opts.filesystem.as_ref(), root);
        Ok(ChunkedScan::new(opts, cursor, chunk_size))
    }

    fn into_options(self, parallel: bool) -> Result<(PathBuf, EngineOptions), ScanError> {
        if self.root.as_os_str().is_empty() {
            return Err(ScanError::EmptyRoot);
        }
        if let Some(0) = self.chunk_size {
            return Err(ScanError::InvalidChunkSize(0));
        }
        if parallel && self.filesystem.is_some() {
            return Err(ScanError::InvalidConfig(
                "parallel scans only walk the host filesystem".into(),
            ));
        }

        let matcher: Arc<dyn Matcher> = match self.matcher {
            Some(m) => Arc::from(m),
            None    => Arc::new(PatternMatcher::new(&self.pattern)?),
        };
        let filesystem: Arc<dyn FileSystem> = match self.filesystem {
            Some(fs) => Arc::from(fs),
            None     => Arc::new(OsFileSystem),
        };

        let opts = EngineOptions {
            filesystem,
            matcher,
            follow_links: self.follow_links,
            cancel: self.cancel,
        };
        Ok((self.root, opts))
    }
}

// ---------------------------------------------------------------------------
// Built-in matcher
// ---------------------------------------------------------------------------

/// Matches entries whose file name matches a glob.
struct PatternMatcher {
    glob: GlobMatcher,
}

impl PatternMatcher {
    fn new(pattern: &str) -> Result<Self, ScanError> {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(cfg!(any(windows, target_os = "macos")))
            .literal_separator(true)
            .build()
            .map_err(|source| ScanError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            glob: glob.compile_matcher(),
        })
    }
}

impl Matcher for PatternMatcher {
    fn is_match(&self, entry: &DirChild) -> bool {
        self.glob.is_match(entry.path.file_name().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `0` means one thread per logical CPU, with a safe fallback.
fn resolve_threads(n: usize) -> usize {
    if n > 0 {
        return n;
    }
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
