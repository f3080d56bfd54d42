use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use ignore::{DirEntry, WalkBuilder, WalkState};
use tracing::{debug, info};

use crate::engine::{classify_root, EngineOptions};
use crate::entry::{DirChild, DiscoveredFile, EntryKind};
use crate::error::{Diagnostic, SkipReason};
use crate::results::{ScanResults, ScanStats};
use crate::traits::OsFileSystem;

// ---------------------------------------------------------------------------
// run()
// ---------------------------------------------------------------------------

/// Execute a multi-threaded scan of the host filesystem.
///
/// Directory listing is spread across `threads` workers. Matches and
/// diagnostics are pushed into shared collectors, so their order depends
/// on scheduling; the set is the same as a sequential scan's.
pub(crate) fn run(root: PathBuf, threads: usize, opts: &EngineOptions) -> ScanResults {
    let start = Instant::now();

    let (root_kind, diagnostic) = classify_root(&OsFileSystem, &root);
    if let Some(d) = diagnostic {
        debug!(path = %d.path.display(), reason = %d.reason, "skipping scan root");
        return ScanResults {
            root,
            root_kind,
            files: Vec::new(),
            diagnostics: vec![d],
            completed: true,
            stats: ScanStats {
                duration: start.elapsed(),
                ..ScanStats::default()
            },
        };
    }

    let mut builder = WalkBuilder::new(&root);
    builder
        .standard_filters(false)
        .ignore(false)
        .parents(false)
        .hidden(false)
        .follow_links(opts.follow_links)
        .same_file_system(false)
        .threads(threads);

    let walker = builder.build_parallel();

    // Shared state across threads
    let files       = Arc::new(AtomicUsize::new(0));
    let dirs        = Arc::new(AtomicUsize::new(0));
    let cancelled   = Arc::new(AtomicBool::new(false));
    let found       = Arc::new(Mutex::new(Vec::<DiscoveredFile>::new()));
    let diagnostics = Arc::new(Mutex::new(Vec::<Diagnostic>::new()));

    walker.run(|| {
        let matcher     = Arc::clone(&opts.matcher);
        let cancel      = opts.cancel.clone();
        let files       = Arc::clone(&files);
        let dirs        = Arc::clone(&dirs);
        let cancelled   = Arc::clone(&cancelled);
        let found       = Arc::clone(&found);
        let diagnostics = Arc::clone(&diagnostics);

        Box::new(move |res: Result<DirEntry, ignore::Error>| -> WalkState {
            if cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                cancelled.store(true, Ordering::Relaxed);
                return WalkState::Quit;
            }

            let entry = match res {
                Ok(e) => e,
                Err(e) => {
                    let d = map_ignore_error(e, None);
                    debug!(path = %d.path.display(), reason = %d.reason, "skipping entry");
                    if let Ok(mut diags) = diagnostics.lock() {
                        diags.push(d);
                    }
                    return WalkState::Continue;
                }
            };

            let Some(ft) = entry.file_type() else {
                return WalkState::Continue;
            };

            if ft.is_dir() {
                debug!(path = %entry.path().display(), "visiting directory");
                dirs.fetch_add(1, Ordering::Relaxed);
                return WalkState::Continue;
            }

            files.fetch_add(1, Ordering::Relaxed);

            let child = DirChild::new(entry.path(), EntryKind::File);
            let child = if entry.path_is_symlink() { child.symlink() } else { child };

            if matcher.is_match(&child) {
                if let Ok(mut f) = found.lock() {
                    f.push(DiscoveredFile::new(child.path));
                }
            }

            WalkState::Continue
        })
    });

    let files       = files.load(Ordering::Relaxed);
    let dirs        = dirs.load(Ordering::Relaxed);
    let found       = take_shared(found);
    let mut diagnostics = take_shared(diagnostics);

    let completed = !cancelled.load(Ordering::Relaxed);
    if completed {
        info!(
            root = %root.display(),
            matches = found.len(),
            skipped = diagnostics.len(),
            "scan complete"
        );
    } else {
        info!(path = %root.display(), "scan cancelled");
        diagnostics.push(Diagnostic::new(root.clone(), SkipReason::Cancelled));
    }

    ScanResults {
        stats: ScanStats {
            dirs,
            files,
            matches: found.len(),
            duration: start.elapsed(),
        },
        root,
        root_kind,
        files: found,
        diagnostics,
        completed,
    }
}

fn take_shared<T>(shared: Arc<Mutex<Vec<T>>>) -> Vec<T> {
    Arc::try_unwrap(shared)
        .ok()
        .and_then(|m| m.into_inner().ok())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Map ignore::Error to Diagnostic
// ---------------------------------------------------------------------------

fn map_ignore_error(e: ignore::Error, path: Option<PathBuf>) -> Diagnostic {
    let at = |path: Option<PathBuf>| path.unwrap_or_default();
    match e {
        ignore::Error::WithPath { path, err } => map_ignore_error(*err, Some(path)),
        ignore::Error::WithDepth { err, .. } => map_ignore_error(*err, path),
        ignore::Error::Loop { child, .. } => Diagnostic::new(child, SkipReason::SymlinkLoop),
        ignore::Error::Io(io_err) => Diagnostic::io(at(path), io_err),
        other => Diagnostic::new(
            at(path),
            SkipReason::Io(std::io::Error::other(other.to_string())),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn nested_ignore_errors_keep_the_path() {
        let err = ignore::Error::WithDepth {
            depth: 2,
            err: Box::new(ignore::Error::WithPath {
                path: PathBuf::from("/data/locked"),
                err: Box::new(ignore::Error::Io(std::io::Error::from(
                    std::io::ErrorKind::PermissionDenied,
                ))),
            }),
        };
        let d = map_ignore_error(err, None);
        assert_eq!(d.path, Path::new("/data/locked"));
        assert!(matches!(d.reason, SkipReason::AccessDenied));
    }

    #[test]
    fn loops_name_the_child() {
        let err = ignore::Error::Loop {
            ancestor: PathBuf::from("/a"),
            child: PathBuf::from("/a/b/link"),
        };
        let d = map_ignore_error(err, None);
        assert_eq!(d.path, Path::new("/a/b/link"));
        assert!(matches!(d.reason, SkipReason::SymlinkLoop));
    }
}
