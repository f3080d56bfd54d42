use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::entry::{DirChild, EntryKind};

/// The filesystem the scanner walks.
///
/// The scanner only ever asks two questions: what is this path, and what
/// are its direct children. Implement this to scan something other than the
/// host filesystem, or to inject failures in tests.
///
/// # Thread Safety
///
/// `Send + Sync` are required so a configured builder can be moved to a
/// worker thread.
///
/// # Example
///
/// ```rust
/// use std::io;
/// use std::path::Path;
/// use dcmscan::{DirChild, EntryKind, FileSystem};
///
/// /// A single empty directory.
/// struct Empty;
///
/// impl FileSystem for Empty {
///     fn classify(&self, path: &Path) -> io::Result<EntryKind> {
///         if path == Path::new("/") {
///             Ok(EntryKind::Directory)
///         } else {
///             Ok(EntryKind::Missing)
///         }
///     }
///
///     fn read_dir(&self, _path: &Path) -> io::Result<Vec<DirChild>> {
///         Ok(Vec::new())
///     }
/// }
/// ```
pub trait FileSystem: Send + Sync {
    /// Classify `path`, following symbolic links.
    ///
    /// Return `Ok(EntryKind::Missing)` or an `Err` when the path does not
    /// exist; the scanner records either as a skipped entry.
    fn classify(&self, path: &Path) -> io::Result<EntryKind>;

    /// List the direct children of the directory at `path`.
    ///
    /// Children are classified without following symbolic links; set
    /// [`DirChild::is_symlink`] so the scanner can resolve them when asked
    /// to follow links. A failure part-way through must be returned as an
    /// `Err` rather than a truncated listing.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirChild>>;

    /// Resolve `path` to a canonical form, used for cycle detection when
    /// following links. The default treats every path as already canonical.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }
}

/// The host filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn classify(&self, path: &Path) -> io::Result<EntryKind> {
        let meta = fs::metadata(path)?;
        Ok(if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        })
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirChild>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let ft = entry.file_type()?;
            let kind = if ft.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let child = DirChild::new(entry.path(), kind);
            children.push(if ft.is_symlink() { child.symlink() } else { child });
        }
        Ok(children)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

/// Determines whether a non-directory child is a match.
///
/// The builder installs a glob matcher from `.pattern()`; implement this
/// for anything a glob cannot express.
///
/// # Thread Safety
///
/// `Send + Sync` are required: the parallel engine calls matchers
/// concurrently on different entries.
///
/// # Example
///
/// ```rust
/// use dcmscan::{DirChild, Matcher};
///
/// /// Files without an extension, as some modalities write them.
/// struct NoExtension;
///
/// impl Matcher for NoExtension {
///     fn is_match(&self, entry: &DirChild) -> bool {
///         entry.path.extension().is_none()
///     }
/// }
/// ```
pub trait Matcher: Send + Sync {
    /// Returns `true` if this entry should be included in results.
    fn is_match(&self, entry: &DirChild) -> bool;
}
