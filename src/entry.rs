use std::path::{Path, PathBuf};

/// What a path turned out to be when the scanner looked at it.
///
/// Resolved at visit time and never cached: a path classified as a
/// directory when it was pushed may be `Missing` by the time it is popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory that can be descended into.
    Directory,

    /// Anything that is not a directory (regular files, and symlinks when
    /// links are not followed).
    File,

    /// Does not exist, or an error masked its type.
    Missing,
}

/// One direct child of a directory, as reported by a
/// [`FileSystem`](crate::traits::FileSystem) listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirChild {
    /// Full path to the child.
    pub path: PathBuf,

    /// The child's file name, lossily decoded for display and custom matchers.
    pub name: String,

    /// Directory or not, as seen by the listing.
    pub kind: EntryKind,

    /// Whether the child is a symbolic link. Only consulted when the scan
    /// follows links.
    pub is_symlink: bool,
}

impl DirChild {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            kind,
            is_symlink: false,
        }
    }

    pub fn symlink(mut self) -> Self {
        self.is_symlink = true;
        self
    }
}

/// A file whose name matched the scan pattern.
///
/// Immutable once emitted. Paths are unique within one scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscoveredFile {
    pub path: PathBuf,
}

impl DiscoveredFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
