//! Reading a fixed set of tags out of DICOM files.
//!
//! [`TagReader`] is the seam; [`Part10Reader`] is the implementation for
//! files on disk. Only what is needed to reach the requested tags is
//! decoded: no value representation checks, no pixel data, no private
//! dictionaries.

mod reader;
mod tag;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub use reader::{DecodeError, Part10Reader};
pub use tag::{Tag, TagParseError};

/// The fields reported for every discovered file.
pub const DEFAULT_TAGS: &[Tag] = &[
    Tag::PATIENT_ID,
    Tag::SERIES_DESCRIPTION,
    Tag::STUDY_DESCRIPTION,
    Tag::SERIES_NUMBER,
];

/// Extracts named scalar fields from a structured binary document.
pub trait TagReader: Send + Sync {
    /// Read `tags` from the file at `path`.
    ///
    /// Every requested tag appears in the result, in request order, with
    /// `None` for tags the file does not contain.
    fn read_tags(&self, path: &Path, tags: &[Tag]) -> Result<TagValues, TagError>;
}

/// Per-file failures. None of these should stop a batch of reads.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed DICOM file {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("unsupported transfer syntax {uid} in {}", path.display())]
    UnsupportedTransferSyntax { path: PathBuf, uid: String },
}

impl TagError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Malformed { path, .. }
            | Self::UnsupportedTransferSyntax { path, .. } => path,
        }
    }
}

/// One requested tag and what the file held for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagValue {
    pub tag:   Tag,
    pub value: Option<String>,
}

/// The values read from one file, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagValues(Vec<TagValue>);

impl TagValues {
    pub(crate) fn absent(tags: &[Tag]) -> Self {
        Self(tags.iter().map(|&tag| TagValue { tag, value: None }).collect())
    }

    pub(crate) fn set(&mut self, tag: Tag, value: String) {
        if let Some(slot) = self.0.iter_mut().find(|v| v.tag == tag) {
            slot.value = Some(value);
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&str> {
        self.0
            .iter()
            .find(|v| v.tag == tag)
            .and_then(|v| v.value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<TagValue> for TagValues {
    fn from_iter<I: IntoIterator<Item = TagValue>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
