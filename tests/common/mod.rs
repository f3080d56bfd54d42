#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use dcmscan::dicom::Tag;
use dcmscan::{DirChild, EntryKind, FileSystem};

// ---------------------------------------------------------------------------
// In-memory filesystem
// ---------------------------------------------------------------------------

/// A filesystem held in maps, with directories that can be made unreadable
/// regardless of which user the tests run as.
#[derive(Default)]
pub struct MemFs {
    dirs:       BTreeMap<PathBuf, Vec<DirChild>>,
    files:      BTreeSet<PathBuf>,
    unreadable: BTreeSet<PathBuf>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(mut self, path: &str) -> Self {
        self.ensure_dir(Path::new(path));
        self
    }

    pub fn file(mut self, path: &str) -> Self {
        let path = PathBuf::from(path);
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent);
            if let Some(children) = self.dirs.get_mut(parent) {
                children.push(DirChild::new(&path, EntryKind::File));
            }
        }
        self.files.insert(path);
        self
    }

    pub fn unreadable(mut self, path: &str) -> Self {
        self.unreadable.insert(PathBuf::from(path));
        self
    }

    fn ensure_dir(&mut self, path: &Path) {
        if self.dirs.contains_key(path) {
            return;
        }
        self.dirs.insert(path.to_path_buf(), Vec::new());
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent);
            if let Some(children) = self.dirs.get_mut(parent) {
                children.push(DirChild::new(path, EntryKind::Directory));
            }
        }
    }
}

impl FileSystem for MemFs {
    fn classify(&self, path: &Path) -> io::Result<EntryKind> {
        if self.dirs.contains_key(path) {
            Ok(EntryKind::Directory)
        } else if self.files.contains(path) {
            Ok(EntryKind::File)
        } else {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<DirChild>> {
        if self.unreadable.contains(path) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

// ---------------------------------------------------------------------------
// Real trees
// ---------------------------------------------------------------------------

/// Create `rel` (and its parents) under `root` with `contents`.
pub fn touch(root: &Path, rel: &str, contents: &[u8]) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// Paths relative to `root`, sorted, with `/` separators.
pub fn relative<'a>(root: &Path, paths: impl IntoIterator<Item = &'a Path>) -> Vec<String> {
    let mut out: Vec<String> = paths
        .into_iter()
        .map(|p| {
            p.strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// DICOM fixtures
// ---------------------------------------------------------------------------

const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";

fn element(out: &mut Vec<u8>, tag: Tag, vr: &[u8; 2], value: &[u8]) {
    let mut value = value.to_vec();
    if value.len() % 2 == 1 {
        value.push(if vr == b"UI" { 0 } else { b' ' });
    }
    out.write_u16::<LittleEndian>(tag.group).unwrap();
    out.write_u16::<LittleEndian>(tag.element).unwrap();
    out.extend_from_slice(vr);
    out.write_u16::<LittleEndian>(value.len() as u16).unwrap();
    out.extend_from_slice(&value);
}

/// Encode an explicit VR little endian Part 10 file holding `elements`,
/// which must be in ascending tag order.
pub fn dicom_bytes(elements: &[(Tag, &[u8; 2], &str)]) -> Vec<u8> {
    dicom_bytes_in(EXPLICIT_VR_LITTLE_ENDIAN, elements)
}

/// Like [`dicom_bytes`], but the file meta names `transfer_syntax`. The
/// dataset is still written as explicit VR little endian.
pub fn dicom_bytes_in(transfer_syntax: &str, elements: &[(Tag, &[u8; 2], &str)]) -> Vec<u8> {
    let mut meta = Vec::new();
    element(&mut meta, Tag::new(0x0002, 0x0010), b"UI", transfer_syntax.as_bytes());

    let mut out = vec![0u8; 128];
    out.extend_from_slice(b"DICM");
    element(&mut out, Tag::new(0x0002, 0x0000), b"UL", &(meta.len() as u32).to_le_bytes());
    out.extend_from_slice(&meta);
    for (tag, vr, value) in elements {
        element(&mut out, *tag, vr, value.as_bytes());
    }
    out
}

/// A file carrying all four reported fields.
pub fn typical_dicom(patient: &str, series: &str) -> Vec<u8> {
    dicom_bytes(&[
        (Tag::STUDY_DESCRIPTION, b"LO", "Head CT"),
        (Tag::SERIES_DESCRIPTION, b"LO", "Axial 5mm"),
        (Tag::PATIENT_ID, b"LO", patient),
        (Tag::SERIES_NUMBER, b"IS", series),
    ])
}
