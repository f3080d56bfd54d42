//! Console output for scan results.

use std::io::{self, Write};
use std::path::Path;

use crate::dicom::{TagError, TagValues};
use crate::error::Diagnostic;

/// Shown for tags a file does not contain.
pub const ABSENT: &str = "absent";

/// Writes one record per discovered file, numbered in the order reported.
pub struct Reporter<W: Write> {
    out:   W,
    event: usize,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, event: 0 }
    }

    /// Number of files reported so far.
    pub fn reported(&self) -> usize {
        self.event
    }

    pub fn chunk_header(&mut self, index: usize, files: usize) -> io::Result<()> {
        writeln!(self.out, "\n--- chunk {index} ({files} files) ---")
    }

    /// Report a file along with its tags, or the reason they could not be read.
    pub fn file(&mut self, path: &Path, tags: Result<&TagValues, &TagError>) -> io::Result<()> {
        self.header(path)?;
        match tags {
            Ok(values) => {
                for v in values.iter() {
                    let value = v.value.as_deref().unwrap_or(ABSENT);
                    writeln!(self.out, "{}: {}", v.tag.label(), value)?;
                }
            }
            Err(e) => writeln!(self.out, "Failed to read tags: {e}")?,
        }
        Ok(())
    }

    /// Report a file without reading it.
    pub fn path_only(&mut self, path: &Path) -> io::Result<()> {
        self.header(path)
    }

    fn header(&mut self, path: &Path) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Event: {}", self.event)?;
        writeln!(self.out, "Reading from file: {}", path.display())?;
        self.event += 1;
        Ok(())
    }

    pub fn summary(&mut self, skipped: usize) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Found {} file(s), {} skipped", self.event, skipped)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Write each diagnostic as `skipped <path>: <reason>`.
pub fn write_diagnostics<'a, W: Write>(
    mut out: W,
    diagnostics: impl IntoIterator<Item = &'a Diagnostic>,
) -> io::Result<()> {
    for d in diagnostics {
        writeln!(out, "skipped {d}")?;
    }
    Ok(())
}
