//! Write-only document storage.
//!
//! A [`RecordStore`] accepts one document at a time. Failures are reported
//! to the caller and never retried here.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::dicom::TagValues;

/// An opaque key/value document.
pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record store unavailable: {reason}")]
    Unavailable {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("document could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    fn io(reason: impl Into<String>, source: io::Error) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            source: Some(source),
        }
    }
}

/// Accepts documents for durable storage.
pub trait RecordStore: Send + Sync {
    fn put(&self, document: &Document) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

/// Appends one JSON document per line to a file, creating it on first use.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonLinesStore {
    fn put(&self, document: &Document) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(document)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(format!("cannot open {}", self.path.display()), e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::io(format!("cannot write {}", self.path.display()), e))?;

        debug!(path = %self.path.display(), keys = document.len(), "document stored");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything stored so far, oldest first.
    pub fn documents(&self) -> Vec<Document> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }
}

impl RecordStore for MemoryStore {
    fn put(&self, document: &Document) -> Result<(), StoreError> {
        let mut docs = self.documents.lock().map_err(|_| StoreError::Unavailable {
            reason: "memory store lock poisoned".into(),
            source: None,
        })?;
        docs.push(document.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// The hand-built record used to check a store is writable.
pub fn sample_document() -> Document {
    let sample = json!({
        "firstname": "Peter",
        "lastname": "Mbanugo",
        "subjects": ["English", "Mathematics", "Physics"],
        "class": "JSS 3",
        "age": i32::MAX,
    });
    match sample {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

/// One document per scanned file: its path plus every requested tag,
/// keyed by keyword, with `null` for absent tags.
pub fn file_document(path: &Path, values: &TagValues) -> Document {
    let mut doc = Document::new();
    doc.insert("path".into(), Value::String(path.display().to_string()));
    for v in values.iter() {
        let value = v.value.clone().map_or(Value::Null, Value::String);
        doc.insert(v.tag.label(), value);
    }
    doc
}
