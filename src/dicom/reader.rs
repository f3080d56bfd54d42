use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use tracing::debug;

use super::tag::Tag;
use super::{TagError, TagReader, TagValues};

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// Length value marking an element whose end is found by a delimiter.
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

/// Sequences nest; garbage can claim to nest forever.
const MAX_NESTING: usize = 64;

/// Upper bound on a value we are willing to buffer.
const MAX_VALUE_LEN: u32 = 1 << 20;

const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
const JPIP_REFERENCED_DEFLATE: &str = "1.2.840.10008.1.2.4.95";

/// Encapsulated syntaxes: compressed pixel data in an explicit VR little
/// endian dataset.
const ENCAPSULATED_FAMILIES: &[&str] = &["1.2.840.10008.1.2.4.", "1.2.840.10008.1.2.6."];
const ENCAPSULATED: &[&str] = &["1.2.840.10008.1.2.5", "1.2.840.10008.1.2.8.1"];

/// Reads tags from DICOM Part 10 files: a 128-byte preamble, the `DICM`
/// magic, the file meta group, then the dataset.
///
/// The dataset is read in the transfer syntax the meta group names.
/// Implicit and explicit little endian and explicit big endian are
/// understood, as are the standard encapsulated (compressed) syntaxes,
/// whose datasets are explicit little endian. Deflated datasets and UIDs
/// outside those families are rejected as unsupported.
///
/// Reading stops as soon as the dataset passes the highest requested tag,
/// so pixel data is never touched for the default field set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Part10Reader;

impl Part10Reader {
    /// Read `tags` from any byte source holding a Part 10 stream.
    pub fn read_from<R: Read>(&self, source: R, tags: &[Tag]) -> Result<TagValues, DecodeError> {
        let mut r = BufReader::new(source);

        let mut preamble = [0u8; PREAMBLE_LEN + 4];
        r.read_exact(&mut preamble).map_err(DecodeError::from_io)?;
        if &preamble[PREAMBLE_LEN..] != MAGIC {
            return Err(DecodeError::Malformed("missing DICM prefix".into()));
        }

        let syntax = read_meta(&mut r)?;
        debug!(?syntax, "file meta read");
        read_dataset(&mut r, syntax, tags)
    }
}

impl TagReader for Part10Reader {
    fn read_tags(&self, path: &Path, tags: &[Tag]) -> Result<TagValues, TagError> {
        let file = File::open(path).map_err(|source| TagError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.read_from(file, tags).map_err(|e| match e {
            DecodeError::Io(source) => TagError::Io {
                path: path.to_path_buf(),
                source,
            },
            DecodeError::Malformed(reason) => TagError::Malformed {
                path: path.to_path_buf(),
                reason,
            },
            DecodeError::Unsupported(uid) => TagError::UnsupportedTransferSyntax {
                path: path.to_path_buf(),
                uid,
            },
        })
    }
}

/// Decoding failures before a path is attached.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    #[error("{0}")]
    Malformed(String),

    #[error("unsupported transfer syntax {0}")]
    Unsupported(String),
}

impl DecodeError {
    /// A short read means the stream ended mid-structure.
    fn from_io(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::Malformed("unexpected end of file".into())
        } else {
            Self::Io(err)
        }
    }
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err)
    }
}

// ---------------------------------------------------------------------------
// Transfer syntax
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Syntax {
    explicit_vr: bool,
    big_endian:  bool,
}

impl Syntax {
    const META: Syntax = Syntax {
        explicit_vr: true,
        big_endian:  false,
    };

    fn from_uid(uid: &str) -> Result<Self, DecodeError> {
        match uid {
            IMPLICIT_VR_LITTLE_ENDIAN => Ok(Syntax {
                explicit_vr: false,
                big_endian:  false,
            }),
            EXPLICIT_VR_BIG_ENDIAN => Ok(Syntax {
                explicit_vr: true,
                big_endian:  true,
            }),
            EXPLICIT_VR_LITTLE_ENDIAN => Ok(Syntax::META),
            DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN | JPIP_REFERENCED_DEFLATE => {
                Err(DecodeError::Unsupported(uid.to_string()))
            }
            _ if is_encapsulated(uid) => Ok(Syntax::META),
            _ => Err(DecodeError::Unsupported(uid.to_string())),
        }
    }

    fn u16<R: Read>(&self, r: &mut R) -> io::Result<u16> {
        if self.big_endian {
            r.read_u16::<BigEndian>()
        } else {
            r.read_u16::<LittleEndian>()
        }
    }

    fn u32<R: Read>(&self, r: &mut R) -> io::Result<u32> {
        if self.big_endian {
            r.read_u32::<BigEndian>()
        } else {
            r.read_u32::<LittleEndian>()
        }
    }
}

fn is_encapsulated(uid: &str) -> bool {
    ENCAPSULATED.contains(&uid)
        || ENCAPSULATED_FAMILIES
            .iter()
            .any(|family| uid.strip_prefix(family).is_some_and(|rest| !rest.is_empty()))
}

// ---------------------------------------------------------------------------
// Element headers
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Header {
    tag: Tag,
    len: u32,
}

/// VRs whose explicit encoding has two reserved bytes and a 32-bit length.
fn has_long_length(vr: &[u8; 2]) -> bool {
    matches!(
        vr,
        b"OB" | b"OD" | b"OF" | b"OL" | b"OV" | b"OW" | b"SQ" | b"SV" | b"UC" | b"UN" | b"UR" | b"UT" | b"UV"
    )
}

/// Read the next element header, or `None` at a clean end of stream.
fn read_header<R: BufRead>(r: &mut R, syntax: Syntax) -> Result<Option<Header>, DecodeError> {
    if r.fill_buf()?.is_empty() {
        return Ok(None);
    }

    let tag = Tag::new(syntax.u16(r)?, syntax.u16(r)?);

    // Items and delimiters never carry a VR.
    if tag.group == 0xFFFE || !syntax.explicit_vr {
        let len = syntax.u32(r)?;
        return Ok(Some(Header { tag, len }));
    }

    let mut vr = [0u8; 2];
    r.read_exact(&mut vr)?;
    let len = if has_long_length(&vr) {
        syntax.u16(r)?;
        syntax.u32(r)?
    } else {
        u32::from(syntax.u16(r)?)
    };
    Ok(Some(Header { tag, len }))
}

fn skip<R: Read>(r: &mut R, len: u32) -> Result<(), DecodeError> {
    let copied = io::copy(&mut r.by_ref().take(u64::from(len)), &mut io::sink())?;
    if copied < u64::from(len) {
        return Err(DecodeError::Malformed("element runs past end of file".into()));
    }
    Ok(())
}

fn read_value<R: Read>(r: &mut R, len: u32) -> Result<Vec<u8>, DecodeError> {
    if len > MAX_VALUE_LEN {
        return Err(DecodeError::Malformed(format!("value of {len} bytes is too long")));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Skip everything up to and including `delimiter`.
fn skip_until<R: BufRead>(r: &mut R, syntax: Syntax, delimiter: Tag, depth: usize) -> Result<(), DecodeError> {
    if depth > MAX_NESTING {
        return Err(DecodeError::Malformed("sequences nested too deeply".into()));
    }
    loop {
        let header = read_header(r, syntax)?
            .ok_or_else(|| DecodeError::Malformed("unterminated sequence".into()))?;
        if header.tag == delimiter {
            return Ok(());
        }
        if header.len == UNDEFINED_LENGTH {
            let inner = if header.tag == Tag::ITEM {
                Tag::ITEM_DELIMITER
            } else {
                Tag::SEQUENCE_DELIMITER
            };
            skip_until(r, syntax, inner, depth + 1)?;
        } else {
            skip(r, header.len)?;
        }
    }
}

// ---------------------------------------------------------------------------
// File meta group
// ---------------------------------------------------------------------------

/// Read the file meta group and return the dataset's transfer syntax.
fn read_meta<R: BufRead>(r: &mut R) -> Result<Syntax, DecodeError> {
    let header = read_header(r, Syntax::META)?
        .ok_or_else(|| DecodeError::Malformed("no file meta group".into()))?;
    if header.tag != Tag::META_GROUP_LENGTH || header.len != 4 {
        return Err(DecodeError::Malformed("missing file meta group length".into()));
    }
    let meta_len = r.read_u32::<LittleEndian>()?;
    let meta = read_value(r, meta_len)?;

    let mut meta = Cursor::new(meta);
    let mut uid = None;
    while let Some(header) = read_header(&mut meta, Syntax::META)? {
        if header.tag == Tag::TRANSFER_SYNTAX {
            uid = Some(decode_text(&read_value(&mut meta, header.len)?));
        } else if header.len == UNDEFINED_LENGTH {
            skip_until(&mut meta, Syntax::META, Tag::SEQUENCE_DELIMITER, 1)?;
        } else {
            skip(&mut meta, header.len)?;
        }
    }

    let uid = uid.ok_or_else(|| DecodeError::Malformed("no transfer syntax in file meta".into()))?;
    Syntax::from_uid(&uid)
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

fn read_dataset<R: BufRead>(r: &mut R, syntax: Syntax, tags: &[Tag]) -> Result<TagValues, DecodeError> {
    let mut values = TagValues::absent(tags);
    let Some(&last) = tags.iter().max() else {
        return Ok(values);
    };

    while let Some(header) = read_header(r, syntax)? {
        if header.tag > last {
            break;
        }
        if header.len == UNDEFINED_LENGTH {
            skip_until(r, syntax, Tag::SEQUENCE_DELIMITER, 1)?;
        } else if tags.contains(&header.tag) {
            let raw = read_value(r, header.len)?;
            values.set(header.tag, decode_text(&raw));
        } else {
            skip(r, header.len)?;
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use byteorder::WriteBytesExt;

    use super::*;

    const EXPLICIT_LE: &str = EXPLICIT_VR_LITTLE_ENDIAN;

    /// Minimal Part 10 writer for building fixtures.
    struct Encoder {
        buf:    Vec<u8>,
        syntax: Syntax,
    }

    impl Encoder {
        fn new(syntax: Syntax) -> Self {
            Self { buf: Vec::new(), syntax }
        }

        fn u16(&mut self, v: u16) {
            if self.syntax.big_endian {
                self.buf.write_u16::<BigEndian>(v).unwrap();
            } else {
                self.buf.write_u16::<LittleEndian>(v).unwrap();
            }
        }

        fn u32(&mut self, v: u32) {
            if self.syntax.big_endian {
                self.buf.write_u32::<BigEndian>(v).unwrap();
            } else {
                self.buf.write_u32::<LittleEndian>(v).unwrap();
            }
        }

        fn header(&mut self, tag: Tag, vr: &[u8; 2], len: u32) -> &mut Self {
            self.u16(tag.group);
            self.u16(tag.element);
            if tag.group == 0xFFFE || !self.syntax.explicit_vr {
                self.u32(len);
            } else {
                self.buf.extend_from_slice(vr);
                if has_long_length(vr) {
                    self.u16(0);
                    self.u32(len);
                } else {
                    self.u16(len as u16);
                }
            }
            self
        }

        fn element(&mut self, tag: Tag, vr: &[u8; 2], value: &[u8]) -> &mut Self {
            let mut value = value.to_vec();
            if value.len() % 2 == 1 {
                value.push(if vr == b"UI" || vr == b"OB" { 0 } else { b' ' });
            }
            self.header(tag, vr, value.len() as u32);
            self.buf.extend_from_slice(&value);
            self
        }
    }

    fn part10(uid: &str, dataset: &[u8]) -> Vec<u8> {
        let mut meta = Encoder::new(Syntax::META);
        meta.element(Tag::new(0x0002, 0x0001), b"OB", &[0, 1])
            .element(Tag::TRANSFER_SYNTAX, b"UI", uid.as_bytes());

        let mut out = vec![0u8; PREAMBLE_LEN];
        out.extend_from_slice(MAGIC);
        let mut group = Encoder::new(Syntax::META);
        group.header(Tag::META_GROUP_LENGTH, b"UL", 4);
        group.u32(meta.buf.len() as u32);
        out.extend_from_slice(&group.buf);
        out.extend_from_slice(&meta.buf);
        out.extend_from_slice(dataset);
        out
    }

    fn typical_dataset(syntax: Syntax) -> Vec<u8> {
        let mut ds = Encoder::new(syntax);
        ds.element(Tag::new(0x0008, 0x0060), b"CS", b"MR")
            .element(Tag::STUDY_DESCRIPTION, b"LO", b"Brain w/o contrast")
            .element(Tag::SERIES_DESCRIPTION, b"LO", b"T1 AX")
            .element(Tag::new(0x0010, 0x0010), b"PN", b"Doe^Jane")
            .element(Tag::PATIENT_ID, b"LO", b"P123")
            .element(Tag::SERIES_NUMBER, b"IS", b"4")
            .element(Tag::new(0x7FE0, 0x0010), b"OW", &[0u8; 16]);
        ds.buf
    }

    fn read(bytes: Vec<u8>) -> Result<TagValues, DecodeError> {
        Part10Reader.read_from(Cursor::new(bytes), crate::dicom::DEFAULT_TAGS)
    }

    fn assert_typical(values: &TagValues) {
        assert_eq!(values.get(Tag::PATIENT_ID), Some("P123"));
        assert_eq!(values.get(Tag::STUDY_DESCRIPTION), Some("Brain w/o contrast"));
        assert_eq!(values.get(Tag::SERIES_DESCRIPTION), Some("T1 AX"));
        assert_eq!(values.get(Tag::SERIES_NUMBER), Some("4"));
    }

    #[test]
    fn explicit_little_endian() {
        let syntax = Syntax::META;
        let values = read(part10(EXPLICIT_LE, &typical_dataset(syntax))).unwrap();
        assert_typical(&values);
    }

    #[test]
    fn implicit_little_endian() {
        let syntax = Syntax::from_uid(IMPLICIT_VR_LITTLE_ENDIAN).unwrap();
        let values = read(part10(IMPLICIT_VR_LITTLE_ENDIAN, &typical_dataset(syntax))).unwrap();
        assert_typical(&values);
    }

    #[test]
    fn explicit_big_endian() {
        let syntax = Syntax::from_uid(EXPLICIT_VR_BIG_ENDIAN).unwrap();
        let values = read(part10(EXPLICIT_VR_BIG_ENDIAN, &typical_dataset(syntax))).unwrap();
        assert_typical(&values);
    }

    #[test]
    fn values_come_back_in_request_order() {
        let values = read(part10(EXPLICIT_LE, &typical_dataset(Syntax::META))).unwrap();
        let order: Vec<Tag> = values.iter().map(|v| v.tag).collect();
        assert_eq!(order, crate::dicom::DEFAULT_TAGS);
    }

    #[test]
    fn skips_undefined_length_sequences() {
        let mut ds = Encoder::new(Syntax::META);
        ds.element(Tag::STUDY_DESCRIPTION, b"LO", b"Chest")
            .header(Tag::new(0x0008, 0x1032), b"SQ", UNDEFINED_LENGTH)
            .header(Tag::ITEM, b"  ", UNDEFINED_LENGTH)
            .element(Tag::new(0x0008, 0x0100), b"SH", b"CODE1")
            .header(Tag::new(0x0040, 0xA730), b"SQ", UNDEFINED_LENGTH)
            .header(Tag::ITEM, b"  ", 0)
            .header(Tag::SEQUENCE_DELIMITER, b"  ", 0)
            .header(Tag::ITEM_DELIMITER, b"  ", 0)
            .header(Tag::SEQUENCE_DELIMITER, b"  ", 0)
            .element(Tag::SERIES_DESCRIPTION, b"LO", b"PA view");

        let values = read(part10(EXPLICIT_LE, &ds.buf)).unwrap();
        assert_eq!(values.get(Tag::STUDY_DESCRIPTION), Some("Chest"));
        assert_eq!(values.get(Tag::SERIES_DESCRIPTION), Some("PA view"));
        assert_eq!(values.get(Tag::PATIENT_ID), None);
    }

    #[test]
    fn missing_tags_are_absent() {
        let mut ds = Encoder::new(Syntax::META);
        ds.element(Tag::PATIENT_ID, b"LO", b"ANON");

        let values = read(part10(EXPLICIT_LE, &ds.buf)).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values.get(Tag::PATIENT_ID), Some("ANON"));
        assert_eq!(values.get(Tag::SERIES_NUMBER), None);
    }

    #[test]
    fn stops_after_last_requested_tag() {
        let mut ds = Encoder::new(Syntax::META);
        ds.element(Tag::SERIES_NUMBER, b"IS", b"12")
            .header(Tag::new(0x0028, 0x0010), b"US", 2);
        // No value follows: the element is truncated but never read.
        let values = read(part10(EXPLICIT_LE, &ds.buf)).unwrap();
        assert_eq!(values.get(Tag::SERIES_NUMBER), Some("12"));
    }

    #[test]
    fn missing_magic_is_malformed() {
        let mut bytes = part10(EXPLICIT_LE, &typical_dataset(Syntax::META));
        bytes[PREAMBLE_LEN..PREAMBLE_LEN + 4].copy_from_slice(b"NOPE");
        assert!(matches!(read(bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn short_file_is_malformed() {
        assert!(matches!(read(b"hello".to_vec()), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn truncated_value_is_malformed() {
        let mut bytes = part10(EXPLICIT_LE, &typical_dataset(Syntax::META));
        let cut = bytes.len() - 60;
        bytes.truncate(cut);
        assert!(matches!(read(bytes), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn deflated_syntax_is_unsupported() {
        let bytes = part10(DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN, &[]);
        assert!(matches!(read(bytes), Err(DecodeError::Unsupported(_))));
    }

    #[test]
    fn encapsulated_syntaxes_read_as_explicit_little_endian() {
        for uid in ["1.2.840.10008.1.2.4.50", "1.2.840.10008.1.2.4.90", "1.2.840.10008.1.2.5"] {
            let values = read(part10(uid, &typical_dataset(Syntax::META)))
                .unwrap_or_else(|e| panic!("{uid}: {e}"));
            assert_typical(&values);
        }
    }

    #[test]
    fn unknown_syntaxes_are_unsupported() {
        for uid in [JPIP_REFERENCED_DEFLATE, "not.a.uid", "1.2.840.10008.1.2.4.", "1.2.3.4"] {
            let bytes = part10(uid, &typical_dataset(Syntax::META));
            match read(bytes) {
                Err(DecodeError::Unsupported(got)) => assert_eq!(got, uid),
                other => panic!("{uid}: expected unsupported, got {other:?}"),
            }
        }
    }
}
