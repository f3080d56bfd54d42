use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A DICOM data element tag: `(group,element)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub group:   u16,
    pub element: u16,
}

impl Tag {
    pub const fn new(group: u16, element: u16) -> Self {
        Self { group, element }
    }

    pub const PATIENT_ID:          Tag = Tag::new(0x0010, 0x0020);
    pub const STUDY_DESCRIPTION:   Tag = Tag::new(0x0008, 0x1030);
    pub const SERIES_DESCRIPTION:  Tag = Tag::new(0x0008, 0x103E);
    pub const SERIES_NUMBER:       Tag = Tag::new(0x0020, 0x0011);

    pub(crate) const META_GROUP_LENGTH:  Tag = Tag::new(0x0002, 0x0000);
    pub(crate) const TRANSFER_SYNTAX:    Tag = Tag::new(0x0002, 0x0010);
    pub(crate) const ITEM:               Tag = Tag::new(0xFFFE, 0xE000);
    pub(crate) const ITEM_DELIMITER:     Tag = Tag::new(0xFFFE, 0xE00D);
    pub(crate) const SEQUENCE_DELIMITER: Tag = Tag::new(0xFFFE, 0xE0DD);

    /// The keyword for the tags this crate knows by name.
    pub fn keyword(&self) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .find(|(_, tag)| tag == self)
            .map(|(name, _)| *name)
    }

    /// Keyword if known, otherwise the `(gggg,eeee)` form.
    pub fn label(&self) -> String {
        match self.keyword() {
            Some(name) => name.to_string(),
            None       => self.to_string(),
        }
    }
}

const KEYWORDS: &[(&str, Tag)] = &[
    ("PatientID",         Tag::PATIENT_ID),
    ("SeriesDescription", Tag::SERIES_DESCRIPTION),
    ("StudyDescription",  Tag::STUDY_DESCRIPTION),
    ("SeriesNumber",      Tag::SERIES_NUMBER),
];

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group, self.element)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid tag `{0}`: expected a keyword or GGGG,EEEE")]
pub struct TagParseError(pub String);

/// Accepts a known keyword (case-insensitive), `GGGG,EEEE`,
/// `(GGGG,EEEE)` or `GGGGEEEE`.
impl FromStr for Tag {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some((_, tag)) = KEYWORDS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
        {
            return Ok(*tag);
        }

        let err = || TagParseError(s.to_string());
        let hex = trimmed
            .trim_start_matches('(')
            .trim_end_matches(')');
        let (group, element) = match hex.split_once(',') {
            Some((g, e)) => (g.trim(), e.trim()),
            None if hex.len() == 8 && hex.is_ascii() => hex.split_at(4),
            None => return Err(err()),
        };
        if group.len() != 4 || element.len() != 4 {
            return Err(err());
        }

        let group = u16::from_str_radix(group, 16).map_err(|_| err())?;
        let element = u16::from_str_radix(element, 16).map_err(|_| err())?;
        Ok(Tag::new(group, element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keywords_and_hex() {
        assert_eq!("PatientID".parse::<Tag>().unwrap(), Tag::PATIENT_ID);
        assert_eq!("seriesnumber".parse::<Tag>().unwrap(), Tag::SERIES_NUMBER);
        assert_eq!("0008,103E".parse::<Tag>().unwrap(), Tag::SERIES_DESCRIPTION);
        assert_eq!("(0008,1030)".parse::<Tag>().unwrap(), Tag::STUDY_DESCRIPTION);
        assert_eq!("00280010".parse::<Tag>().unwrap(), Tag::new(0x0028, 0x0010));
    }

    #[test]
    fn rejects_garbage() {
        assert!("Modality".parse::<Tag>().is_err());
        assert!("10,20".parse::<Tag>().is_err());
        assert!("GGGG,0010".parse::<Tag>().is_err());
    }

    #[test]
    fn labels_fall_back_to_hex() {
        assert_eq!(Tag::PATIENT_ID.label(), "PatientID");
        assert_eq!(Tag::new(0x0028, 0x0010).label(), "(0028,0010)");
    }

    #[test]
    fn ordering_follows_file_order() {
        assert!(Tag::STUDY_DESCRIPTION < Tag::SERIES_DESCRIPTION);
        assert!(Tag::SERIES_DESCRIPTION < Tag::PATIENT_ID);
        assert!(Tag::PATIENT_ID < Tag::SERIES_NUMBER);
    }
}
