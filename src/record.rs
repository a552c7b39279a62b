//! Match records and their canonical sort keys.
//!
//! A match record is one tab-separated output line:
//!
//! ```text
//! guide  chromosome  position  target  strand  mismatches  [extra...]
//! ```
//!
//! The canonical key orders records by
//! `(chromosome, position, strand, guide, mismatches)`. It only establishes
//! an order; equality between two runs is judged on whole lines.

use crate::streaming::parsing::{parse_u64_fast, split_tabs, strip_cr};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Number of fields consumed from each record line.
pub const RECORD_FIELDS: usize = 6;

/// Reasons a single line cannot be turned into a canonical key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("expected at least 6 tab-separated fields, got {found}")]
    TooFewFields { found: usize },

    #[error("invalid position '{0}'")]
    InvalidPosition(String),
}

/// Strand of a match, kept as the raw indicator.
///
/// Ordering follows the raw bytes of the indicator, so `+` sorts before `-`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand<'a> {
    Plus,
    Minus,
    Other(&'a [u8]),
}

impl<'a> Strand<'a> {
    pub fn from_bytes(raw: &'a [u8]) -> Self {
        match raw {
            b"+" => Strand::Plus,
            b"-" => Strand::Minus,
            other => Strand::Other(other),
        }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Strand::Plus => b"+",
            Strand::Minus => b"-",
            Strand::Other(raw) => raw,
        }
    }
}

impl Ord for Strand<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl PartialOrd for Strand<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Strand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// The mismatch-count field, compared as text.
///
/// `"10"` sorts before `"2"`. This only decides order among records that
/// already share chromosome, position, strand and guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MismatchText<'a>(pub &'a [u8]);

impl<'a> MismatchText<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// Numeric value, when the field holds a plain count.
    pub fn count(&self) -> Option<u64> {
        parse_u64_fast(self.0)
    }
}

/// Sort key derived from one record line.
///
/// Field order is significant: the derived `Ord` compares chromosome
/// (bytes), then position (numeric), strand, guide (bytes) and finally
/// the mismatch field (text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalKey<'a> {
    pub chromosome: &'a [u8],
    pub position: u64,
    pub strand: Strand<'a>,
    pub guide: &'a [u8],
    pub mismatches: MismatchText<'a>,
}

impl<'a> CanonicalKey<'a> {
    /// Parse the key out of a line body (without its `\n`).
    ///
    /// A trailing `\r` is ignored. Fields past the sixth are tolerated.
    pub fn parse(line: &'a [u8]) -> Result<Self, RecordError> {
        let (f, found) = split_tabs::<RECORD_FIELDS>(strip_cr(line));
        if found < RECORD_FIELDS {
            return Err(RecordError::TooFewFields { found });
        }

        let position = parse_u64_fast(f[2])
            .ok_or_else(|| RecordError::InvalidPosition(String::from_utf8_lossy(f[2]).into()))?;

        Ok(Self {
            chromosome: f[1],
            position,
            strand: Strand::from_bytes(f[4]),
            guide: f[0],
            mismatches: MismatchText(f[5]),
        })
    }
}

/// Owned, typed view of all six record fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchRecord {
    pub guide: String,
    pub chromosome: String,
    pub position: u64,
    pub target: String,
    pub strand: String,
    pub mismatches: String,
}

impl MatchRecord {
    pub fn new(
        guide: impl Into<String>,
        chromosome: impl Into<String>,
        position: u64,
        target: impl Into<String>,
        strand: impl Into<String>,
        mismatches: impl Into<String>,
    ) -> Self {
        Self {
            guide: guide.into(),
            chromosome: chromosome.into(),
            position,
            target: target.into(),
            strand: strand.into(),
            mismatches: mismatches.into(),
        }
    }

    /// Parse a line body. Invalid UTF-8 is replaced, extra fields dropped.
    pub fn parse(line: &[u8]) -> Result<Self, RecordError> {
        let key = CanonicalKey::parse(line)?;
        let (f, _) = split_tabs::<RECORD_FIELDS>(strip_cr(line));
        let text = |b: &[u8]| String::from_utf8_lossy(b).into_owned();

        Ok(Self {
            guide: text(key.guide),
            chromosome: text(key.chromosome),
            position: key.position,
            target: text(f[3]),
            strand: text(key.strand.as_bytes()),
            mismatches: text(key.mismatches.as_bytes()),
        })
    }

    /// Names of the fields whose values differ from `other`, in column order.
    pub fn differing_fields(&self, other: &MatchRecord) -> Vec<&'static str> {
        [
            ("guide", self.guide == other.guide),
            ("chromosome", self.chromosome == other.chromosome),
            ("position", self.position == other.position),
            ("target", self.target == other.target),
            ("strand", self.strand == other.strand),
            ("mismatches", self.mismatches == other.mismatches),
        ]
        .into_iter()
        .filter(|&(_, same)| !same)
        .map(|(name, _)| name)
        .collect()
    }

    /// Canonical key borrowing from this record.
    pub fn key(&self) -> CanonicalKey<'_> {
        CanonicalKey {
            chromosome: self.chromosome.as_bytes(),
            position: self.position,
            strand: Strand::from_bytes(self.strand.as_bytes()),
            guide: self.guide.as_bytes(),
            mismatches: MismatchText(self.mismatches.as_bytes()),
        }
    }
}

impl fmt::Display for MatchRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.guide, self.chromosome, self.position, self.target, self.strand, self.mismatches
        )
    }
}
