//! Canonical ordering of match-record streams.
//!
//! Sort order:
//! 1. Chromosome (bytewise)
//! 2. Position (ascending, numeric)
//! 3. Strand (bytewise: `+` before `-`)
//! 4. Guide sequence (bytewise)
//! 5. Mismatch field (as text: `"10"` before `"2"`)
//! 6. Ties: input order preserved (stable sort), or full line bytes with
//!    [`TieBreak::FullLine`]
//!
//! Every line is parsed before sorting; one malformed record fails the whole
//! stream instead of being skipped.

use crate::error::{OracleError, Result, StreamKind};
use crate::record::CanonicalKey;
use crate::streaming::buffers::PARALLEL_SORT_THRESHOLD;
use crate::streaming::parsing::line_spans;
use crate::streaming::{ArtifactWriter, StagedArtifact};
use rayon::prelude::*;
use std::io::{self, Write};

/// How records with equal canonical keys are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Keep their relative input order.
    #[default]
    InputOrder,
    /// Order them by the full line bytes.
    FullLine,
}

/// Statistics from canonicalizing one stream.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CanonicalSortStats {
    pub records: usize,
    pub bytes: usize,
    pub used_parallel: bool,
}

impl std::fmt::Display for CanonicalSortStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {}, Bytes: {}, Parallel: {}",
            self.records,
            self.bytes,
            if self.used_parallel { "yes" } else { "no" }
        )
    }
}

/// A stream in canonical order, borrowing line bodies from the raw output.
///
/// Each line is emitted followed by `\n`; a final line that lacked a
/// terminator in the raw output gains one, so moving it cannot fuse it with
/// its new neighbour.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalStream<'a> {
    lines: Vec<&'a [u8]>,
}

impl<'a> CanonicalStream<'a> {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line bodies in canonical order, without terminators.
    pub fn lines(&self) -> &[&'a [u8]] {
        &self.lines
    }

    /// Write the canonical form to `output`.
    pub fn write_to<W: Write>(&self, output: &mut W) -> io::Result<()> {
        for line in &self.lines {
            output.write_all(line)?;
            output.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write the canonical form to a temporary file beside `path`, ready to
    /// replace it.
    pub fn stage<P: AsRef<std::path::Path>>(&self, path: P) -> io::Result<StagedArtifact> {
        let mut writer = ArtifactWriter::create(path)?;
        self.write_to(&mut writer)?;
        writer.finish()
    }

    /// Canonical form as one byte buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let size = self.lines.iter().map(|l| l.len() + 1).sum();
        let mut out = Vec::with_capacity(size);
        for line in &self.lines {
            out.extend_from_slice(line);
            out.push(b'\n');
        }
        out
    }

    /// Index of the first line where the two streams disagree.
    ///
    /// A stream that is a strict prefix of the other diverges at its end.
    pub fn first_difference(&self, other: &CanonicalStream<'_>) -> Option<usize> {
        let common = self.lines.len().min(other.lines.len());
        (0..common)
            .find(|&i| self.lines[i] != other.lines[i])
            .or_else(|| (self.lines.len() != other.lines.len()).then_some(common))
    }
}

/// Canonical sort configuration.
#[derive(Debug, Clone)]
pub struct CanonicalSortCommand {
    /// Ordering among equal canonical keys.
    pub tie_break: TieBreak,
    /// Allow rayon for large streams.
    pub parallel: bool,
}

impl Default for CanonicalSortCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalSortCommand {
    pub fn new() -> Self {
        Self {
            tie_break: TieBreak::InputOrder,
            parallel: true,
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Canonicalize a raw output buffer.
    ///
    /// `stream` identifies the producing program in error messages.
    pub fn canonicalize<'a>(
        &self,
        data: &'a [u8],
        stream: StreamKind,
    ) -> Result<(CanonicalStream<'a>, CanonicalSortStats)> {
        let mut stats = CanonicalSortStats {
            bytes: data.len(),
            ..Default::default()
        };

        let mut entries: Vec<(CanonicalKey<'a>, &'a [u8])> = Vec::new();
        for (idx, (start, end)) in line_spans(data).into_iter().enumerate() {
            let line = &data[start..end];
            let key = CanonicalKey::parse(line).map_err(|e| OracleError::MalformedRecord {
                stream,
                line: idx + 1,
                message: e.to_string(),
                content: String::from_utf8_lossy(line).into_owned(),
            })?;
            entries.push((key, line));
        }
        stats.records = entries.len();

        let tie_break = self.tie_break;
        let compare = |a: &(CanonicalKey<'a>, &'a [u8]), b: &(CanonicalKey<'a>, &'a [u8])| {
            let ord = a.0.cmp(&b.0);
            match tie_break {
                TieBreak::InputOrder => ord,
                TieBreak::FullLine => ord.then_with(|| a.1.cmp(b.1)),
            }
        };

        // Both sorts are stable, so the result does not depend on which runs
        if self.parallel && entries.len() >= PARALLEL_SORT_THRESHOLD {
            stats.used_parallel = true;
            entries.par_sort_by(compare);
        } else {
            entries.sort_by(compare);
        }

        let lines = entries.into_iter().map(|(_, line)| line).collect();
        Ok((CanonicalStream { lines }, stats))
    }

    /// Canonicalize and return the canonical bytes.
    pub fn canonicalize_bytes(&self, data: &[u8], stream: StreamKind) -> Result<Vec<u8>> {
        let (canonical, _) = self.canonicalize(data, stream)?;
        Ok(canonical.to_bytes())
    }
}
