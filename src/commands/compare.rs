//! Equivalence reporter: one end-to-end candidate vs reference comparison.
//!
//! Steps:
//! 1. Run the candidate with `[input, device, -]`, capturing stdout
//! 2. Fetch gold output from the [`GoldCache`] (generating it on a miss)
//! 3. Canonicalize both streams
//! 4. Persist `<input>.test.sorted` and `<input>.gold.sorted`
//! 5. Compare the canonical forms line by line
//!
//! Both streams are canonicalized and both artifacts fully staged before
//! either is renamed into place, so a malformed record or a full disk leaves
//! the previous run's artifacts in place.

use crate::commands::canonical_sort::{CanonicalSortCommand, CanonicalSortStats, CanonicalStream};
use crate::commands::gold_cache::{GoldCache, GoldLookup};
use crate::commands::runner::{DeviceSelector, Invocation, OutputSink, ProcessOutput, ProcessRunner};
use crate::config::{artifact_path, OracleConfig, GOLD_SORTED_SUFFIX, TEST_SORTED_SUFFIX};
use crate::error::{OracleError, Result, StreamKind, EXIT_DIFFER, EXIT_EQUAL};
use crate::record::MatchRecord;
use rustc_hash::FxHashMap;
use similar::TextDiff;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default cap on printed unified-diff lines.
pub const DEFAULT_MAX_DIFF_LINES: usize = 40;

/// Upper bound on time spent computing the unified diff.
const DIFF_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a comparison that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Equal,
    Differ,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Equal => write!(f, "files are the same"),
            Verdict::Differ => write!(f, "files differed"),
        }
    }
}

/// First canonical line at which the two streams disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// 1-based line number in the canonical artifacts.
    pub line: usize,
    /// Candidate line, or None if the candidate stream ended first.
    pub candidate: Option<String>,
    /// Reference line, or None if the reference stream ended first.
    pub reference: Option<String>,
    /// Record fields that differ when both lines are present.
    pub fields: Vec<&'static str>,
}

impl Divergence {
    fn locate(candidate: &CanonicalStream<'_>, reference: &CanonicalStream<'_>) -> Option<Self> {
        let idx = candidate.first_difference(reference)?;
        let test_line = candidate.lines().get(idx).copied();
        let gold_line = reference.lines().get(idx).copied();

        let fields = match (test_line, gold_line) {
            (Some(t), Some(g)) => match (MatchRecord::parse(t), MatchRecord::parse(g)) {
                (Ok(t), Ok(g)) => g.differing_fields(&t),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        let text = |l: &[u8]| String::from_utf8_lossy(l).into_owned();

        Some(Self {
            line: idx + 1,
            candidate: test_line.map(text),
            reference: gold_line.map(text),
            fields,
        })
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "first difference at canonical line {}:", self.line)?;
        match &self.reference {
            Some(line) => writeln!(f, "  reference: {}", line)?,
            None => writeln!(f, "  reference: <end of output>")?,
        }
        match &self.candidate {
            Some(line) => write!(f, "  candidate: {}", line)?,
            None => write!(f, "  candidate: <end of output>")?,
        }
        if !self.fields.is_empty() {
            write!(f, "\n  differing fields: {}", self.fields.join(", "))?;
        }
        Ok(())
    }
}

/// Everything learned from one comparison.
#[derive(Debug, Clone)]
pub struct Report {
    pub verdict: Verdict,
    pub candidate_stats: CanonicalSortStats,
    pub reference_stats: CanonicalSortStats,
    /// Candidate exit code (None if killed by a signal).
    pub candidate_exit: Option<i32>,
    pub candidate_succeeded: bool,
    /// Whether the gold artifact was produced during this run.
    pub gold_generated: bool,
    pub divergence: Option<Divergence>,
    /// Lines present more often in the candidate output than in the reference.
    pub only_in_candidate: usize,
    /// Lines present more often in the reference output than in the candidate.
    pub only_in_reference: usize,
    pub test_artifact: PathBuf,
    pub gold_artifact: PathBuf,
    /// Unified diff (reference -> candidate), truncated; only on `Differ`.
    pub diff: Option<String>,
}

impl Report {
    /// Process exit status for this verdict.
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Equal => EXIT_EQUAL,
            Verdict::Differ => EXIT_DIFFER,
        }
    }
}

/// Count lines whose multiplicity differs between the two streams.
fn multiset_difference(candidate: &[&[u8]], reference: &[&[u8]]) -> (usize, usize) {
    let mut counts: FxHashMap<&[u8], i64> = FxHashMap::default();
    for &line in candidate {
        *counts.entry(line).or_insert(0) += 1;
    }
    for &line in reference {
        *counts.entry(line).or_insert(0) -= 1;
    }

    counts.values().fold((0, 0), |(extra, missing), &n| {
        if n > 0 {
            (extra + n as usize, missing)
        } else {
            (extra, missing + n.unsigned_abs() as usize)
        }
    })
}

/// Render a unified diff from the reference to the candidate, at most
/// `max_lines` lines long.
fn unified_diff(
    reference: &CanonicalStream<'_>,
    candidate: &CanonicalStream<'_>,
    gold_name: &str,
    test_name: &str,
    max_lines: usize,
) -> String {
    let old = String::from_utf8_lossy(&reference.to_bytes()).into_owned();
    let new = String::from_utf8_lossy(&candidate.to_bytes()).into_owned();

    let diff = TextDiff::configure()
        .timeout(DIFF_TIMEOUT)
        .diff_lines(&old, &new);
    let rendered = diff
        .unified_diff()
        .context_radius(3)
        .header(gold_name, test_name)
        .to_string();

    let total = rendered.lines().count();
    let mut out: String = rendered
        .lines()
        .take(max_lines)
        .flat_map(|l| [l, "\n"])
        .collect();
    if total > max_lines {
        out.push_str(&format!("... ({} more diff lines)\n", total - max_lines));
    }
    out
}

/// Orchestrates one candidate vs reference comparison.
#[derive(Debug, Clone)]
pub struct CompareCommand {
    pub config: OracleConfig,
    pub sorter: CanonicalSortCommand,
    /// Run the candidate and gold generation concurrently.
    pub parallel: bool,
    /// Cap on unified-diff lines written on `Differ`.
    pub max_diff_lines: usize,
    /// Write per-stream statistics to the diagnostics sink.
    pub stats: bool,
}

impl Default for CompareCommand {
    fn default() -> Self {
        Self::new(OracleConfig::new())
    }
}

impl CompareCommand {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            config,
            sorter: CanonicalSortCommand::new(),
            parallel: false,
            max_diff_lines: DEFAULT_MAX_DIFF_LINES,
            stats: false,
        }
    }

    fn gold_cache(&self) -> GoldCache {
        GoldCache::new(&self.config.reference).with_lock_timeout(self.config.lock_timeout)
    }

    /// Obtain both raw outputs, writing progress lines to `diag`.
    fn collect<W: Write>(
        &self,
        input: &Path,
        invocation: &Invocation,
        diag: &mut W,
    ) -> Result<(ProcessOutput, GoldLookup)> {
        let candidate = ProcessRunner::new(&self.config.candidate);
        let cache = self.gold_cache();

        if self.parallel {
            if !cache.contains(input) {
                writeln!(diag, "generating gold comparison data")?;
            }
            let (test, gold) = rayon::join(
                || candidate.run(invocation),
                || cache.get_or_generate(input),
            );
            let gold = gold?;
            writeln!(diag, "finished gold")?;
            let test = test?;
            writeln!(diag, "finished test")?;
            return Ok((test, gold));
        }

        let test = candidate.run(invocation)?;
        writeln!(diag, "finished test")?;

        if !cache.contains(input) {
            writeln!(diag, "generating gold comparison data")?;
        }
        let gold = cache.get_or_generate(input)?;
        writeln!(diag, "finished gold")?;

        Ok((test, gold))
    }

    /// Compare candidate and reference on `input`.
    ///
    /// Returns a report for both verdicts; an `Err` means no verdict could
    /// be reached.
    pub fn run<W: Write>(
        &self,
        input: &Path,
        device: &DeviceSelector,
        diag: &mut W,
    ) -> Result<Report> {
        let invocation = Invocation::new(input, device.clone(), OutputSink::Stdout)?;

        writeln!(diag, "started")?;
        let (test, gold) = self.collect(input, &invocation, diag)?;

        if !test.success() {
            writeln!(diag, "warning: candidate program failed ({})", test.status)?;
        }

        let (test_canon, candidate_stats) =
            self.sorter.canonicalize(&test.stdout, StreamKind::Candidate)?;
        let (gold_canon, reference_stats) =
            self.sorter.canonicalize(&gold.output, StreamKind::Reference)?;

        if self.stats {
            writeln!(
                diag,
                "candidate stats: {}, Mmap: {}",
                candidate_stats,
                if test.stdout.is_mapped() { "yes" } else { "no" }
            )?;
            writeln!(
                diag,
                "reference stats: {}, Mmap: {}",
                reference_stats,
                if gold.output.is_mapped() { "yes" } else { "no" }
            )?;
        }

        let test_artifact = artifact_path(input, TEST_SORTED_SUFFIX);
        let gold_artifact = artifact_path(input, GOLD_SORTED_SUFFIX);
        // Stage both before replacing either; only the renames can fail after this
        let staged_test = test_canon.stage(&test_artifact)?;
        let staged_gold = gold_canon.stage(&gold_artifact)?;
        staged_test.commit()?;
        staged_gold
            .commit()
            .map_err(|source| OracleError::StaleArtifact {
                stale: gold_artifact.clone(),
                updated: test_artifact.clone(),
                source,
            })?;

        let divergence = Divergence::locate(&test_canon, &gold_canon);
        let verdict = if divergence.is_none() && test.success() {
            Verdict::Equal
        } else {
            Verdict::Differ
        };

        let mut report = Report {
            verdict,
            candidate_stats,
            reference_stats,
            candidate_exit: test.exit_code(),
            candidate_succeeded: test.success(),
            gold_generated: gold.generated,
            divergence,
            only_in_candidate: 0,
            only_in_reference: 0,
            test_artifact,
            gold_artifact,
            diff: None,
        };

        if let Some(divergence) = &report.divergence {
            let (extra, missing) = multiset_difference(test_canon.lines(), gold_canon.lines());
            report.only_in_candidate = extra;
            report.only_in_reference = missing;

            let diff = unified_diff(
                &gold_canon,
                &test_canon,
                &report.gold_artifact.to_string_lossy(),
                &report.test_artifact.to_string_lossy(),
                self.max_diff_lines,
            );

            writeln!(diag, "{}", divergence)?;
            writeln!(
                diag,
                "{} line(s) only in candidate, {} line(s) only in reference",
                extra, missing
            )?;
            write!(diag, "{}", diff)?;
            report.diff = Some(diff);
        }

        writeln!(diag, "{}", report.verdict)?;
        Ok(report)
    }
}
