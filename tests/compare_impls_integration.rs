//! Integration tests for the end-to-end comparison.
//!
//! Candidate and reference programs are replaced by small shell scripts that
//! follow the `<input> <device> <sink>` convention:
//! - the candidate prints `candidate.out` to stdout when the sink is `-`
//! - the reference copies `reference.out` to the sink path and records each
//!   invocation in `reference.calls`
//!
//! Tests verify:
//! 1. Reordered but identical outputs are judged equal
//! 2. A changed mismatch field is judged different and located
//! 3. Gold output is generated once and reused
//! 4. Harness failures exit 2, differences exit 1, agreement exits 0
//! 5. Failures leave earlier artifacts untouched
//! 6. A killed run does not block later gold generation

#![cfg(unix)]

use offtarget_oracle::commands::{CompareCommand, DeviceSelector, GoldCache, Verdict};
use offtarget_oracle::config::OracleConfig;
use offtarget_oracle::error::{OracleError, StreamKind};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const LINE_100: &str = "GATTACA\tchr1\t100\tGATTACA\t+\t0";
const LINE_50: &str = "GATTACA\tchr1\t50\tGATTAAA\t+\t1";
const LINE_50_TWO: &str = "GATTACA\tchr1\t50\tGATTAAA\t+\t2";

/// Scratch directory with fake programs and an input file.
struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("input.txt"),
            "/data/genome\nNNNNNNNNNNNNNNNNNNNNNRG\nGATTACANNNNNNNNNNNNNNNN 3\n",
        )
        .unwrap();

        let harness = Self { dir };
        harness.script(
            "candidate.sh",
            &format!(
                "[ \"$3\" = - ] || exit 7\ncat '{}'\n",
                harness.path("candidate.out").display()
            ),
        );
        harness.script(
            "reference.sh",
            &format!(
                "echo \"$1 $2\" >> '{}'\ncat '{}' > \"$3\"\n",
                harness.path("reference.calls").display(),
                harness.path("reference.out").display()
            ),
        );
        harness
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn input(&self) -> PathBuf {
        self.path("input.txt")
    }

    fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn set_outputs(&self, candidate: &[&str], reference: &[&str]) {
        fs::write(self.path("candidate.out"), join_lines(candidate)).unwrap();
        fs::write(self.path("reference.out"), join_lines(reference)).unwrap();
    }

    fn config(&self) -> OracleConfig {
        OracleConfig::new()
            .with_candidate(self.path("candidate.sh"))
            .with_reference(self.path("reference.sh"))
    }

    fn reference_calls(&self) -> usize {
        fs::read_to_string(self.path("reference.calls"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn artifact(&self, suffix: &str) -> PathBuf {
        let mut name = self.input().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn compare(&self) -> (Result<offtarget_oracle::commands::Report, OracleError>, String) {
        let mut diag = Vec::new();
        let device = DeviceSelector::new("C").unwrap();
        let result = CompareCommand::new(self.config()).run(&self.input(), &device, &mut diag);
        (result, String::from_utf8(diag).unwrap())
    }

    fn run_binary(&self, args: &[&str]) -> std::process::Output {
        Command::new(env!("CARGO_BIN_EXE_compare-impls"))
            .args(args)
            .env("COMPARE_IMPLS_CANDIDATE", self.path("candidate.sh"))
            .env("COMPARE_IMPLS_REFERENCE", self.path("reference.sh"))
            .current_dir(self.dir.path())
            .output()
            .expect("Failed to run compare-impls")
    }
}

fn join_lines(lines: &[&str]) -> String {
    lines.iter().map(|l| format!("{}\n", l)).collect()
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_reordered_outputs_are_equal() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100, LINE_50], &[LINE_50, LINE_100]);

    let (result, diag) = h.compare();
    let report = result.unwrap();

    assert_eq!(report.verdict, Verdict::Equal);
    assert_eq!(report.exit_code(), 0);
    assert!(report.divergence.is_none());
    assert!(report.gold_generated);
    assert_eq!(report.candidate_stats.records, 2);
    assert_eq!(report.reference_stats.records, 2);

    // Canonical artifacts are identical and in sorted order
    let expected = join_lines(&[LINE_50, LINE_100]);
    assert_eq!(read(&h.artifact(".test.sorted")), expected);
    assert_eq!(read(&h.artifact(".gold.sorted")), expected);
    // The gold cache holds the raw reference output unchanged
    assert_eq!(read(&h.artifact(".gold")), join_lines(&[LINE_50, LINE_100]));

    assert!(diag.contains("started"));
    assert!(diag.contains("generating gold comparison data"));
    assert!(diag.contains("finished gold"));
    assert!(diag.contains("finished test"));
    assert!(diag.trim_end().ends_with("files are the same"));
}

#[test]
fn test_changed_mismatch_count_differs() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100, LINE_50], &[LINE_100, LINE_50_TWO]);

    let (result, diag) = h.compare();
    let report = result.unwrap();

    assert_eq!(report.verdict, Verdict::Differ);
    assert_eq!(report.exit_code(), 1);

    let divergence = report.divergence.expect("divergence should be located");
    assert_eq!(divergence.line, 1);
    assert_eq!(divergence.candidate.as_deref(), Some(LINE_50));
    assert_eq!(divergence.reference.as_deref(), Some(LINE_50_TWO));
    assert_eq!(report.only_in_candidate, 1);
    assert_eq!(report.only_in_reference, 1);
    assert_eq!(divergence.fields, vec!["mismatches"]);

    let diff = report.diff.unwrap();
    assert!(diff.contains(&format!("-{}", LINE_50_TWO)));
    assert!(diff.contains(&format!("+{}", LINE_50)));

    assert!(diag.contains("first difference at canonical line 1"));
    assert!(diag.contains("differing fields: mismatches"));
    assert!(diag.trim_end().ends_with("files differed"));

    // Artifacts are still written for inspection
    assert_eq!(
        read(&h.artifact(".gold.sorted")),
        join_lines(&[LINE_50_TWO, LINE_100])
    );
}

#[test]
fn test_gold_generated_once() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);

    let (first, first_diag) = h.compare();
    let (second, second_diag) = h.compare();

    assert!(first.unwrap().gold_generated);
    assert!(!second.unwrap().gold_generated);
    assert_eq!(h.reference_calls(), 1);
    assert!(first_diag.contains("generating gold comparison data"));
    assert!(!second_diag.contains("generating gold comparison data"));

    // The reference is always asked for gold mode, whatever the device
    let calls = read(&h.path("reference.calls"));
    assert!(calls.trim_end().ends_with(" G"));
}

#[test]
fn test_stale_gold_is_not_revalidated() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);
    fs::write(GoldCache::artifact_path(&h.input()), join_lines(&[LINE_50])).unwrap();

    let (result, _) = h.compare();
    let report = result.unwrap();

    assert_eq!(report.verdict, Verdict::Differ);
    assert_eq!(h.reference_calls(), 0);
}

#[test]
fn test_duplicate_lines_matter() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100, LINE_100], &[LINE_100]);

    let (result, _) = h.compare();
    let report = result.unwrap();

    assert_eq!(report.verdict, Verdict::Differ);
    assert_eq!(report.only_in_candidate, 1);
    assert_eq!(report.only_in_reference, 0);
    let divergence = report.divergence.unwrap();
    assert_eq!(divergence.line, 2);
    assert_eq!(divergence.reference, None);
}

#[test]
fn test_malformed_candidate_record() {
    let h = Harness::new();
    let short = "GATTACA\tchr1\t100\tGATTACA\t+";
    h.set_outputs(&[LINE_100, short], &[LINE_100]);

    // Artifacts from an earlier good run must survive
    fs::write(h.artifact(".test.sorted"), "previous\n").unwrap();

    let (result, _) = h.compare();
    match result.unwrap_err() {
        OracleError::MalformedRecord {
            stream,
            line,
            content,
            ..
        } => {
            assert_eq!(stream, StreamKind::Candidate);
            assert_eq!(line, 2);
            assert_eq!(content, short);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(read(&h.artifact(".test.sorted")), "previous\n");
    assert!(!h.artifact(".gold.sorted").exists());
}

#[test]
fn test_candidate_failure_forces_differ() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);
    h.script(
        "candidate.sh",
        &format!("cat '{}'\nexit 4\n", h.path("candidate.out").display()),
    );

    let (result, diag) = h.compare();
    let report = result.unwrap();

    assert_eq!(report.verdict, Verdict::Differ);
    assert_eq!(report.candidate_exit, Some(4));
    assert!(!report.candidate_succeeded);
    assert!(report.divergence.is_none());
    assert!(diag.contains("candidate program failed"));
}

#[test]
fn test_parallel_mode() {
    let h = Harness::new();
    h.set_outputs(&[LINE_50, LINE_100], &[LINE_100, LINE_50]);

    let mut cmd = CompareCommand::new(h.config());
    cmd.parallel = true;
    let mut diag = Vec::new();
    let report = cmd
        .run(&h.input(), &DeviceSelector::new("C").unwrap(), &mut diag)
        .unwrap();

    assert_eq!(report.verdict, Verdict::Equal);
    assert!(report.gold_generated);
    assert_eq!(h.reference_calls(), 1);
    let diag = String::from_utf8(diag).unwrap();
    assert!(diag.contains("generating gold comparison data"));
    assert!(diag.contains("finished gold"));
}

#[test]
fn test_unreplaceable_gold_artifact_is_reported() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);
    fs::write(h.artifact(".test.sorted"), "previous\n").unwrap();
    // A non-empty directory cannot be replaced by a rename
    fs::create_dir(h.artifact(".gold.sorted")).unwrap();
    fs::write(h.artifact(".gold.sorted").join("keep"), "x").unwrap();

    let (result, _) = h.compare();
    match result.unwrap_err() {
        OracleError::StaleArtifact { stale, updated, .. } => {
            assert_eq!(stale, h.artifact(".gold.sorted"));
            assert_eq!(updated, h.artifact(".test.sorted"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(read(&h.artifact(".test.sorted")), join_lines(&[LINE_100]));
}

#[test]
fn test_killed_run_does_not_block_gold_generation() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);
    let slow = h.path("slow");
    fs::write(&slow, "").unwrap();
    h.script(
        "reference.sh",
        &format!(
            "echo \"$1 $2\" >> '{}'\n[ -f '{}' ] && sleep 5\ncat '{}' > \"$3\"\n",
            h.path("reference.calls").display(),
            slow.display(),
            h.path("reference.out").display()
        ),
    );

    let mut child = Command::new(env!("CARGO_BIN_EXE_compare-impls"))
        .args(["input.txt", "C"])
        .env("COMPARE_IMPLS_CANDIDATE", h.path("candidate.sh"))
        .env("COMPARE_IMPLS_REFERENCE", h.path("reference.sh"))
        .current_dir(h.dir.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Once the reference has started, the gold lock is held
    let deadline = Instant::now() + Duration::from_secs(10);
    while h.reference_calls() == 0 {
        assert!(Instant::now() < deadline, "reference never started");
        thread::sleep(Duration::from_millis(20));
    }
    child.kill().unwrap();
    child.wait().unwrap();
    fs::remove_file(&slow).unwrap();

    assert!(h.artifact(".gold.lock").exists());
    assert!(!h.artifact(".gold").exists());

    let cmd = CompareCommand::new(h.config().with_lock_timeout(Duration::from_secs(2)));
    let mut diag = Vec::new();
    let report = cmd
        .run(&h.input(), &DeviceSelector::new("C").unwrap(), &mut diag)
        .unwrap();

    assert_eq!(report.verdict, Verdict::Equal);
    assert!(report.gold_generated);
    assert_eq!(h.reference_calls(), 2);
}

#[test]
fn test_binary_exit_codes() {
    let h = Harness::new();

    h.set_outputs(&[LINE_100, LINE_50], &[LINE_50, LINE_100]);
    let out = h.run_binary(&["input.txt", "C"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stderr).contains("files are the same"));

    // Gold is cached now; change the candidate instead
    h.set_outputs(&[LINE_100, LINE_50_TWO], &[LINE_50, LINE_100]);
    let out = h.run_binary(&["input.txt", "C"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("files differed"));
}

#[test]
fn test_binary_usage_error() {
    let h = Harness::new();

    let out = h.run_binary(&["input.txt"]);
    assert_eq!(out.status.code(), Some(2));

    let out = h.run_binary(&["input.txt", "C", "extra"]);
    assert_eq!(out.status.code(), Some(2));

    // Nothing ran, nothing was written
    assert!(!h.artifact(".gold").exists());
    assert!(!h.artifact(".test.sorted").exists());
}

#[test]
fn test_binary_missing_candidate() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);

    let out = Command::new(env!("CARGO_BIN_EXE_compare-impls"))
        .args(["input.txt", "C", "--candidate", "./no-such-candidate"])
        .env("COMPARE_IMPLS_REFERENCE", h.path("reference.sh"))
        .current_dir(h.dir.path())
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("Failed to launch"));
    assert!(stderr.contains("no-such-candidate"));
}

#[test]
fn test_binary_flag_overrides_environment() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);

    let out = Command::new(env!("CARGO_BIN_EXE_compare-impls"))
        .args(["input.txt", "C", "--candidate"])
        .arg(h.path("candidate.sh"))
        .env("COMPARE_IMPLS_CANDIDATE", "./no-such-candidate")
        .env("COMPARE_IMPLS_REFERENCE", h.path("reference.sh"))
        .current_dir(h.dir.path())
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn test_binary_reference_failure() {
    let h = Harness::new();
    h.set_outputs(&[LINE_100], &[LINE_100]);
    h.script("reference.sh", "exit 1\n");

    let out = h.run_binary(&["input.txt", "C"]);

    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Reference program"));
    assert!(!h.artifact(".gold").exists());
}
