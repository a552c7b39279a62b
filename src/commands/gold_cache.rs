//! Gold-result cache for reference program output.
//!
//! The reference program is slow, so its gold-mode output for an input file
//! is stored next to the input as `<input>.gold` and reused on later runs.
//!
//! Guarantees:
//! - A cache hit never runs the reference program and never re-validates the
//!   artifact (remove it by hand when the input changes).
//! - The artifact only ever appears complete: the reference writes into a
//!   private temp directory and the result is renamed into place.
//! - Concurrent callers on the same input serialize on an exclusive OS lock
//!   held on `<input>.gold.lock`, so the reference runs once and the others
//!   reuse its artifact. The lock file stays on disk; the lock itself is
//!   released by the OS when the holder exits, even if it is killed.
//! - A failed generation is fatal and is not retried.

use crate::commands::runner::{DeviceSelector, Invocation, OutputSink, ProcessRunner};
use crate::config::{artifact_path, DEFAULT_LOCK_TIMEOUT, GOLD_SUFFIX, LOCK_SUFFIX};
use crate::error::{OracleError, Result};
use crate::streaming::{parent_dir, CapturedOutput};
use fs4::fs_std::FileExt;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Interval between checks while another process holds the lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Gold output for one input, and whether this call had to produce it.
#[derive(Debug)]
pub struct GoldLookup {
    pub output: CapturedOutput,
    pub generated: bool,
    pub artifact: PathBuf,
}

/// Exclusive lock on the generation lock file, released when dropped.
#[derive(Debug)]
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Get-or-generate cache over the reference program.
#[derive(Debug, Clone)]
pub struct GoldCache {
    runner: ProcessRunner,
    lock_timeout: Duration,
}

impl GoldCache {
    pub fn new(reference: impl Into<PathBuf>) -> Self {
        Self {
            runner: ProcessRunner::new(reference),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Where the gold artifact for `input` lives.
    pub fn artifact_path(input: &Path) -> PathBuf {
        artifact_path(input, GOLD_SUFFIX)
    }

    /// Whether a gold artifact already exists for `input`.
    pub fn contains(&self, input: &Path) -> bool {
        Self::artifact_path(input).is_file()
    }

    /// Return the cached gold output, if present.
    pub fn get(&self, input: &Path) -> Result<Option<CapturedOutput>> {
        load(&Self::artifact_path(input))
    }

    /// Return the gold output for `input`, running the reference program in
    /// gold mode only if no artifact exists yet.
    pub fn get_or_generate(&self, input: &Path) -> Result<GoldLookup> {
        let artifact = Self::artifact_path(input);

        if let Some(output) = load(&artifact)? {
            return Ok(GoldLookup {
                output,
                generated: false,
                artifact,
            });
        }

        let _lock = self.acquire_lock(&artifact)?;

        // Another process may have finished while we waited for the lock
        if let Some(output) = load(&artifact)? {
            return Ok(GoldLookup {
                output,
                generated: false,
                artifact,
            });
        }

        self.generate(input, &artifact)?;

        let output = load(&artifact)?.ok_or_else(|| OracleError::ReferenceGeneration {
            artifact: artifact.clone(),
            reason: "artifact vanished after generation".to_string(),
        })?;

        Ok(GoldLookup {
            output,
            generated: true,
            artifact,
        })
    }

    /// Run the reference program into a staging directory, then move the
    /// finished artifact into place.
    fn generate(&self, input: &Path, artifact: &Path) -> Result<()> {
        let staging = tempfile::Builder::new()
            .prefix(".gold-")
            .tempdir_in(parent_dir(artifact))?;
        let staged = staging
            .path()
            .join(artifact.file_name().unwrap_or_else(|| OsStr::new("gold")));

        let invocation = Invocation::new(
            input,
            DeviceSelector::gold(),
            OutputSink::File(staged.clone()),
        )?;

        let output = self.runner.run(&invocation).map_err(|e| match e {
            OracleError::ProcessLaunch { program, source } => OracleError::ReferenceGeneration {
                artifact: artifact.to_path_buf(),
                reason: format!("could not launch '{}': {}", program.display(), source),
            },
            other => other,
        })?;

        if !output.success() {
            return Err(OracleError::ReferenceGeneration {
                artifact: artifact.to_path_buf(),
                reason: format!("reference program failed ({})", output.status),
            });
        }
        if !staged.is_file() {
            return Err(OracleError::ReferenceGeneration {
                artifact: artifact.to_path_buf(),
                reason: "reference program exited successfully but wrote no output file"
                    .to_string(),
            });
        }

        fs::rename(&staged, artifact)?;
        Ok(())
    }

    /// Take the generation lock for `artifact`, waiting for any holder.
    fn acquire_lock(&self, artifact: &Path) -> Result<LockGuard> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path(artifact))?;
        let started = Instant::now();

        loop {
            if FileExt::try_lock_exclusive(&file)? {
                return Ok(LockGuard { file });
            }
            if started.elapsed() >= self.lock_timeout {
                return Err(OracleError::ArtifactLocked {
                    artifact: artifact.to_path_buf(),
                });
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}

/// Path of the lock file guarding generation of `artifact`.
fn lock_path(artifact: &Path) -> PathBuf {
    artifact_path(artifact, LOCK_SUFFIX)
}

/// Load an artifact, treating a missing file as a miss.
fn load(path: &Path) -> Result<Option<CapturedOutput>> {
    match File::open(path) {
        Ok(file) => Ok(Some(CapturedOutput::from_file(file)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
