//! Runtime configuration for the comparison oracle.
//!
//! Locates the candidate and reference executables and names the artifacts
//! derived from an input file. Defaults match the usual build layout:
//! the candidate is the freshly built release binary and the reference is a
//! trusted binary dropped into `./bin`.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the candidate executable.
pub const CANDIDATE_ENV: &str = "COMPARE_IMPLS_CANDIDATE";

/// Environment variable overriding the reference executable.
pub const REFERENCE_ENV: &str = "COMPARE_IMPLS_REFERENCE";

/// Suffix of the cached raw reference output.
pub const GOLD_SUFFIX: &str = ".gold";

/// Suffix of the canonicalized reference output.
pub const GOLD_SORTED_SUFFIX: &str = ".gold.sorted";

/// Suffix of the canonicalized candidate output.
pub const TEST_SORTED_SUFFIX: &str = ".test.sorted";

/// Suffix of the lock guarding gold generation.
pub const LOCK_SUFFIX: &str = ".lock";

/// How long to wait for another process generating the same gold artifact.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(600);

/// Default candidate executable (the release build of the new implementation).
pub fn default_candidate() -> PathBuf {
    PathBuf::from(format!(
        "./target/release/cas-offinder-cli{}",
        env::consts::EXE_SUFFIX
    ))
}

/// Default reference executable.
pub fn default_reference() -> PathBuf {
    PathBuf::from(format!("./bin/cas-offinder-2{}", env::consts::EXE_SUFFIX))
}

/// Append `suffix` to the full input path (`in.txt` -> `in.txt.gold`).
pub fn artifact_path(input: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(input.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Executables and limits for one comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    /// Implementation under test.
    pub candidate: PathBuf,
    /// Trusted implementation producing gold output.
    pub reference: PathBuf,
    /// Upper bound on waiting for a concurrent gold generation.
    pub lock_timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl OracleConfig {
    pub fn new() -> Self {
        Self {
            candidate: default_candidate(),
            reference: default_reference(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Defaults, overridden by `COMPARE_IMPLS_CANDIDATE` / `COMPARE_IMPLS_REFERENCE`.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(path) = env::var_os(CANDIDATE_ENV).filter(|v| !v.is_empty()) {
            config.candidate = PathBuf::from(path);
        }
        if let Some(path) = env::var_os(REFERENCE_ENV).filter(|v| !v.is_empty()) {
            config.reference = PathBuf::from(path);
        }
        config
    }

    pub fn with_candidate(mut self, path: impl Into<PathBuf>) -> Self {
        self.candidate = path.into();
        self
    }

    pub fn with_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference = path.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}
