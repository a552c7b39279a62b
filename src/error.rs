//! Error taxonomy for the comparison oracle.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit status when the two implementations agree.
pub const EXIT_EQUAL: i32 = 0;

/// Exit status when the comparison ran and found a difference.
pub const EXIT_DIFFER: i32 = 1;

/// Exit status when the comparison could not be run at all.
pub const EXIT_HARNESS_FAILURE: i32 = 2;

/// Which program produced a stream of match records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// The implementation under test.
    Candidate,
    /// The trusted implementation (gold output).
    Reference,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Candidate => write!(f, "candidate"),
            StreamKind::Reference => write!(f, "reference"),
        }
    }
}

/// Errors that prevent a comparison from producing a verdict.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Usage error: {0}")]
    Usage(String),

    #[error("Failed to launch '{}': {source}", program.display())]
    ProcessLaunch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Reference program did not produce '{}': {reason}", artifact.display())]
    ReferenceGeneration { artifact: PathBuf, reason: String },

    #[error("Malformed record in {stream} output at line {line}: {message}: '{content}'")]
    MalformedRecord {
        stream: StreamKind,
        line: usize,
        message: String,
        content: String,
    },

    #[error("Timed out waiting for lock on '{}'", artifact.display())]
    ArtifactLocked { artifact: PathBuf },

    #[error(
        "Failed to replace '{}': {source}; '{}' was already updated and no longer matches it",
        stale.display(),
        updated.display()
    )]
    StaleArtifact {
        stale: PathBuf,
        updated: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OracleError {
    /// Process exit status for this failure.
    ///
    /// Every error means the harness could not judge equivalence, which
    /// automation must be able to tell apart from a real regression.
    pub fn exit_code(&self) -> i32 {
        EXIT_HARNESS_FAILURE
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
