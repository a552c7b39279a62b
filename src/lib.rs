//! Differential-testing oracle for genomic off-target search tools.
//!
//! Runs a candidate implementation and a trusted reference on the same input
//! and decides whether they agree. The two programs may enumerate matches in
//! any order, so both outputs are put into a canonical order before an exact
//! comparison.
//!
//! # Features
//!
//! - **Canonical ordering**: stable sort on `(chromosome, position, strand, guide, mismatches)`
//! - **Gold cache**: reference output is generated once per input and reused
//! - **Crash-safe artifacts**: every file is written to a temp path and renamed into place
//! - **Located evidence**: first differing line plus a unified diff on mismatch
//!
//! # Example
//!
//! ```rust,no_run
//! use offtarget_oracle::commands::{CompareCommand, DeviceSelector};
//! use offtarget_oracle::config::OracleConfig;
//! use std::path::Path;
//!
//! let cmd = CompareCommand::new(OracleConfig::from_env());
//! let device = DeviceSelector::new("C").unwrap();
//! let report = cmd
//!     .run(Path::new("input.txt"), &device, &mut std::io::stderr())
//!     .unwrap();
//! std::process::exit(report.exit_code());
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod record;
pub mod streaming;

// Re-export commonly used types
pub use error::{OracleError, Result, StreamKind};
pub use record::{CanonicalKey, MatchRecord, MismatchText, RecordError, Strand};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{
        CanonicalSortCommand, CompareCommand, DeviceSelector, GoldCache, Invocation, OutputSink,
        ProcessRunner, Report, TieBreak, Verdict,
    };
    pub use crate::config::OracleConfig;
    pub use crate::error::{OracleError, StreamKind};
    pub use crate::record::{CanonicalKey, MatchRecord};
}
