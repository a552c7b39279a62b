//! Oracle command implementations.

pub mod canonical_sort;
pub mod compare;
pub mod gold_cache;
pub mod runner;

pub use canonical_sort::{CanonicalSortCommand, CanonicalSortStats, CanonicalStream, TieBreak};
pub use compare::{CompareCommand, Divergence, Report, Verdict, DEFAULT_MAX_DIFF_LINES};
pub use gold_cache::{GoldCache, GoldLookup};
pub use runner::{DeviceSelector, Invocation, OutputSink, ProcessOutput, ProcessRunner};
