//! Byte-level utilities shared by the oracle commands.
//!
//! This module provides:
//! - Zero-allocation line and field scanning
//! - Owned or memory-mapped capture of program output
//! - Atomic (temp file + rename) artifact writing

pub mod buffers;
pub mod captured;
pub mod output;
pub mod parsing;

pub use captured::CapturedOutput;
pub use output::{parent_dir, ArtifactWriter, StagedArtifact};
pub use parsing::{line_spans, parse_u64_fast, split_tabs, strip_cr};
