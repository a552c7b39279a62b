//! Buffer size and threshold constants for output handling.
//!
//! These constants control memory usage vs I/O throughput tradeoffs.

/// Default artifact write buffer size (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Default read buffer for small captured outputs (256 KB).
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Minimum file size to memory-map (smaller files are read into a Vec).
/// Also keeps empty outputs away from mmap, which rejects zero-length maps.
pub const MMAP_THRESHOLD: u64 = 64 * 1024;

/// Minimum record count before the canonical sort runs on rayon.
pub const PARALLEL_SORT_THRESHOLD: usize = 10_000;
