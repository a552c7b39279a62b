//! Owned or memory-mapped views of program output.

use crate::streaming::buffers::{DEFAULT_INPUT_BUFFER, MMAP_THRESHOLD};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::Path;

/// Bytes produced by an external program, either read into memory or mapped.
///
/// Large outputs are spooled to disk and mapped instead of being
/// concatenated in memory.
pub enum CapturedOutput {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl CapturedOutput {
    /// Load the full contents of `file`, regardless of its current offset.
    pub fn from_file(mut file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();

        if len >= MMAP_THRESHOLD {
            // The file is private to this process (a spool file or a gold
            // artifact that is only ever replaced by rename, never rewritten).
            let mmap = unsafe { Mmap::map(&file)? };
            Ok(CapturedOutput::Mapped(mmap))
        } else {
            file.seek(SeekFrom::Start(0))?;
            let mut data = Vec::with_capacity((len as usize).min(DEFAULT_INPUT_BUFFER));
            file.read_to_end(&mut data)?;
            Ok(CapturedOutput::Owned(data))
        }
    }

    /// Open and load a file on disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::from_file(File::open(path)?)
    }

    /// Whether the bytes are backed by a memory map.
    pub fn is_mapped(&self) -> bool {
        matches!(self, CapturedOutput::Mapped(_))
    }
}

impl Deref for CapturedOutput {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            CapturedOutput::Mapped(m) => m,
            CapturedOutput::Owned(v) => v,
        }
    }
}

impl From<Vec<u8>> for CapturedOutput {
    fn from(data: Vec<u8>) -> Self {
        CapturedOutput::Owned(data)
    }
}

impl std::fmt::Debug for CapturedOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedOutput")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
