//! Crash-safe artifact output.
//!
//! Artifacts are written to a temporary file in the destination directory and
//! renamed over the target only once complete, so a reader (or a later run)
//! never observes a truncated file.

use crate::streaming::buffers::DEFAULT_OUTPUT_BUFFER;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Directory that will hold `path`, defaulting to the current directory.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Buffered writer that replaces its target atomically on [`commit`].
///
/// Dropping the writer without committing discards everything written and
/// leaves any previous artifact untouched.
///
/// [`commit`]: ArtifactWriter::commit
pub struct ArtifactWriter {
    writer: BufWriter<NamedTempFile>,
    target: PathBuf,
}

impl ArtifactWriter {
    /// Start writing a new version of `target`.
    pub fn create<P: AsRef<Path>>(target: P) -> io::Result<Self> {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, target)
    }

    /// Start writing with a specific buffer size.
    pub fn with_capacity<P: AsRef<Path>>(capacity: usize, target: P) -> io::Result<Self> {
        let target = target.as_ref().to_path_buf();
        let tmp = NamedTempFile::new_in(parent_dir(&target))?;
        Ok(Self {
            writer: BufWriter::with_capacity(capacity, tmp),
            target,
        })
    }

    /// Write a line body followed by a newline.
    #[inline]
    pub fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.writer.write_all(line)?;
        self.writer.write_all(b"\n")
    }

    /// Write raw bytes.
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    /// Path that will be replaced on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush and sync the temporary file without touching the target.
    pub fn finish(self) -> io::Result<StagedArtifact> {
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.as_file().sync_all()?;
        Ok(StagedArtifact {
            file,
            target: self.target,
        })
    }

    /// Flush and atomically move the finished file into place.
    pub fn commit(self) -> io::Result<PathBuf> {
        self.finish()?.commit()
    }
}

/// A fully written artifact waiting to replace its target.
///
/// Only the rename remains, so several artifacts can be staged first and
/// then committed back to back. Dropping it discards the temporary file.
#[derive(Debug)]
pub struct StagedArtifact {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedArtifact {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file over the target.
    pub fn commit(self) -> io::Result<PathBuf> {
        self.file.persist(&self.target).map_err(|e| e.error)?;
        Ok(self.target)
    }
}

impl Write for ArtifactWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
