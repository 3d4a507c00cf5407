//! Positional chunked file reads.
//!
//! A [`ChunkSource`] snapshots the file length at open and serves byte
//! ranges by chunk index. Reads are positional (`read_at` style), so any
//! number of workers can read different chunks through one shared handle
//! without a cursor to race on.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;

/// What to do when a chunk reads fewer bytes than its range spans.
///
/// The file length is snapshotted at open, so a shortfall means the file
/// was truncated or the underlying storage is misbehaving. Hashing the
/// partial bytes anyway produces a digest that will not match the file
/// the caller thinks it has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShortReadPolicy {
    /// Log a warning, count the anomaly, and hash what was read
    #[default]
    Warn,
    /// Fail the read with [`Error::ShortRead`]
    Fail,
}

/// Outcome of one chunk read
#[derive(Debug, Clone, Copy)]
pub struct ChunkRead {
    /// Bytes placed in the caller's buffer
    pub len: usize,
    /// True when the read fell short of the chunk's expected range
    pub anomalous: bool,
}

/// Shared read handle over one file, addressed by chunk index
#[derive(Debug)]
pub struct ChunkSource {
    file: File,
    size: u64,
    chunk_size: usize,
    short_reads: ShortReadPolicy,
    anomalies: AtomicU64,
}

impl ChunkSource {
    /// Open a file and snapshot its length
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or the file cannot be
    /// opened or stat'ed.
    pub fn open<P: AsRef<Path>>(path: P, chunk_size: usize) -> Result<Self, Error> {
        if chunk_size == 0 {
            return Err(Error::InvalidChunkSize);
        }
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            file,
            size,
            chunk_size,
            short_reads: ShortReadPolicy::default(),
            anomalies: AtomicU64::new(0),
        })
    }

    /// Set the short-read policy
    #[must_use]
    pub fn short_read_policy(mut self, policy: ShortReadPolicy) -> Self {
        self.short_reads = policy;
        self
    }

    /// File length at open time
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Configured chunk size
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total number of chunks
    #[must_use]
    pub fn num_chunks(&self) -> u64 {
        self.size.div_ceil(self.chunk_size as u64)
    }

    /// Number of short reads observed under [`ShortReadPolicy::Warn`]
    #[must_use]
    pub fn anomalous_reads(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }

    /// Read one chunk's byte range into `buf`
    ///
    /// `buf` is resized to the chunk's expected length and truncated to
    /// the bytes actually read; reusing one buffer across calls avoids
    /// reallocation. Safe to call concurrently from multiple threads.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is past the last chunk, if the read
    /// fails, or if the read falls short under [`ShortReadPolicy::Fail`].
    pub fn read_chunk(&self, index: u64, buf: &mut Vec<u8>) -> Result<ChunkRead, Error> {
        let num_chunks = self.num_chunks();
        if index >= num_chunks {
            return Err(Error::ChunkOutOfRange { index, num_chunks });
        }

        let offset = index * self.chunk_size as u64;
        let expected = (self.size - offset).min(self.chunk_size as u64) as usize;
        buf.resize(expected, 0);

        let mut filled = 0;
        while filled < expected {
            match read_at(&self.file, &mut buf[filled..expected], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        buf.truncate(filled);

        if filled < expected {
            match self.short_reads {
                ShortReadPolicy::Fail => {
                    return Err(Error::ShortRead {
                        index,
                        expected,
                        got: filled,
                    });
                }
                ShortReadPolicy::Warn => {
                    self.anomalies.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        index,
                        expected,
                        got = filled,
                        "chunk read came up short of the length recorded at open"
                    );
                    return Ok(ChunkRead {
                        len: filled,
                        anomalous: true,
                    });
                }
            }
        }

        Ok(ChunkRead {
            len: filled,
            anomalous: false,
        })
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
