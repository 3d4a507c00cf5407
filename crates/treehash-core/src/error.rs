//! Error types for the tree hashing engine.

use thiserror::Error;

/// Tree hashing errors
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying file I/O failure
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A chunk read returned fewer bytes than the file length implies
    #[error("chunk {index} read {got} of {expected} expected bytes")]
    ShortRead {
        /// Chunk index that came up short
        index: u64,
        /// Bytes the chunk range spans
        expected: usize,
        /// Bytes actually read
        got: usize,
    },

    /// Chunk size of zero was requested
    #[error("chunk size must be nonzero")]
    InvalidChunkSize,

    /// Chunk index past the end of the file
    #[error("chunk index {index} out of range ({num_chunks} chunks)")]
    ChunkOutOfRange {
        /// Requested chunk index
        index: u64,
        /// Total number of chunks in the file
        num_chunks: u64,
    },

    /// A worker thread died while running a job
    #[error("worker thread panicked while running a job")]
    WorkerPanic,

    /// A barrier returned but a slot in the output level was never written
    #[error("hash level slot {index} was never filled")]
    IncompleteLevel {
        /// Index of the unfilled slot
        index: usize,
    },

    /// The pool already reported a failure on an earlier barrier
    #[error("worker pool aborted by an earlier job failure")]
    Poisoned,
}
