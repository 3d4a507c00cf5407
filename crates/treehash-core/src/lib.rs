//! # treehash-core
//!
//! Tree hashing engine for arbitrary-size files.
//!
//! This crate provides:
//! - Positional chunked file reads safe for concurrent access
//! - SHA-256 digest primitives for chunks and digest pairs
//! - A bounded worker pool with a counting completion barrier
//! - Bottom-up pairwise reduction of chunk digests into a single root
//!
//! The root digest commits to both chunk contents and chunk order, so a
//! client and a server that agree on the chunk size can verify a
//! multi-part upload without either side re-reading the whole file.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunker;
pub mod digest;
pub mod error;
pub mod level;
pub mod pool;
pub mod tree_hash;

pub use chunker::{ChunkRead, ChunkSource, ShortReadPolicy};
pub use digest::{DIGEST_SIZE, Digest, DigestEngine};
pub use error::Error;
pub use level::{HashLevel, SlotWriter};
pub use pool::{Task, WorkerPool};
pub use tree_hash::{
    DEFAULT_CHUNK_SIZE, DEFAULT_WORKERS, Phase, TreeHashSummary, TreeHasher, tree_hash_file,
};
