//! Tree hash computation: leaf hashing plus pairwise reduction.
//!
//! The file's chunks are hashed in parallel into level 0, then adjacent
//! digests are combined pairwise level by level until one digest
//! remains. A lone trailing digest on an odd-length level carries
//! forward to the next level unchanged. Each level is fully materialized
//! behind the pool's barrier before the next one reads it, which is the
//! only ordering the scheme needs: the result is identical for any
//! number of workers.

use std::path::PathBuf;
use std::sync::Arc;

use crate::chunker::{ChunkSource, ShortReadPolicy};
use crate::digest::{Digest, DigestEngine};
use crate::error::Error;
use crate::level::HashLevel;
use crate::pool::{Task, WorkerPool};

/// Default chunk size (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 2;

/// Which batch of jobs a barrier is currently draining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Leaf jobs: one per chunk
    ChunkHashes,
    /// Combine jobs for the given reduction level (1-based)
    TreeLevel(u32),
}

/// Result of one tree hash run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHashSummary {
    /// Root digest
    pub root: Digest,
    /// File length at open time
    pub file_size: u64,
    /// Number of leaf chunks (1 for an empty file)
    pub chunk_count: u64,
    /// Reduction levels below the root
    pub levels: u32,
    /// Short reads tolerated under [`ShortReadPolicy::Warn`]
    pub anomalous_reads: u64,
}

/// Configurable tree hash runner
///
/// # Example
///
/// ```no_run
/// use treehash_core::TreeHasher;
///
/// let summary = TreeHasher::new("/path/to/archive").workers(4).compute()?;
/// println!("{}", hex::encode(summary.root));
/// # Ok::<(), treehash_core::Error>(())
/// ```
pub struct TreeHasher {
    path: PathBuf,
    workers: usize,
    chunk_size: usize,
    short_reads: ShortReadPolicy,
    progress: Option<Box<dyn FnMut(Phase, usize)>>,
}

impl TreeHasher {
    /// Create a runner with default settings
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            workers: DEFAULT_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            short_reads: ShortReadPolicy::default(),
            progress: None,
        }
    }

    /// Set the worker count; `0` means one per hardware thread
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the chunk size in bytes
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the short-read policy
    #[must_use]
    pub fn short_read_policy(mut self, policy: ShortReadPolicy) -> Self {
        self.short_reads = policy;
        self
    }

    /// Report the outstanding-job count while barriers wait
    ///
    /// The callback runs on the calling thread, roughly ten times a
    /// second per barrier.
    #[must_use]
    pub fn on_progress(mut self, progress: impl FnMut(Phase, usize) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Run the computation
    ///
    /// # Errors
    ///
    /// Returns the first failure any job observed: I/O errors, short
    /// reads under [`ShortReadPolicy::Fail`], or a dead worker.
    pub fn compute(mut self) -> Result<TreeHashSummary, Error> {
        let source = ChunkSource::open(&self.path, self.chunk_size)?
            .short_read_policy(self.short_reads);
        let file_size = source.size();

        if file_size == 0 {
            // A zero-length file is one synthetic empty chunk: its leaf
            // digest is the root, so no pool and no reduction.
            return Ok(TreeHashSummary {
                root: DigestEngine::new().hash_empty(),
                file_size: 0,
                chunk_count: 1,
                levels: 0,
                anomalous_reads: 0,
            });
        }

        let source = Arc::new(source);
        let num_chunks = source.num_chunks();
        let pool = WorkerPool::new(self.workers);
        tracing::debug!(
            path = %self.path.display(),
            file_size,
            num_chunks,
            workers = pool.worker_count(),
            "hashing chunks"
        );

        let (leaves, writers) = HashLevel::with_writers(num_chunks as usize);
        for (index, slot) in writers.into_iter().enumerate() {
            pool.submit(Task::HashChunk {
                source: Arc::clone(&source),
                index: index as u64,
                slot,
            });
        }
        self.barrier(&pool, Phase::ChunkHashes)?;

        let (root, levels) = self.reduce(&pool, leaves.into_digests()?)?;

        Ok(TreeHashSummary {
            root,
            file_size,
            chunk_count: num_chunks,
            levels,
            anomalous_reads: source.anomalous_reads(),
        })
    }

    /// Fold a non-empty leaf level into its root, one level per barrier
    fn reduce(
        &mut self,
        pool: &WorkerPool,
        leaves: Vec<Digest>,
    ) -> Result<(Digest, u32), Error> {
        debug_assert!(!leaves.is_empty());
        let mut current = leaves;
        let mut depth = 0u32;

        while current.len() > 1 {
            depth += 1;
            let next_len = current.len().div_ceil(2);
            tracing::debug!(level = depth, len = next_len, "reducing level");

            let (next, writers) = HashLevel::with_writers(next_len);
            for (j, slot) in writers.into_iter().enumerate() {
                let i = 2 * j;
                if i + 1 < current.len() {
                    pool.submit(Task::CombinePair {
                        left: current[i],
                        right: current[i + 1],
                        slot,
                    });
                } else {
                    // Lone trailing digest carries forward unhashed
                    slot.fill(current[i]);
                }
            }
            self.barrier(pool, Phase::TreeLevel(depth))?;

            current = next.into_digests()?;
        }

        Ok((current[0], depth))
    }

    fn barrier(&mut self, pool: &WorkerPool, phase: Phase) -> Result<(), Error> {
        match self.progress.as_mut() {
            Some(progress) => pool.await_idle_with(|outstanding| progress(phase, outstanding)),
            None => pool.await_idle(),
        }
    }
}

/// Tree hash a file with default settings
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn tree_hash_file(path: impl Into<PathBuf>) -> Result<Digest, Error> {
    Ok(TreeHasher::new(path).compute()?.root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest as _, Sha256};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CHUNK: usize = 1024;

    fn temp_file_with(data: &[u8]) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(data).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    fn hash_with(data: &[u8], workers: usize) -> TreeHashSummary {
        let temp_file = temp_file_with(data);
        TreeHasher::new(temp_file.path())
            .chunk_size(CHUNK)
            .workers(workers)
            .compute()
            .unwrap()
    }

    #[test]
    fn test_empty_file_is_empty_digest() {
        let summary = hash_with(&[], 2);
        assert_eq!(summary.root, DigestEngine::new().hash_empty());
        assert_eq!(summary.file_size, 0);
        assert_eq!(summary.chunk_count, 1);
        assert_eq!(summary.levels, 0);
    }

    #[test]
    fn test_single_chunk_file_needs_no_reduction() {
        let data = vec![0x5A; CHUNK / 2];
        let summary = hash_with(&data, 2);

        let expected: Digest = Sha256::digest(&data).into();
        assert_eq!(summary.root, expected);
        assert_eq!(summary.chunk_count, 1);
        assert_eq!(summary.levels, 0);
    }

    #[test]
    fn test_exactly_one_chunk_of_zeros() {
        let data = vec![0u8; CHUNK];
        let summary = hash_with(&data, 2);
        let expected: Digest = Sha256::digest(&data).into();
        assert_eq!(summary.root, expected);
    }

    #[test]
    fn test_two_identical_chunks_hash_to_pair_of_leaf() {
        let data = vec![0u8; CHUNK * 2];
        let summary = hash_with(&data, 2);

        let mut engine = DigestEngine::new();
        let leaf = engine.hash_chunk(&data[..CHUNK]);
        assert_eq!(summary.root, engine.hash_pair(&leaf, &leaf));
        assert_eq!(summary.levels, 1);
    }

    #[test]
    fn test_three_chunks_carry_forward() {
        let mut data = Vec::new();
        data.extend_from_slice(&vec![0x11; CHUNK]);
        data.extend_from_slice(&vec![0x22; CHUNK]);
        data.extend_from_slice(&vec![0x33; CHUNK]);
        let summary = hash_with(&data, 2);

        let mut engine = DigestEngine::new();
        let d0 = engine.hash_chunk(&data[..CHUNK]);
        let d1 = engine.hash_chunk(&data[CHUNK..2 * CHUNK]);
        let d2 = engine.hash_chunk(&data[2 * CHUNK..]);
        // Level 1 is [H(d0 || d1), d2]: d2 passes through unhashed
        let expected = {
            let pair = engine.hash_pair(&d0, &d1);
            engine.hash_pair(&pair, &d2)
        };

        assert_eq!(summary.root, expected);
        assert_eq!(summary.levels, 2);
    }

    #[test]
    fn test_level_counts() {
        // Power of two reduces in exactly log2 levels
        assert_eq!(hash_with(&vec![1u8; CHUNK * 8], 2).levels, 3);
        // Non-power rounds up
        assert_eq!(hash_with(&vec![1u8; CHUNK * 5], 2).levels, 3);
        assert_eq!(hash_with(&vec![1u8; CHUNK * 3], 2).levels, 2);
    }

    #[test]
    fn test_determinism_across_worker_counts() {
        let data: Vec<u8> = (0..CHUNK * 7 + 123).map(|i| (i % 257) as u8).collect();
        let chunk_count = (data.len() as u64).div_ceil(CHUNK as u64);

        let baseline = hash_with(&data, 1);
        for workers in [2, chunk_count as usize] {
            assert_eq!(hash_with(&data, workers).root, baseline.root);
        }
    }

    #[test]
    fn test_clean_run_reports_no_anomalies() {
        let summary = hash_with(&vec![0xEE; CHUNK * 4], 2);
        assert_eq!(summary.anomalous_reads, 0);
    }

    #[test]
    fn test_progress_reports_phases_in_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let data = vec![0xAD; CHUNK * 64];
        let temp_file = temp_file_with(&data);

        let phases: Rc<RefCell<Vec<Phase>>> = Rc::default();
        let seen = Rc::clone(&phases);
        let summary = TreeHasher::new(temp_file.path())
            .chunk_size(CHUNK)
            .workers(1)
            .on_progress(move |phase, _outstanding| seen.borrow_mut().push(phase))
            .compute()
            .unwrap();

        assert_eq!(summary.chunk_count, 64);
        let phases = phases.borrow();
        // Phases may be skipped when a batch drains before the first
        // tick, but any reported sequence must be monotonic.
        let ranks: Vec<u32> = phases
            .iter()
            .map(|p| match p {
                Phase::ChunkHashes => 0,
                Phase::TreeLevel(k) => *k,
            })
            .collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = TreeHasher::new("/nonexistent/treehash-input").compute();
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_tree_hash_file_wrapper() {
        let temp_file = temp_file_with(b"small file");
        let root = tree_hash_file(temp_file.path()).unwrap();
        let expected: Digest = Sha256::digest(b"small file").into();
        assert_eq!(root, expected);
    }
}
