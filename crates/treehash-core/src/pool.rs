//! Bounded worker pool with a counting completion barrier.
//!
//! Jobs are delivered to a fixed set of OS threads over a channel. An
//! outstanding-job counter is incremented at submit and decremented only
//! after a job has finished executing, and [`WorkerPool::await_idle`]
//! blocks until that counter reaches zero. Checking the queue for
//! emptiness instead would report completion while the last dequeued job
//! is still running; the counter is the barrier, not the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, mpsc};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::chunker::ChunkSource;
use crate::digest::{Digest, DigestEngine};
use crate::error::Error;
use crate::level::SlotWriter;

/// How often a barrier with a progress callback wakes to report.
const PROGRESS_TICK: Duration = Duration::from_millis(100);

/// One unit of hashing work, producing exactly one digest
#[derive(Debug)]
pub enum Task {
    /// Read chunk `index` from the source and hash it into `slot`
    HashChunk {
        /// Shared read handle
        source: Arc<ChunkSource>,
        /// Chunk index to read
        index: u64,
        /// Output slot capability
        slot: SlotWriter,
    },
    /// Hash the concatenation of two digests into `slot`
    CombinePair {
        /// First digest, hashed first
        left: Digest,
        /// Second digest
        right: Digest,
        /// Output slot capability
        slot: SlotWriter,
    },
}

impl Task {
    fn run(self, ctx: &mut WorkerContext) -> Result<(), Error> {
        match self {
            Task::HashChunk {
                source,
                index,
                slot,
            } => {
                let read = source.read_chunk(index, &mut ctx.buffer)?;
                tracing::trace!(index, len = read.len, anomalous = read.anomalous, "chunk read");
                slot.fill(ctx.engine.hash_chunk(&ctx.buffer));
                Ok(())
            }
            Task::CombinePair { left, right, slot } => {
                slot.fill(ctx.engine.hash_pair(&left, &right));
                Ok(())
            }
        }
    }
}

/// Per-worker scratch state: one digest engine and one read buffer.
///
/// Owned exclusively by its worker for the worker's whole lifetime and
/// never handed between threads.
struct WorkerContext {
    engine: DigestEngine,
    buffer: Vec<u8>,
}

impl WorkerContext {
    fn new() -> Self {
        Self {
            engine: DigestEngine::new(),
            buffer: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Inner {
    outstanding: usize,
    failure: Option<Error>,
    aborted: bool,
}

#[derive(Default)]
struct PoolState {
    guard: Mutex<Inner>,
    idle: Condvar,
    failed: AtomicBool,
}

impl PoolState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job_started(&self) {
        self.lock().outstanding += 1;
    }

    fn job_finished(&self) {
        let mut inner = self.lock();
        inner.outstanding -= 1;
        if inner.outstanding == 0 {
            self.idle.notify_all();
        }
    }

    fn record_failure(&self, err: Error) {
        let mut inner = self.lock();
        if inner.failure.is_none() && !inner.aborted {
            inner.failure = Some(err);
        }
        self.failed.store(true, Ordering::Release);
        self.idle.notify_all();
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

/// Decrements the outstanding counter when a job leaves a worker, even
/// if the job panicked partway through. Without this a panic would leave
/// the counter high and the barrier waiting forever.
struct CompletionGuard<'a> {
    state: &'a PoolState,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.state.record_failure(Error::WorkerPanic);
        }
        self.state.job_finished();
    }
}

/// Fixed set of worker threads executing hashing jobs
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    state: Arc<PoolState>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn a pool of `workers` threads; `0` means one per hardware
    /// thread.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let count = resolve_workers(workers);
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let state = Arc::new(PoolState::default());

        let workers = (0..count)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let state = Arc::clone(&state);
                std::thread::Builder::new()
                    .name(format!("treehash-worker-{id}"))
                    .spawn(move || worker_loop(id, &receiver, &state))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            sender: Some(sender),
            state,
            workers,
        }
    }

    /// Number of worker threads
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs submitted but not yet finished executing
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Enqueue a job; never blocks beyond queue admission
    pub fn submit(&self, task: Task) {
        self.state.job_started();
        let sender = self.sender.as_ref().expect("sender lives until drop");
        if sender.send(task).is_err() {
            // All workers are gone; surface that instead of hanging.
            self.state.record_failure(Error::WorkerPanic);
            self.state.job_finished();
        }
    }

    /// Block until every submitted job has finished executing
    ///
    /// # Errors
    ///
    /// Returns the first job failure instead of waiting for the counter,
    /// and [`Error::Poisoned`] on any barrier after that.
    pub fn await_idle(&self) -> Result<(), Error> {
        let mut inner = self.state.lock();
        while inner.outstanding > 0 && inner.failure.is_none() && !inner.aborted {
            inner = self
                .state
                .idle
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        barrier_result(&mut inner)
    }

    /// Same barrier as [`await_idle`](Self::await_idle), reporting the
    /// outstanding-job count to `progress` while it waits
    ///
    /// The callback runs on the calling thread with the pool unlocked,
    /// so a slow progress sink cannot stall the workers.
    ///
    /// # Errors
    ///
    /// Propagates failures exactly like [`await_idle`](Self::await_idle).
    pub fn await_idle_with(&self, mut progress: impl FnMut(usize)) -> Result<(), Error> {
        loop {
            let snapshot = {
                let mut inner = self.state.lock();
                if inner.outstanding == 0 || inner.failure.is_some() || inner.aborted {
                    return barrier_result(&mut inner);
                }
                inner.outstanding
            };
            progress(snapshot);

            let inner = self.state.lock();
            if inner.outstanding > 0 && inner.failure.is_none() && !inner.aborted {
                drop(
                    self.state
                        .idle
                        .wait_timeout(inner, PROGRESS_TICK)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn barrier_result(inner: &mut Inner) -> Result<(), Error> {
    if let Some(err) = inner.failure.take() {
        inner.aborted = true;
        Err(err)
    } else if inner.aborted {
        Err(Error::Poisoned)
    } else {
        Ok(())
    }
}

fn resolve_workers(requested: usize) -> usize {
    if requested == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        requested
    }
}

fn worker_loop(id: usize, receiver: &Mutex<Receiver<Task>>, state: &PoolState) {
    let mut ctx: Option<WorkerContext> = None;
    loop {
        let task = {
            let rx = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            match rx.recv() {
                Ok(task) => task,
                Err(_) => break,
            }
        };

        let _guard = CompletionGuard { state };
        if state.has_failed() {
            // Drain without executing so the counter stays precise
            continue;
        }

        let ctx = ctx.get_or_insert_with(|| {
            tracing::debug!(worker = id, "initializing worker context");
            WorkerContext::new()
        });
        if let Err(err) = task.run(ctx) {
            tracing::debug!(worker = id, %err, "job failed");
            state.record_failure(err);
        }
    }
}
