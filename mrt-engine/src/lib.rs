//! A local, in-process parallel MapReduce engine.
//!
//! Users specify map and reduce behavior through the [`MapReduce`] trait;
//! the engine partitions the input records across a fixed pool of worker
//! threads, carries them through the map, shuffle and reduce phases, and
//! hands back the output collection. Unlike a cluster deployment, all data
//! stays in process memory and all coordination is shared-memory.

use std::process;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::error;

mod barrier;
mod job;
mod shuffle;
mod state;
mod worker;

pub use barrier::Barrier;
pub use job::{Job, JobStatus, Stage};

/////////////////////////////////////////////////////////////////////////////
// MapReduce application interface
/////////////////////////////////////////////////////////////////////////////

/// An intermediate key-value pair produced by an application's map calls.
pub type IntermediatePair<C> =
    (<C as MapReduce>::IntermediateKey, <C as MapReduce>::IntermediateValue);

/// A MapReduce application.
///
/// The engine calls [`map`](MapReduce::map) exactly once per input record
/// and [`reduce`](MapReduce::reduce) exactly once per key group, from
/// whichever worker thread claims the record or group. Both callbacks emit
/// through their context object.
///
/// A panic in either callback unwinds its worker thread and resurfaces in
/// [`Job::wait`]; with more than one worker the remaining workers stall at
/// the next phase barrier, so a panicking application is not a recoverable
/// error path.
pub trait MapReduce: Send + Sync + 'static {
    /// Key type of the input records.
    type InputKey: Send + Sync + 'static;

    /// Value type of the input records.
    type InputValue: Send + Sync + 'static;

    /// Key type of the intermediate records.
    ///
    /// Sorting and grouping use the ordering relation alone: two keys
    /// belong to the same group iff `cmp` returns `Equal`.
    type IntermediateKey: Ord + Clone + Send + Sync + 'static;

    /// Value type of the intermediate records.
    type IntermediateValue: Send + Sync + 'static;

    /// Key type of the output records.
    type OutputKey: Send + 'static;

    /// Value type of the output records.
    type OutputValue: Send + 'static;

    /// Process one input record, emitting zero or more intermediate pairs.
    fn map(
        &self,
        key: &Self::InputKey,
        value: &Self::InputValue,
        ctx: &mut MapContext<Self::IntermediateKey, Self::IntermediateValue>,
    );

    /// Process one key group, emitting zero or more output pairs.
    ///
    /// `group` holds every intermediate pair sharing one key.
    fn reduce(
        &self,
        group: &[IntermediatePair<Self>],
        ctx: &mut ReduceContext<'_, Self::OutputKey, Self::OutputValue>,
    );
}

/// Map-side emit context, scoped to the invoking worker.
///
/// Emitted pairs land in the worker's private buffer; no synchronization
/// is involved until the buffer is deposited at the end of the map phase.
pub struct MapContext<K, V> {
    worker: usize,
    buffer: Vec<(K, V)>,
}

impl<K, V> MapContext<K, V> {
    pub(crate) fn new(worker: usize) -> Self {
        Self {
            worker,
            buffer: Vec::new(),
        }
    }

    /// Emit one intermediate pair.
    pub fn emit(&mut self, key: K, value: V) {
        self.buffer.push((key, value));
    }

    /// The id of the worker running this map call.
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub(crate) fn into_buffer(self) -> Vec<(K, V)> {
        self.buffer
    }
}

/// Reduce-side emit context, scoped to the invoking worker.
pub struct ReduceContext<'a, K, V> {
    output: &'a Mutex<Vec<(K, V)>>,
    worker: usize,
}

impl<'a, K, V> ReduceContext<'a, K, V> {
    pub(crate) fn new(output: &'a Mutex<Vec<(K, V)>>, worker: usize) -> Self {
        Self { output, worker }
    }

    /// Append one output pair to the shared output collection.
    ///
    /// Each append is atomic, but the relative output order across groups
    /// reduced by different workers is unspecified.
    pub fn emit(&mut self, key: K, value: V) {
        lock(self.output).push((key, value));
    }

    /// The id of the worker running this reduce call.
    pub fn worker(&self) -> usize {
        self.worker
    }
}

/////////////////////////////////////////////////////////////////////////////
// Fatal system errors
/////////////////////////////////////////////////////////////////////////////

/// Report an unrecoverable infrastructure failure and terminate the
/// process. Thread-creation and lock failures are never surfaced to the
/// caller; no job keeps making progress past one.
pub(crate) fn fatal(msg: &str) -> ! {
    error!("system error: {msg}");
    process::exit(1);
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|_| fatal("mutex lock problem"))
}

pub(crate) fn read_lock<T>(rwlock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rwlock.read().unwrap_or_else(|_| fatal("lock read problem"))
}

pub(crate) fn write_lock<T>(rwlock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rwlock.write().unwrap_or_else(|_| fatal("lock write problem"))
}
