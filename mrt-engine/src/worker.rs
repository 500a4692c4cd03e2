use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::job::Stage;
use crate::shuffle;
use crate::state::JobState;
use crate::{fatal, MapContext, MapReduce, ReduceContext};

/// Handle to one spawned worker thread.
pub(crate) struct WorkerHandle {
    /// Worker slot in `[0, threads)`.
    id: usize,

    /// Taken on first join; a joined worker is never joined again.
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn the worker thread running the phase pipeline.
    pub(crate) fn spawn<C: MapReduce>(state: Arc<JobState<C>>, id: usize) -> Self {
        let builder = thread::Builder::new().name(format!("worker-{id}"));
        match builder.spawn(move || run(&state, id)) {
            Ok(handle) => Self {
                id,
                thread: Some(handle),
            },
            Err(err) => fatal(&format!("failed to spawn worker thread: {err}")),
        }
    }

    /// Join the worker thread, once. Returns the panic payload if the
    /// application code panicked on this worker.
    pub(crate) fn join(&mut self) -> Option<Box<dyn Any + Send>> {
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(()) => None,
            Err(panic) => {
                error!("worker {} terminated by panic", self.id);
                Some(panic)
            }
        }
    }
}

/// The routine every worker executes: a fixed sequence of barrier-gated
/// phases. Worker 0 performs the stage transitions and counter resets
/// between barriers; no worker may skip a barrier, even with no work to
/// do in the adjoining phases.
fn run<C: MapReduce>(state: &JobState<C>, id: usize) {
    state.barrier().wait();
    if id == 0 {
        state.begin_stage(Stage::Mapping);
    }
    state.barrier().wait();
    map_phase(state, id);

    state.barrier().wait();
    if id == 0 {
        state.begin_stage(Stage::Shuffling);
        shuffle_phase(state);
    }

    state.barrier().wait();
    if id == 0 {
        state.begin_stage(Stage::Reducing);
    }
    state.barrier().wait();
    reduce_phase(state, id);
}

/// Claim input records until the claim counter runs off the end, then
/// sort this worker's buffer by key and deposit it for the shuffle.
fn map_phase<C: MapReduce>(state: &JobState<C>, id: usize) {
    let input = state.input();
    let mut ctx = MapContext::new(id);
    loop {
        let index = state.claim_next();
        if index >= input.len() {
            break;
        }
        let (key, value) = &input[index];
        state.client().map(key, value, &mut ctx);
        state.update_progress();
    }
    let mut buffer = ctx.into_buffer();
    buffer.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    debug!("worker {id} deposited {} intermediate pairs", buffer.len());
    state.deposit_buffer(id, buffer);
}

/// Merge the sorted per-worker buffers into key groups. Runs on worker 0
/// alone while every other worker is parked at the next barrier, which is
/// what makes the store swap race-free without a lock held across it.
fn shuffle_phase<C: MapReduce>(state: &JobState<C>) {
    let buffers = state.take_worker_buffers();
    let distinct = shuffle::distinct_keys(&buffers);
    state.set_intermediate_len(distinct);
    let groups = shuffle::merge(buffers, distinct, || state.update_progress());
    debug!("shuffle produced {} key groups", groups.len());
    state.install_groups(groups);
}

/// Claim key groups until the claim counter runs off the end.
fn reduce_phase<C: MapReduce>(state: &JobState<C>, id: usize) {
    let guard = state.intermediate();
    let groups = guard.groups();
    let mut ctx = ReduceContext::new(state.output(), id);
    loop {
        let index = state.claim_next();
        if index >= groups.len() {
            break;
        }
        state.client().reduce(&groups[index], &mut ctx);
        state.update_progress();
    }
}
