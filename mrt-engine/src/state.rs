use std::mem;
use std::sync::atomic::{AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::barrier::Barrier;
use crate::job::{JobStatus, Stage};
use crate::{lock, read_lock, write_lock, IntermediatePair, MapReduce};

/// Shared intermediate storage. Holds one buffer per worker slot while
/// mapping, one buffer per distinct key once the shuffle has run.
pub(crate) enum Intermediate<C: MapReduce> {
    /// Indexed by worker id; each worker fills only its own slot.
    PerWorker(Vec<Vec<IntermediatePair<C>>>),

    /// Indexed by group, in descending key order.
    Grouped(Vec<Vec<IntermediatePair<C>>>),
}

impl<C: MapReduce> Intermediate<C> {
    /// The post-shuffle key groups.
    ///
    /// Only valid once worker 0 has swapped the store over; reaching for
    /// groups while the store is still per-worker is a pipeline ordering
    /// violation.
    pub(crate) fn groups(&self) -> &[Vec<IntermediatePair<C>>] {
        match self {
            Intermediate::Grouped(groups) => groups,
            Intermediate::PerWorker(_) => unreachable!("intermediate store read before shuffle"),
        }
    }
}

/// Coordination state shared by every worker of one job.
pub(crate) struct JobState<C: MapReduce> {
    /// The caller-supplied map/reduce behavior.
    client: C,

    /// Input records, immutable for the job's lifetime.
    input: Vec<(C::InputKey, C::InputValue)>,

    /// Current pipeline stage, encoded for lock-free snapshots.
    stage: AtomicU8,

    /// Stage completion percentage in `[0, 100]`, stored as `f32` bits.
    percent: AtomicU32,

    /// Work-claim counter: post-incremented to hand out disjoint indices.
    claim: AtomicUsize,

    /// Work units completed in the current stage.
    completed: AtomicUsize,

    /// Length of the shared intermediate collection: the worker-slot
    /// count until the shuffle rebinds it to the distinct-key count.
    intermediate_len: AtomicUsize,

    /// Guards percentage recomputation.
    progress_lock: Mutex<()>,

    /// Per-worker buffers, then key groups after the shuffle.
    intermediate: RwLock<Intermediate<C>>,

    /// Shared output collection, append-only under the lock.
    output: Mutex<Vec<(C::OutputKey, C::OutputValue)>>,

    /// Phase rendezvous for all workers.
    barrier: Barrier,
}

impl<C: MapReduce> JobState<C> {
    pub(crate) fn new(
        client: C,
        input: Vec<(C::InputKey, C::InputValue)>,
        threads: usize,
    ) -> Self {
        Self {
            client,
            input,
            stage: AtomicU8::new(Stage::Pending.as_u8()),
            percent: AtomicU32::new(0f32.to_bits()),
            claim: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            intermediate_len: AtomicUsize::new(threads),
            progress_lock: Mutex::new(()),
            intermediate: RwLock::new(Intermediate::PerWorker(
                (0..threads).map(|_| Vec::new()).collect(),
            )),
            output: Mutex::new(Vec::new()),
            barrier: Barrier::new(threads),
        }
    }

    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    pub(crate) fn input(&self) -> &[(C::InputKey, C::InputValue)] {
        &self.input
    }

    pub(crate) fn barrier(&self) -> &Barrier {
        &self.barrier
    }

    /// Hand out the next unclaimed work index.
    pub(crate) fn claim_next(&self) -> usize {
        self.claim.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn stage(&self) -> Stage {
        Stage::from_u8(self.stage.load(Ordering::SeqCst))
    }

    /// Snapshot of stage and percentage. The two fields are read as
    /// independent atomics; see [`crate::Job::status`].
    pub(crate) fn status(&self) -> JobStatus {
        JobStatus {
            stage: self.stage(),
            progress: f32::from_bits(self.percent.load(Ordering::SeqCst)),
        }
    }

    /// Enter `stage` and reset both work counters.
    ///
    /// Called by worker 0 only, while every other worker is parked at a
    /// barrier; that ordering is what makes the plain resets race-free.
    pub(crate) fn begin_stage(&self, stage: Stage) {
        debug!("entering {:?} stage", stage);
        self.stage.store(stage.as_u8(), Ordering::SeqCst);
        self.claim.store(0, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.store_percent(0);
    }

    /// Record one completed unit of work and refresh the percentage.
    pub(crate) fn update_progress(&self) {
        let _guard = lock(&self.progress_lock);
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        self.store_percent(done);
    }

    /// Rebind the intermediate-collection length (the shuffle swaps the
    /// worker-slot count for the distinct-key count) and refresh the
    /// percentage against the new denominator.
    pub(crate) fn set_intermediate_len(&self, len: usize) {
        self.intermediate_len.store(len, Ordering::SeqCst);
        self.store_percent(self.completed.load(Ordering::SeqCst));
    }

    fn store_percent(&self, done: usize) {
        let denominator = match self.stage() {
            Stage::Pending => {
                self.percent.store(0f32.to_bits(), Ordering::SeqCst);
                return;
            }
            Stage::Mapping => self.input.len(),
            Stage::Shuffling | Stage::Reducing => self.intermediate_len.load(Ordering::SeqCst),
        };
        // a stage with nothing to do is already complete
        let percent = if denominator == 0 {
            100.0
        } else {
            (done as f32 / denominator as f32).min(1.0) * 100.0
        };
        self.percent.store(percent.to_bits(), Ordering::SeqCst);
    }

    /// Install a worker's sorted buffer into its slot.
    pub(crate) fn deposit_buffer(&self, worker: usize, buffer: Vec<IntermediatePair<C>>) {
        match &mut *write_lock(&self.intermediate) {
            Intermediate::PerWorker(slots) => slots[worker] = buffer,
            Intermediate::Grouped(_) => unreachable!("map deposit after shuffle"),
        }
    }

    /// Take every worker buffer out of the store for the shuffle merge.
    pub(crate) fn take_worker_buffers(&self) -> Vec<Vec<IntermediatePair<C>>> {
        match &mut *write_lock(&self.intermediate) {
            Intermediate::PerWorker(slots) => mem::take(slots),
            Intermediate::Grouped(_) => unreachable!("shuffle ran twice"),
        }
    }

    /// Swap the store over to the grouped shape.
    pub(crate) fn install_groups(&self, groups: Vec<Vec<IntermediatePair<C>>>) {
        *write_lock(&self.intermediate) = Intermediate::Grouped(groups);
    }

    /// Read access to the intermediate store.
    pub(crate) fn intermediate(&self) -> RwLockReadGuard<'_, Intermediate<C>> {
        read_lock(&self.intermediate)
    }

    /// The shared output collection.
    pub(crate) fn output(&self) -> &Mutex<Vec<(C::OutputKey, C::OutputValue)>> {
        &self.output
    }

    /// Drain the output collection.
    pub(crate) fn take_output(&self) -> Vec<(C::OutputKey, C::OutputValue)> {
        mem::take(&mut *lock(&self.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapContext, ReduceContext};

    struct Null;

    impl MapReduce for Null {
        type InputKey = u32;
        type InputValue = u32;
        type IntermediateKey = u32;
        type IntermediateValue = u32;
        type OutputKey = u32;
        type OutputValue = u32;

        fn map(&self, _: &u32, _: &u32, _: &mut MapContext<u32, u32>) {}

        fn reduce(&self, _: &[(u32, u32)], _: &mut ReduceContext<'_, u32, u32>) {}
    }

    fn state_with_input(records: u32, threads: usize) -> JobState<Null> {
        let input = (0..records).map(|i| (i, i)).collect();
        JobState::new(Null, input, threads)
    }

    #[test]
    fn claim_indices_are_disjoint_and_monotonic() {
        let state = state_with_input(3, 2);
        assert_eq!(state.claim_next(), 0);
        assert_eq!(state.claim_next(), 1);
        assert_eq!(state.claim_next(), 2);
    }

    #[test]
    fn mapping_progress_tracks_input_size() {
        let state = state_with_input(4, 2);
        state.begin_stage(Stage::Mapping);
        assert_eq!(state.status().progress, 0.0);
        state.update_progress();
        assert_eq!(state.status().progress, 25.0);
        state.update_progress();
        state.update_progress();
        state.update_progress();
        assert_eq!(state.status().progress, 100.0);
    }

    #[test]
    fn progress_is_capped_at_one_hundred() {
        let state = state_with_input(1, 1);
        state.begin_stage(Stage::Mapping);
        state.update_progress();
        state.update_progress();
        assert_eq!(state.status().progress, 100.0);
    }

    #[test]
    fn a_stage_with_no_work_reads_complete() {
        let state = state_with_input(0, 2);
        state.begin_stage(Stage::Mapping);
        assert_eq!(state.status().progress, 100.0);
    }

    #[test]
    fn shuffle_denominator_rebinds_to_distinct_key_count() {
        let state = state_with_input(8, 4);
        state.begin_stage(Stage::Shuffling);
        // until the rebind the denominator is the worker-slot count
        state.update_progress();
        assert_eq!(state.status().progress, 25.0);
        state.set_intermediate_len(2);
        assert_eq!(state.status().progress, 50.0);
        state.update_progress();
        assert_eq!(state.status().progress, 100.0);
    }

    #[test]
    fn rebinding_to_zero_keys_reads_complete() {
        let state = state_with_input(0, 3);
        state.begin_stage(Stage::Shuffling);
        assert_eq!(state.status().progress, 0.0);
        state.set_intermediate_len(0);
        assert_eq!(state.status().progress, 100.0);
        state.begin_stage(Stage::Reducing);
        assert_eq!(state.status().progress, 100.0);
    }

    #[test]
    fn begin_stage_resets_the_counters() {
        let state = state_with_input(2, 2);
        state.begin_stage(Stage::Mapping);
        state.claim_next();
        state.update_progress();
        state.begin_stage(Stage::Reducing);
        assert_eq!(state.claim_next(), 0);
        assert_eq!(state.status().stage, Stage::Reducing);
    }
}
