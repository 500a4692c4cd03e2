use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, error};

use crate::state::JobState;
use crate::worker::WorkerHandle;
use crate::{lock, MapReduce};

/// Pipeline stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Job not started.
    Pending,

    /// Mapping phase.
    Mapping,

    /// Shuffling phase.
    Shuffling,

    /// Reducing phase.
    Reducing,
}

impl Stage {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Stage::Pending => 0,
            Stage::Mapping => 1,
            Stage::Shuffling => 2,
            Stage::Reducing => 3,
        }
    }

    pub(crate) fn from_u8(raw: u8) -> Stage {
        match raw {
            0 => Stage::Pending,
            1 => Stage::Mapping,
            2 => Stage::Shuffling,
            3 => Stage::Reducing,
            _ => unreachable!("invalid stage encoding"),
        }
    }
}

/// A point-in-time snapshot of a job's stage and progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobStatus {
    /// The pipeline stage the job was in when sampled.
    pub stage: Stage,

    /// Completion percentage of that stage, in `[0, 100]`.
    pub progress: f32,
}

/// An owned handle to a running MapReduce job.
///
/// Completion has no stored stage of its own: a job is done once every
/// worker thread has terminated, which [`wait`](Job::wait) observes.
pub struct Job<C: MapReduce> {
    /// Shared coordination state, kept alive until the handle closes.
    state: Arc<JobState<C>>,

    /// Worker handles, each joined at most once.
    workers: Mutex<Vec<WorkerHandle>>,
}

impl<C: MapReduce> Job<C> {
    /// Start a job over `input` with `threads` worker threads.
    ///
    /// Returns immediately; the workers drive the pipeline to completion
    /// on their own. Panics if `threads` is zero.
    pub fn start(client: C, input: Vec<(C::InputKey, C::InputValue)>, threads: usize) -> Self {
        assert!(threads > 0, "a job needs at least one worker thread");
        debug!(
            "starting job with {threads} workers over {} input records",
            input.len()
        );
        let state = Arc::new(JobState::new(client, input, threads));
        let workers = (0..threads)
            .map(|id| WorkerHandle::spawn(Arc::clone(&state), id))
            .collect();
        Self {
            state,
            workers: Mutex::new(workers),
        }
    }

    /// Block until every worker thread has terminated.
    ///
    /// Safe to call any number of times, from any thread; workers already
    /// joined are not joined again. A panic that escaped the application's
    /// map or reduce resumes in the first waiter.
    pub fn wait(&self) {
        let mut client_panic = None;
        {
            let mut workers = lock(&self.workers);
            for worker in workers.iter_mut() {
                if let Some(panic) = worker.join() {
                    client_panic.get_or_insert(panic);
                }
            }
        }
        if let Some(panic) = client_panic {
            if thread::panicking() {
                error!("suppressing worker panic raised during job teardown");
            } else {
                std::panic::resume_unwind(panic);
            }
        }
    }

    /// Best-effort snapshot of the job's stage and progress.
    ///
    /// Stage and percentage are read independently of concurrent writers,
    /// so a snapshot taken around a stage transition may pair the new
    /// stage with the old percentage or the reverse. This inconsistency
    /// window is accepted; no lock is held for the composite read.
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Wait for completion, then release the job's resources and hand
    /// back the output collection.
    pub fn into_output(self) -> Vec<(C::OutputKey, C::OutputValue)> {
        self.wait();
        self.state.take_output()
    }
}

impl<C: MapReduce> Drop for Job<C> {
    /// Closing the handle waits for the workers; a job is never left
    /// running detached.
    fn drop(&mut self) {
        self.wait();
    }
}
