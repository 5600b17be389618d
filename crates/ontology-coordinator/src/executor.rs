//! Executors that run coordinator tasks.
//!
//! The coordinator never spawns threads itself; it hands boxed jobs to a
//! [`TaskExecutor`]. Two implementations are provided:
//!
//! - [`PoolExecutor`] - a rayon thread pool (feature `parallel`, default)
//! - [`ThreadExecutor`] - one short-lived thread per task

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::cancel::CancellationToken;
#[cfg(feature = "parallel")]
use crate::error::{CoordinatorError, CoordinatorResult};

/// A unit of work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs, usually on other threads.
///
/// A job that is dropped without being run must not leave waiters hanging;
/// [`submit`] arranges for its [`TaskHandle`] to complete either way.
pub trait TaskExecutor: Send + Sync {
    /// Schedules a job.
    fn execute(&self, job: Job);
}

/// Handle to a submitted task.
///
/// Can be waited on or cancelled. Cancelling only sets the task's
/// [`CancellationToken`]; the task decides when to notice.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    token: CancellationToken,
    done: Arc<DoneSignal>,
}

#[derive(Debug, Default)]
struct DoneSignal {
    finished: Mutex<bool>,
    cond: Condvar,
}

impl DoneSignal {
    fn finish(&self) {
        let mut finished = self.finished.lock();
        *finished = true;
        self.cond.notify_all();
    }
}

// Marks the task finished when the job completes, panics, or is dropped unrun.
struct DoneGuard(Arc<DoneSignal>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl TaskHandle {
    /// Requests cancellation of the task.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns true once the task has finished (or was dropped).
    pub fn is_done(&self) -> bool {
        *self.done.finished.lock()
    }

    /// Blocks until the task has finished.
    pub fn wait(&self) {
        let mut finished = self.done.finished.lock();
        while !*finished {
            self.done.cond.wait(&mut finished);
        }
    }

    /// Blocks until the task has finished or `timeout` elapses.
    ///
    /// Returns true if the task finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut finished = self.done.finished.lock();
        if !*finished {
            self.done.cond.wait_for(&mut finished, timeout);
        }
        *finished
    }
}

/// Submits a task that receives its own cancellation token.
///
/// # Example
///
/// ```rust
/// use ontology_coordinator::{submit, ThreadExecutor};
///
/// let executor = ThreadExecutor::new();
/// let handle = submit(&executor, |token| {
///     assert!(!token.is_cancelled());
/// });
/// handle.wait();
/// assert!(handle.is_done());
/// ```
pub fn submit<F>(executor: &dyn TaskExecutor, task: F) -> TaskHandle
where
    F: FnOnce(&CancellationToken) + Send + 'static,
{
    let token = CancellationToken::new();
    let done = Arc::new(DoneSignal::default());
    let handle = TaskHandle {
        token: token.clone(),
        done: Arc::clone(&done),
    };
    let guard = DoneGuard(done);
    executor.execute(Box::new(move || {
        let _guard = guard;
        task(&token);
    }));
    handle
}

/// Executes every job on a dedicated, short-lived thread.
#[derive(Debug, Default, Clone)]
pub struct ThreadExecutor {
    _private: (),
}

impl ThreadExecutor {
    /// Creates a thread-per-task executor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskExecutor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let spawned = std::thread::Builder::new()
            .name("ontology-task".to_string())
            .spawn(job);
        if let Err(err) = spawned {
            // The job was dropped with the failed builder; its waiters are released.
            error!("Failed to spawn ontology task thread: {}", err);
        }
    }
}

/// Executes jobs on a fixed-size rayon thread pool.
#[cfg(feature = "parallel")]
pub struct PoolExecutor {
    pool: rayon::ThreadPool,
}

#[cfg(feature = "parallel")]
impl PoolExecutor {
    /// Builds a pool with the given number of worker threads.
    pub fn new(threads: usize) -> CoordinatorResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("ontology-worker-{}", i))
            .panic_handler(|_| error!("An ontology task panicked outside of a provider call"))
            .build()
            .map_err(|e| CoordinatorError::Executor(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Returns the number of worker threads.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(feature = "parallel")]
impl TaskExecutor for PoolExecutor {
    fn execute(&self, job: Job) {
        self.pool.spawn(job);
    }
}

#[cfg(feature = "parallel")]
impl std::fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("threads", &self.threads())
            .finish()
    }
}
