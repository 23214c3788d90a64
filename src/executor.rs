//! Serialized dispatch on a shared worker pool.
//!
//! A `SerialExecutor` runs callbacks one at a time, in submission order,
//! without owning a thread. While it has work it keeps exactly one unit
//! submitted to the pool; that unit runs a single callback and, if more are
//! queued, submits the next unit before returning. Many sessions can each
//! own an executor on one pool.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

/// A unit of work handed to a `WorkerPool`.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared execution substrate for short-lived jobs.
///
/// A pool that cannot run a job drops it; the executor then returns to idle
/// with its queue intact.
pub trait WorkerPool: Send + Sync {
    fn submit(&self, job: Task);
}

/// Jobs run on tokio's blocking pool so a slow callback never stalls the
/// runtime's async workers.
impl WorkerPool for Handle {
    fn submit(&self, job: Task) {
        drop(self.spawn_blocking(job));
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("no tokio runtime available for the worker pool")]
    NoRuntime,
}

#[derive(Default)]
struct State {
    queue: VecDeque<Task>,
    /// A processing unit is submitted or executing.
    running: bool,
    closing: bool,
    shutdown: bool,
    /// Thread currently executing a callback.
    worker: Option<ThreadId>,
}

struct Shared {
    state: Mutex<State>,
    idle: Condvar,
    pool: Arc<dyn WorkerPool>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn go_idle(&self, state: &mut State) {
        state.running = false;
        state.worker = None;
        self.idle.notify_all();
    }
}

/// Single-flight FIFO executor.
///
/// - `enqueue` never blocks beyond a short critical section.
/// - At most one callback from a given executor runs at any instant.
/// - A panicking callback is logged and does not stop later callbacks.
/// - `shutdown` discards callbacks that have not started, waits for the one
///   in flight (if any), and leaves the executor permanently shut down.
///   Later `enqueue` calls are ignored, including ones racing with an
///   in-progress `shutdown`.
pub struct SerialExecutor {
    shared: Arc<Shared>,
}

impl SerialExecutor {
    /// Create an executor on the current tokio runtime's blocking pool.
    pub fn new() -> Result<Self, ExecutorError> {
        let handle = Handle::try_current().map_err(|_| ExecutorError::NoRuntime)?;
        Ok(Self::with_pool(Arc::new(handle)))
    }

    pub fn with_pool(pool: Arc<dyn WorkerPool>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                idle: Condvar::new(),
                pool,
            }),
        }
    }

    /// Queue `callback` to run after every previously queued callback.
    pub fn enqueue<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock();
        if state.closing {
            trace!("serial executor is shut down, ignoring callback");
            return;
        }
        state.queue.push_back(Box::new(callback));
        if !state.running {
            state.running = true;
            drop(state);
            self.arm();
        }
    }

    fn arm(&self) {
        Unit::submit(self.shared.clone());
    }

    /// Stop the executor. Blocks while a callback is executing.
    ///
    /// Calling this from inside one of the executor's own callbacks does not
    /// wait for that callback.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        if state.shutdown {
            return;
        }
        state.closing = true;
        let discarded = std::mem::take(&mut state.queue);
        let me = thread::current().id();
        while state.running && state.worker != Some(me) {
            state = self
                .shared
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.shutdown = true;
        drop(state);
        debug!(discarded = discarded.len(), "serial executor shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.lock().shutdown
    }

    /// Number of callbacks queued but not yet started.
    pub fn pending(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Whether a processing unit is submitted or executing.
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }
}

impl fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("SerialExecutor")
            .field("pending", &state.queue.len())
            .field("running", &state.running)
            .field("closing", &state.closing)
            .field("shutdown", &state.shutdown)
            .finish()
    }
}

/// The job submitted to the pool while the executor is running. Dropping it
/// unrun clears the running flag so `shutdown` cannot wait on it forever.
struct Unit {
    shared: Option<Arc<Shared>>,
}

impl Unit {
    fn submit(shared: Arc<Shared>) {
        let pool = shared.pool.clone();
        let unit = Unit {
            shared: Some(shared),
        };
        pool.submit(Box::new(move || unit.run()));
    }

    fn run(mut self) {
        if let Some(shared) = self.shared.take() {
            run_next(shared);
        }
    }
}

impl Drop for Unit {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            warn!("worker pool dropped a serial executor unit");
            let mut state = shared.lock();
            shared.go_idle(&mut state);
        }
    }
}

/// One processing unit: run a single callback, then hand the rest of the
/// queue to a fresh unit on the pool.
fn run_next(shared: Arc<Shared>) {
    let task = {
        let mut state = shared.lock();
        let next = if state.closing {
            None
        } else {
            state.queue.pop_front()
        };
        match next {
            Some(task) => {
                state.worker = Some(thread::current().id());
                task
            }
            None => {
                shared.go_idle(&mut state);
                return;
            }
        }
    };

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        warn!(
            panic = panic_message(payload.as_ref()),
            "serial executor callback panicked"
        );
    }

    let mut state = shared.lock();
    state.worker = None;
    if state.closing || state.queue.is_empty() {
        shared.go_idle(&mut state);
        return;
    }
    drop(state);
    Unit::submit(shared);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
