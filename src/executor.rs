//! Where scheduled work runs.
//!
//! The engine only needs "run this closure later, somewhere". Every
//! [`Future`](crate::Future) carries the executor its derived work is submitted
//! to; unless told otherwise that is the process-wide [`default_executor`].

use crate::Error;
use futures::executor::ThreadPool;
use std::{
    fmt, io,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, OnceLock, PoisonError,
    },
    thread,
};

/// A unit of work handed to an [`Executor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs submitted tasks, eventually and exactly once.
///
/// No ordering is promised between tasks.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

impl<F> Executor for F
where
    F: Fn(Task) + Send + Sync,
{
    fn execute(&self, task: Task) {
        self(task)
    }
}

/// Runs `task`, logging instead of unwinding if it panics.
fn run_guarded(task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        log::warn!("scheduled task panicked: {}", Error::from_panic(payload));
    }
}

/// Runs tasks on a [`futures`] thread pool. The pool's queue is unbounded.
///
/// A task that blocks holds on to its worker. When every worker is blocked on
/// work queued behind it the pool stalls; [`ElasticExecutor`] avoids that.
#[derive(Clone)]
pub struct ThreadPoolExecutor {
    pool: ThreadPool,
    size: usize,
}

impl ThreadPoolExecutor {
    /// A pool with one thread per CPU.
    pub fn new() -> io::Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Executor for ThreadPoolExecutor {
    fn execute(&self, task: Task) {
        // A panic escaping here would take the worker thread down with it.
        self.pool.spawn_ok(async move { run_guarded(task) });
    }
}

impl fmt::Debug for ThreadPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPoolExecutor")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// A [`ThreadPoolExecutor`] that never makes a task wait for a worker.
///
/// At most `size` tasks are handed to the pool at a time, so each gets a free
/// worker. Anything submitted while all of them are taken, for example
/// because they are blocked waiting on other futures, runs on a fresh thread.
#[derive(Debug, Clone)]
pub struct ElasticExecutor {
    pool: ThreadPoolExecutor,
    in_pool: Arc<AtomicUsize>,
}

impl ElasticExecutor {
    pub fn new(pool: ThreadPoolExecutor) -> Self {
        ElasticExecutor {
            pool,
            in_pool: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Executor for ElasticExecutor {
    fn execute(&self, task: Task) {
        if self.in_pool.fetch_add(1, Ordering::AcqRel) >= self.pool.size() {
            self.in_pool.fetch_sub(1, Ordering::AcqRel);
            log::trace!("all pool workers busy, spawning an overflow thread");
            ThreadExecutor.execute(task);
            return;
        }
        let in_pool = Arc::clone(&self.in_pool);
        self.pool.execute(Box::new(move || {
            run_guarded(task);
            in_pool.fetch_sub(1, Ordering::AcqRel);
        }));
    }
}

/// Thread pool configuration.
#[derive(Debug, Default)]
pub struct Builder {
    pool_size: Option<usize>,
    name_prefix: Option<String>,
    stack_size: Option<usize>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Number of worker threads. Defaults to the number of CPUs.
    #[inline]
    pub fn pool_size(mut self, size: usize) -> Builder {
        self.pool_size = Some(size);
        self
    }

    /// Worker threads are named `{prefix}{index}`.
    #[inline]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Builder {
        self.name_prefix = Some(prefix.into());
        self
    }

    #[inline]
    pub fn stack_size(mut self, stack_size: usize) -> Builder {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn build(self) -> io::Result<ThreadPoolExecutor> {
        let size = match self.pool_size {
            Some(size) => size,
            None => thread::available_parallelism().map_or(1, NonZeroUsize::get),
        };
        let mut builder = ThreadPool::builder();
        builder.pool_size(size);
        if let Some(prefix) = self.name_prefix {
            builder.name_prefix(prefix);
        }
        if let Some(stack_size) = self.stack_size {
            builder.stack_size(stack_size);
        }
        let pool = builder.create()?;
        Ok(ThreadPoolExecutor { pool, size })
    }
}

/// Spawns a fresh OS thread for every task.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, task: Task) {
        // `spawn` hands the closure back only by dropping it, so keep a way to
        // run it here if the OS refuses a new thread.
        let task = Arc::new(Mutex::new(Some(task)));
        let spawned = Arc::clone(&task);
        let result = thread::Builder::new()
            .name("promise-future-task".into())
            .spawn(move || {
                if let Some(task) = take_task(&spawned) {
                    run_guarded(task)
                }
            });
        if let Err(err) = result {
            log::error!("failed to spawn task thread, running inline: {err}");
            if let Some(task) = take_task(&task) {
                task()
            }
        }
    }
}

fn take_task(slot: &Mutex<Option<Task>>) -> Option<Task> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

/// Runs each task immediately on the submitting thread.
///
/// Handy for deterministic tests. A task that waits on a future only another
/// task would resolve will block forever under this executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

static DEFAULT_EXECUTOR: OnceLock<Arc<dyn Executor>> = OnceLock::new();

/// The process-wide executor, created on first use.
///
/// An [`ElasticExecutor`] over one pool thread per CPU, so tasks that block
/// on other futures cannot starve it.
pub fn default_executor() -> Arc<dyn Executor> {
    DEFAULT_EXECUTOR
        .get_or_init(|| {
            match ThreadPoolExecutor::builder()
                .name_prefix("promise-future-worker-")
                .build()
            {
                Ok(pool) => Arc::new(ElasticExecutor::new(pool)),
                Err(err) => {
                    log::warn!("thread pool unavailable, falling back to thread per task: {err}");
                    Arc::new(ThreadExecutor)
                }
            }
        })
        .clone()
}

/// Installs the process-wide executor.
///
/// Only possible before [`default_executor`] has been used; otherwise the
/// executor is handed back.
pub fn set_default_executor(executor: Arc<dyn Executor>) -> Result<(), Arc<dyn Executor>> {
    DEFAULT_EXECUTOR.set(executor)
}
