//! Bounded resolver pools for background work.
//!
//! A [`ThreadPool`] runs submitted closures on a fixed number of named worker
//! threads built on rayon. Submissions beyond the worker count queue up and
//! run as workers free up, so at most `num_threads` tasks execute at once.
//! Worker threads never keep the process alive on exit.
//!
//! Results can be waited on through a [`TaskHandle`], or handed to a
//! presentation [`Sink`](crate::sink::Sink) with
//! [`spawn_with_callback`](ThreadPool::spawn_with_callback), in which case the
//! callback runs on the sink thread with exclusive access to its state.
//!
//! # Example
//!
//! ```no_run
//! use appshelf_core::threadpool::{ThreadPool, ThreadPoolConfig};
//!
//! let pool = ThreadPool::new(ThreadPoolConfig::with_threads(3)).unwrap();
//! let handle = pool.spawn(|| 6 * 7).unwrap();
//! assert_eq!(handle.wait(), Some(42));
//!
//! // Stop accepting work; tasks already queued still finish.
//! pool.shutdown();
//! assert!(pool.spawn(|| 0).is_err());
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};
use parking_lot::RwLock;
use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::error::ThreadPoolError;
use crate::logging::targets;
use crate::sink::SinkHandle;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// The result side of a task spawned with [`ThreadPool::spawn`].
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: u64,
    receiver: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Process-unique id of this task.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the result is ready to take.
    pub fn is_finished(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Take the result if it is ready.
    pub fn try_get(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the result is ready.
    ///
    /// Returns `None` if the task panicked.
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Block until the result is ready or `timeout` elapses.
    ///
    /// Returns `None` if the timeout elapsed or the task panicked.
    pub fn wait_timeout(self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => Some(value),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Configuration for creating a thread pool.
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Worker count. `None` uses one worker per CPU core.
    pub num_threads: Option<usize>,
    /// Worker threads are named `<thread_name>-<index>`.
    pub thread_name: String,
    /// Worker stack size in bytes, if not the platform default.
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name: "appshelf-worker".to_string(),
            stack_size: None,
        }
    }
}

impl ThreadPoolConfig {
    /// A configuration with exactly `num_threads` workers.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }

    /// Set the worker thread name prefix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

/// Decrements the active-task counter even if the task panics.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A bounded pool of worker threads.
pub struct ThreadPool {
    name: String,
    pool: RwLock<Option<RayonThreadPool>>,
    num_threads: usize,
    shut_down: AtomicBool,
    active_tasks: Arc<AtomicUsize>,
    completed_tasks: Arc<AtomicU64>,
}

impl ThreadPool {
    /// Start the worker threads.
    pub fn new(config: ThreadPoolConfig) -> Result<Self, ThreadPoolError> {
        let name = config.thread_name.clone();
        let panic_name = name.clone();
        let mut builder = ThreadPoolBuilder::new()
            .thread_name(move |index| format!("{}-{}", config.thread_name, index))
            .panic_handler(move |_| {
                tracing::error!(target: targets::THREADPOOL, pool = %panic_name, "task panicked");
            });

        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }

        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pool = builder
            .build()
            .map_err(|e| ThreadPoolError::CreationFailed(e.to_string()))?;
        let num_threads = pool.current_num_threads();

        tracing::debug!(target: targets::THREADPOOL, pool = %name, num_threads, "thread pool started");

        Ok(Self {
            name,
            pool: RwLock::new(Some(pool)),
            num_threads,
            shut_down: AtomicBool::new(false),
            active_tasks: Arc::new(AtomicUsize::new(0)),
            completed_tasks: Arc::new(AtomicU64::new(0)),
        })
    }

    /// The thread name prefix this pool was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Get the number of tasks submitted but not yet finished.
    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::Acquire)
    }

    /// Get the number of tasks that ran to completion.
    pub fn completed_tasks(&self) -> u64 {
        self.completed_tasks.load(Ordering::Acquire)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Spawn a task on the pool.
    ///
    /// Returns a handle that can be used to wait for the result.
    pub fn spawn<F, T>(&self, task: F) -> Result<TaskHandle<T>, ThreadPoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = bounded(1);

        self.submit(move || {
            let _ = sender.send(task());
        })?;

        Ok(TaskHandle { id, receiver })
    }

    /// Spawn a task and deliver its result to a presentation sink.
    ///
    /// `callback` runs on the sink thread with exclusive access to the sink
    /// state. It always runs once per task: with `Some(result)`, or with
    /// `None` if the task panicked. If the sink has been dropped by the time
    /// the task finishes, the result is discarded.
    pub fn spawn_with_callback<F, T, S, C>(
        &self,
        task: F,
        sink: &SinkHandle<S>,
        callback: C,
    ) -> Result<(), ThreadPoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        S: 'static,
        C: FnOnce(&mut S, Option<T>) + Send + 'static,
    {
        let sink = sink.clone();
        let pool = self.name.clone();
        self.submit(move || {
            let result = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(value) => Some(value),
                Err(payload) => {
                    tracing::error!(
                        target: targets::THREADPOOL,
                        pool = %pool,
                        message = panic_message(payload.as_ref()),
                        "task panicked, delivering no result"
                    );
                    None
                }
            };
            if sink.post(move |state| callback(state, result)).is_err() {
                tracing::trace!(target: targets::THREADPOOL, "sink gone, dropping task result");
            }
        })
    }

    /// Stop accepting new tasks.
    ///
    /// Tasks already submitted still run to completion; the worker threads
    /// exit once they are done. Returns `true` if this call performed the
    /// shutdown, `false` if the pool was already shut down.
    pub fn shutdown(&self) -> bool {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        let pool = self.pool.write().take();
        drop(pool);
        tracing::debug!(
            target: targets::THREADPOOL,
            pool = %self.name,
            in_flight = self.active_tasks(),
            "thread pool shut down"
        );
        true
    }

    fn submit<F>(&self, job: F) -> Result<(), ThreadPoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.pool.read();
        let Some(pool) = guard.as_ref() else {
            return Err(ThreadPoolError::ShutDown);
        };

        self.active_tasks.fetch_add(1, Ordering::AcqRel);
        let active = ActiveGuard(self.active_tasks.clone());
        let completed = self.completed_tasks.clone();

        pool.spawn(move || {
            let _active = active;
            job();
            completed.fetch_add(1, Ordering::AcqRel);
        });
        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.name)
            .field("num_threads", &self.num_threads)
            .field("active_tasks", &self.active_tasks())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
