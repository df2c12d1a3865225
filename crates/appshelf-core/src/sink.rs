//! Single-threaded presentation sink.
//!
//! A [`Sink<S>`] owns the presentation state `S` and is the only place where
//! that state is ever mutated. Other threads cannot touch `S`; they hold a
//! [`SinkHandle<S>`] and post closures that the sink later runs, one at a
//! time and in posting order, with `&mut S`.
//!
//! The sink is deliberately `!Send`: it stays on the thread that created it
//! (the presentation thread), which makes "only mutate presentation state on
//! this thread" a property of the types rather than a convention.
//!
//! Besides immediate jobs the sink keeps a deadline-ordered queue of delayed
//! jobs, which become runnable once their deadline has passed.
//!
//! # Example
//!
//! ```
//! use appshelf_core::sink::Sink;
//! use std::time::Duration;
//!
//! let mut sink = Sink::new(Vec::<u32>::new());
//! let handle = sink.handle();
//!
//! std::thread::spawn(move || {
//!     handle.post(|rows| rows.push(7)).ok();
//! })
//! .join()
//! .unwrap();
//!
//! sink.wait_and_process(Duration::from_secs(1));
//! assert_eq!(sink.state(), &vec![7]);
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::SinkError;
use crate::logging::{span_names, targets};

/// A unit of work executed on the sink with exclusive access to the state.
pub type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum SinkMessage<S> {
    Run(Job<S>),
    RunAt { deadline: Instant, job: Job<S> },
}

/// The cloneable, thread-safe posting side of a [`Sink`].
pub struct SinkHandle<S> {
    sender: Sender<SinkMessage<S>>,
}

impl<S> Clone for SinkHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<S> SinkHandle<S> {
    /// Post a job to run on the sink as soon as it is next drained.
    ///
    /// Fails only if the sink has been dropped.
    pub fn post<F>(&self, job: F) -> Result<(), SinkError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.sender
            .send(SinkMessage::Run(Box::new(job)))
            .map_err(|_| SinkError::Disconnected)
    }

    /// Post a job that becomes runnable once `delay` has elapsed.
    pub fn post_delayed<F>(&self, delay: Duration, job: F) -> Result<(), SinkError>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let deadline = Instant::now() + delay;
        self.sender
            .send(SinkMessage::RunAt {
                deadline,
                job: Box::new(job),
            })
            .map_err(|_| SinkError::Disconnected)
    }

    /// Number of messages posted but not yet picked up by the sink.
    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}

impl<S> std::fmt::Debug for SinkHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("queued", &self.sender.len())
            .finish()
    }
}

/// An entry in the delayed queue (min-heap by deadline, then posting order).
struct DelayedEntry<S> {
    deadline: Instant,
    seq: u64,
    job: Job<S>,
}

impl<S> PartialEq for DelayedEntry<S> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<S> Eq for DelayedEntry<S> {}

impl<S> PartialOrd for DelayedEntry<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S> Ord for DelayedEntry<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap (BinaryHeap is max-heap by default).
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Single-consumer executor owning the presentation state.
pub struct Sink<S> {
    receiver: Receiver<SinkMessage<S>>,
    handle: SinkHandle<S>,
    delayed: BinaryHeap<DelayedEntry<S>>,
    next_seq: u64,
    state: S,
    _not_send: PhantomData<Rc<()>>,
}

impl<S> Sink<S> {
    /// Create a sink owning `state`.
    pub fn new(state: S) -> Self {
        Self::new_cyclic(|_| state)
    }

    /// Create a sink whose state needs a handle to the sink itself.
    pub fn new_cyclic<F>(build: F) -> Self
    where
        F: FnOnce(&SinkHandle<S>) -> S,
    {
        let (sender, receiver) = unbounded();
        let handle = SinkHandle { sender };
        let state = build(&handle);
        Self {
            receiver,
            handle,
            delayed: BinaryHeap::new(),
            next_seq: 0,
            state,
            _not_send: PhantomData,
        }
    }

    /// Get a posting handle for this sink.
    pub fn handle(&self) -> SinkHandle<S> {
        self.handle.clone()
    }

    /// Shared access to the state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Exclusive access to the state, for synchronous calls made on the
    /// sink's own thread.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Number of delayed jobs that have not yet run.
    pub fn pending_delayed(&self) -> usize {
        self.delayed.len()
    }

    /// Number of immediate messages waiting in the channel.
    pub fn pending_immediate(&self) -> usize {
        self.receiver.len()
    }

    /// Time until the earliest delayed job becomes runnable, if any.
    pub fn time_until_next_deadline(&self) -> Option<Duration> {
        self.delayed
            .peek()
            .map(|entry| entry.deadline.saturating_duration_since(Instant::now()))
    }

    /// Run every job that is runnable right now without blocking.
    ///
    /// Jobs posted by jobs that run during this call are also run. Returns
    /// the number of jobs executed.
    pub fn process_pending(&mut self) -> usize {
        let _span = tracing::trace_span!(target: targets::SINK, span_names::SINK_DRAIN).entered();
        let mut executed = 0;

        loop {
            let mut progressed = false;

            loop {
                match self.receiver.try_recv() {
                    Ok(message) => {
                        if self.accept(message) {
                            executed += 1;
                        }
                        progressed = true;
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }

            let now = Instant::now();
            while self.delayed.peek().is_some_and(|entry| entry.deadline <= now) {
                if let Some(entry) = self.delayed.pop() {
                    (entry.job)(&mut self.state);
                    executed += 1;
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }

        if executed > 0 {
            tracing::trace!(target: targets::SINK, executed, "sink drained");
        }
        executed
    }

    /// Block until at least one job is runnable or `timeout` elapses, then
    /// run everything runnable.
    ///
    /// Returns the number of jobs executed.
    pub fn wait_and_process(&mut self, timeout: Duration) -> usize {
        let executed = self.process_pending();
        if executed > 0 {
            return executed;
        }

        let wait = match self.time_until_next_deadline() {
            Some(until_deadline) => until_deadline.min(timeout),
            None => timeout,
        };

        match self.receiver.recv_timeout(wait) {
            Ok(message) => {
                let first = usize::from(self.accept(message));
                first + self.process_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.process_pending()
            }
        }
    }

    /// Run an immediate job, or park a delayed one. Returns whether a job ran.
    fn accept(&mut self, message: SinkMessage<S>) -> bool {
        match message {
            SinkMessage::Run(job) => {
                job(&mut self.state);
                true
            }
            SinkMessage::RunAt { deadline, job } => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.delayed.push(DelayedEntry { deadline, seq, job });
                false
            }
        }
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Sink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("pending_immediate", &self.pending_immediate())
            .field("pending_delayed", &self.pending_delayed())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_run_in_posting_order() {
        let mut sink = Sink::new(Vec::new());
        let handle = sink.handle();

        for i in 0..5 {
            handle.post(move |log: &mut Vec<i32>| log.push(i)).unwrap();
        }

        assert_eq!(sink.process_pending(), 5);
        assert_eq!(sink.state(), &vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_posts_from_other_threads() {
        let mut sink = Sink::new(0usize);

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let handle = sink.handle();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        handle.post(|count| *count += 1).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        sink.process_pending();
        assert_eq!(*sink.state(), 40);
    }

    struct Recorder {
        handle: SinkHandle<Recorder>,
        log: Vec<&'static str>,
    }

    #[test]
    fn test_job_posted_by_job_runs_in_same_drain() {
        let mut sink = Sink::new_cyclic(|handle| Recorder {
            handle: handle.clone(),
            log: Vec::new(),
        });
        let handle = sink.handle();

        handle
            .post(|recorder: &mut Recorder| {
                recorder.log.push("outer");
                recorder
                    .handle
                    .post(|recorder: &mut Recorder| recorder.log.push("inner"))
                    .unwrap();
            })
            .unwrap();

        assert_eq!(sink.process_pending(), 2);
        assert_eq!(sink.state().log, vec!["outer", "inner"]);
    }

    #[test]
    fn test_delayed_job_waits_for_deadline() {
        let mut sink = Sink::new(Vec::new());
        let handle = sink.handle();

        handle
            .post_delayed(Duration::from_millis(50), |log: &mut Vec<&str>| log.push("late"))
            .unwrap();
        handle.post(|log| log.push("now")).unwrap();

        sink.process_pending();
        assert_eq!(sink.state(), &vec!["now"]);
        assert_eq!(sink.pending_delayed(), 1);

        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.pending_delayed() > 0 && Instant::now() < deadline {
            sink.wait_and_process(Duration::from_millis(100));
        }
        assert_eq!(sink.state(), &vec!["now", "late"]);
    }

    #[test]
    fn test_delayed_jobs_ordered_by_deadline() {
        let mut sink = Sink::new(Vec::new());
        let handle = sink.handle();

        handle
            .post_delayed(Duration::from_millis(40), |log: &mut Vec<u8>| log.push(2))
            .unwrap();
        handle
            .post_delayed(Duration::from_millis(10), |log: &mut Vec<u8>| log.push(1))
            .unwrap();

        std::thread::sleep(Duration::from_millis(60));
        sink.process_pending();
        assert_eq!(sink.state(), &vec![1, 2]);
    }

    #[test]
    fn test_wait_times_out_without_work() {
        let mut sink = Sink::new(());
        let start = Instant::now();
        assert_eq!(sink.wait_and_process(Duration::from_millis(20)), 0);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_post_after_drop_fails() {
        let sink = Sink::new(());
        let handle = sink.handle();
        drop(sink);

        assert_eq!(handle.post(|_| {}), Err(SinkError::Disconnected));
    }
}
