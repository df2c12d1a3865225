//! Runtime primitives for appshelf.
//!
//! This crate provides the building blocks the appshelf engine is assembled
//! from:
//!
//! - **Presentation sink**: a single-threaded executor that owns presentation
//!   state; every other thread talks to it by posting closures
//! - **Thread pools**: bounded worker pools whose results can be delivered
//!   straight into a sink
//! - **Signals**: typed notifications with any number of connected slots
//! - **Load progress**: outstanding-work accounting with a one-shot
//!   "fully loaded" latch
//!
//! # Example
//!
//! ```
//! use appshelf_core::sink::Sink;
//! use appshelf_core::threadpool::{ThreadPool, ThreadPoolConfig};
//! use std::time::Duration;
//!
//! let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2)).unwrap();
//! let mut sink = Sink::new(Vec::<String>::new());
//!
//! pool.spawn_with_callback(
//!     || "resolved".to_string(),
//!     &sink.handle(),
//!     |rows, value| rows.extend(value),
//! )
//! .unwrap();
//!
//! while sink.state().is_empty() {
//!     sink.wait_and_process(Duration::from_millis(10));
//! }
//! assert_eq!(sink.state()[0], "resolved");
//! ```

mod error;
pub mod logging;
pub mod progress;
pub mod signal;
pub mod sink;
pub mod threadpool;

pub use error::{CoreError, Result, SinkError, ThreadPoolError};
pub use logging::PerfSpan;
pub use progress::LoadProgress;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use sink::{Job, Sink, SinkHandle};
pub use threadpool::{TaskHandle, ThreadPool, ThreadPoolConfig};
