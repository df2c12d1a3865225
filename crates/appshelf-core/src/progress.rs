//! Outstanding-work accounting for background loads.
//!
//! [`LoadProgress`] counts units of work that have been scheduled but not yet
//! completed, and latches a one-shot "fully loaded" transition the first time
//! the count drops back to zero after work was scheduled.
//!
//! ```
//! use appshelf_core::progress::LoadProgress;
//!
//! let progress = LoadProgress::new();
//! progress.schedule(2);
//!
//! assert!(!progress.complete_one());
//! assert!(progress.complete_one());
//! assert!(progress.is_fully_loaded());
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::logging::targets;
use crate::signal::Signal;

/// Counter of outstanding loads with a one-shot completion latch.
///
/// The counter itself is atomic so any thread can read it; completions are
/// expected to be reported from the presentation sink.
pub struct LoadProgress {
    outstanding: AtomicUsize,
    scheduled_total: AtomicUsize,
    fully_loaded: AtomicBool,
    completed: Signal<usize>,
}

impl Default for LoadProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadProgress {
    /// Create a new progress counter with nothing outstanding.
    pub fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            scheduled_total: AtomicUsize::new(0),
            fully_loaded: AtomicBool::new(false),
            completed: Signal::new(),
        }
    }

    /// Record `count` newly scheduled units.
    pub fn schedule(&self, count: usize) {
        self.outstanding.fetch_add(count, Ordering::AcqRel);
        self.scheduled_total.fetch_add(count, Ordering::AcqRel);
    }

    /// Record one completed unit.
    ///
    /// Returns `true` exactly once: on the 1 → 0 transition that first
    /// completes all scheduled work. The [`completed`](Self::on_completed)
    /// signal is emitted at the same moment with the total number of units.
    pub fn complete_one(&self) -> bool {
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));

        match previous {
            Ok(1) => {
                if self.fully_loaded.swap(true, Ordering::AcqRel) {
                    return false;
                }
                let total = self.scheduled_total.load(Ordering::Acquire);
                tracing::debug!(target: targets::PROGRESS, total, "all scheduled loads completed");
                self.completed.emit(total);
                true
            }
            Ok(_) => false,
            Err(_) => {
                tracing::warn!(target: targets::PROGRESS, "completion reported with nothing outstanding");
                false
            }
        }
    }

    /// Number of units scheduled but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Total number of units ever scheduled.
    pub fn scheduled_total(&self) -> usize {
        self.scheduled_total.load(Ordering::Acquire)
    }

    /// Whether the one-shot completion has fired.
    pub fn is_fully_loaded(&self) -> bool {
        self.fully_loaded.load(Ordering::Acquire)
    }

    /// Fraction of scheduled work completed, from 0.0 to 1.0.
    pub fn fraction(&self) -> f32 {
        let total = self.scheduled_total();
        if total == 0 {
            return 0.0;
        }
        let done = total.saturating_sub(self.outstanding());
        done as f32 / total as f32
    }

    /// Signal emitted once when all scheduled work has completed.
    pub fn on_completed(&self) -> &Signal<usize> {
        &self.completed
    }
}

impl std::fmt::Debug for LoadProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadProgress")
            .field("outstanding", &self.outstanding())
            .field("scheduled_total", &self.scheduled_total())
            .field("fully_loaded", &self.is_fully_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fires_once_on_last_completion() {
        let progress = LoadProgress::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let fired_clone = fired.clone();
        progress.on_completed().connect(move |_| {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        });

        progress.schedule(3);
        assert!(!progress.complete_one());
        assert!(!progress.complete_one());
        assert_eq!(progress.outstanding(), 1);
        assert!(progress.complete_one());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_does_not_fire_again_after_more_work() {
        let progress = LoadProgress::new();
        progress.schedule(1);
        assert!(progress.complete_one());

        progress.schedule(1);
        assert!(!progress.complete_one());
        assert!(progress.is_fully_loaded());
    }

    #[test]
    fn test_extra_completion_is_ignored() {
        let progress = LoadProgress::new();
        assert!(!progress.complete_one());
        assert_eq!(progress.outstanding(), 0);
        assert!(!progress.is_fully_loaded());
    }

    #[test]
    fn test_fraction() {
        let progress = LoadProgress::new();
        assert_eq!(progress.fraction(), 0.0);

        progress.schedule(4);
        progress.complete_one();
        assert!((progress.fraction() - 0.25).abs() < f32::EPSILON);
    }
}
