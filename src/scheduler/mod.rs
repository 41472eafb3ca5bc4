//! Deferred execution for reevaluations
//!
//! Three implementations share one trait:
//! - `ThreadScheduler`: background delay queue on a dedicated thread (default)
//! - `TokioScheduler`: tokio timers on an existing runtime
//! - `ManualScheduler`: virtual clock driven explicitly, for tests

mod manual;
mod thread;
mod tokio_timer;

pub use manual::ManualScheduler;
pub use thread::ThreadScheduler;
pub use tokio_timer::TokioScheduler;

use std::cmp::Ordering;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tracing::error;

/// Fire-and-forget unit of deferred work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs a job once `delay` has elapsed
///
/// Jobs are never cancelled and never run early.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, job: Job);
}

/// Run a job, containing any panic it raises
pub(crate) fn run_job(job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!(target: "leakwatch", "scheduled reevaluation panicked");
    }
}

/// Queue entry ordered by deadline, then by scheduling order
pub(crate) struct Pending<D> {
    pub deadline: D,
    pub seq: u64,
    pub job: Job,
}

impl<D: Ord> PartialEq for Pending<D> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<D: Ord> Eq for Pending<D> {}

impl<D: Ord> PartialOrd for Pending<D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so `BinaryHeap` pops the earliest deadline first
impl<D: Ord> Ord for Pending<D> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    fn pending(deadline: u64, seq: u64) -> Pending<u64> {
        Pending {
            deadline,
            seq,
            job: Box::new(|| {}),
        }
    }

    #[test]
    fn test_heap_pops_earliest_first() {
        let mut heap = BinaryHeap::new();
        heap.push(pending(30, 0));
        heap.push(pending(10, 1));
        heap.push(pending(10, 2));
        heap.push(pending(20, 3));

        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|p| (p.deadline, p.seq))
            .collect();
        assert_eq!(order, vec![(10, 1), (10, 2), (20, 3), (30, 0)]);
    }

    #[test]
    fn test_run_job_contains_panic() {
        run_job(Box::new(|| panic!("reporter blew up")));
    }
}
