//! Virtual clock scheduler for deterministic tests

use super::{run_job, Job, Pending, Scheduler};
use parking_lot::Mutex;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Clock {
    now: Duration,
    next_seq: u64,
    pending: BinaryHeap<Pending<Duration>>,
}

/// Scheduler whose time only moves when `advance` is called
///
/// Jobs run on the thread calling `advance`, in deadline order. Clones share
/// the same clock, so a test can keep one while the registry owns another.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: Arc<Mutex<Clock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Jobs waiting for their deadline
    pub fn pending(&self) -> usize {
        self.clock.lock().pending.len()
    }

    /// Move the clock forward, running every job that falls due
    ///
    /// Jobs scheduled by a running job are picked up if they fall due before
    /// the new time. Returns the number of jobs run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.lock().now + by;
        let mut ran = 0;

        loop {
            let due = {
                let mut clock = self.clock.lock();
                match clock.pending.peek() {
                    Some(next) if next.deadline <= target => {
                        let job = clock.pending.pop();
                        if let Some(job) = &job {
                            clock.now = clock.now.max(job.deadline);
                        }
                        job
                    }
                    _ => None,
                }
            };

            match due {
                Some(pending) => {
                    run_job(pending.job);
                    ran += 1;
                }
                None => break,
            }
        }

        let mut clock = self.clock.lock();
        clock.now = clock.now.max(target);
        ran
    }

    /// Run everything pending regardless of deadline
    pub fn run_all(&self) -> usize {
        let last = self
            .clock
            .lock()
            .pending
            .iter()
            .map(|p| p.deadline)
            .max();

        match last {
            Some(deadline) => {
                let by = deadline.saturating_sub(self.now());
                self.advance(by)
            }
            None => 0,
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, job: Job) {
        let mut clock = self.clock.lock();
        let deadline = clock.now + delay;
        let seq = clock.next_seq;
        clock.next_seq += 1;
        clock.pending.push(Pending { deadline, seq, job });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_nothing_runs_before_deadline() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();

        scheduler.schedule(
            Duration::from_millis(500),
            Box::new(move || {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(scheduler.advance(Duration::from_millis(499)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.now(), Duration::from_millis(500));
    }

    #[test]
    fn test_nested_schedule_within_window() {
        let scheduler = ManualScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let h = hits.clone();
        scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let h2 = h.clone();
                inner_scheduler.schedule(
                    Duration::from_millis(10),
                    Box::new(move || {
                        h2.fetch_add(1, Ordering::SeqCst);
                    }),
                );
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(scheduler.advance(Duration::from_millis(25)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_run_all() {
        let scheduler = ManualScheduler::new();
        scheduler.schedule(Duration::from_secs(3), Box::new(|| {}));
        scheduler.schedule(Duration::from_secs(1), Box::new(|| {}));

        assert_eq!(scheduler.run_all(), 2);
        assert_eq!(scheduler.now(), Duration::from_secs(3));
        assert_eq!(scheduler.run_all(), 0);
    }
}
