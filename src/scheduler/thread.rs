//! Background delay queue on a dedicated worker thread

use super::{run_job, Job, Pending, Scheduler};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error};

const WORKER_NAME: &str = "leakwatch-timer";

struct Queue {
    pending: BinaryHeap<Pending<Instant>>,
    next_seq: u64,
    worker_started: bool,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wakeup: Condvar,
}

/// Single worker thread draining a deadline-ordered queue
///
/// The worker is spawned on the first `schedule` call and exits when the
/// scheduler is dropped; jobs still pending at that point are discarded.
pub struct ThreadScheduler {
    shared: Arc<Shared>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    pending: BinaryHeap::new(),
                    next_seq: 0,
                    worker_started: false,
                    shutdown: false,
                }),
                wakeup: Condvar::new(),
            }),
        }
    }

    /// Jobs waiting for their deadline
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    fn ensure_worker(&self, queue: &mut MutexGuard<'_, Queue>) -> bool {
        if queue.worker_started {
            return true;
        }

        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || worker_loop(shared))
        {
            Ok(_) => {
                debug!(target: "leakwatch", "timer worker started");
                queue.worker_started = true;
                true
            }
            Err(e) => {
                error!(target: "leakwatch", error = %e, "failed to spawn timer worker");
                false
            }
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, job: Job) {
        let deadline = Instant::now() + delay;
        let mut queue = self.shared.queue.lock();

        if queue.shutdown || !self.ensure_worker(&mut queue) {
            return;
        }

        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.pending.push(Pending { deadline, seq, job });
        drop(queue);

        self.shared.wakeup.notify_one();
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        // Never join: the last registry reference may be released by a job
        // running on the worker itself.
        let mut queue = self.shared.queue.lock();
        queue.shutdown = true;
        let discarded = std::mem::take(&mut queue.pending);
        drop(queue);
        self.shared.wakeup.notify_all();
        drop(discarded);
    }
}

fn worker_loop(shared: Arc<Shared>) {
    let mut queue = shared.queue.lock();

    loop {
        if queue.shutdown {
            break;
        }

        let next = queue.pending.peek().map(|p| p.deadline);
        match next {
            None => shared.wakeup.wait(&mut queue),
            Some(deadline) if deadline <= Instant::now() => {
                if let Some(due) = queue.pending.pop() {
                    MutexGuard::unlocked(&mut queue, || run_job(due.job));
                }
            }
            Some(deadline) => {
                let _ = shared.wakeup.wait_until(&mut queue, deadline);
            }
        }
    }

    debug!(target: "leakwatch", "timer worker stopped");
}
