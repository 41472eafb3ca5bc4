//! Tokio-backed scheduler for hosts that already run a runtime

use super::{run_job, Job, Scheduler};
use std::time::Duration;
use tokio::runtime::Handle;

/// Spawns one sleeping task per scheduled job on a tokio runtime
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime of the calling context, if any
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, job: Job) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            run_job(job);
        });
    }
}
