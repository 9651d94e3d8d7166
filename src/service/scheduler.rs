use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// A recurring background job. The first run happens immediately, then once
/// per period. The job is aborted when the task is stopped or dropped, so its
/// lifetime is bound to whoever holds it.
pub struct PeriodicTask {
    name: String,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawns the task on the current tokio runtime. `period` must be non-zero.
    pub fn spawn<F, Fut>(name: &str, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task_name = name.to_string();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                debug!(task = %task_name, "Periodic task tick");
                job().await;
            }
        });

        Self {
            name: name.to_string(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn stop(self) {
        // Dropping aborts the job
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        debug!(task = %self.name, "Stopping periodic task");
        self.handle.abort();
    }
}
