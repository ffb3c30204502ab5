use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Handle to a spawned background task. Dropping it cancels the task.
#[derive(Debug)]
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Runs `task` every `period`, first run immediately. A run that overruns
/// its period delays the next one instead of stacking up.
pub fn spawn_repeating<F, Fut>(period: Duration, mut task: F) -> TaskHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            task().await;
        }
    });
    TaskHandle { handle }
}
