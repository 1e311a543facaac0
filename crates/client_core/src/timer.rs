//! Cancellable delayed callbacks on the tokio clock.
//!
//! Controllers keep the returned [`ScheduledTask`] next to the state it
//! mutates. Dropping the handle cancels the callback, so a controller that is
//! discarded can never be written to by a timer that outlived it.

use std::{future::Future, time::Duration};

use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct ScheduledTask {
    handle: JoinHandle<()>,
}

/// Runs `task` once `delay` has elapsed unless the handle is cancelled or dropped first.
pub fn schedule_after<F>(delay: Duration, task: F) -> ScheduledTask
where
    F: Future<Output = ()> + Send + 'static,
{
    // Deadline is fixed here, not on the task's first poll.
    let sleep = tokio::time::sleep(delay);
    let handle = tokio::spawn(async move {
        sleep.await;
        task.await;
    });
    ScheduledTask { handle }
}

impl ScheduledTask {
    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
