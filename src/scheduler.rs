//! Delayed-callback scheduling
//!
//! The transport never sleeps itself; it asks a [`Scheduler`] to post a
//! [`LoopEvent::Timer`] back after a delay. Production uses tokio timers,
//! tests use [`crate::testing::ManualScheduler`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::event_loop::{LoopEvent, LoopHandle};

/// Identifies one scheduled delay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

pub trait Scheduler {
    /// Post `LoopEvent::Timer(timer)` after `delay`
    fn schedule(&mut self, timer: TimerId, delay: Duration);

    /// Cancel a pending timer; unknown ids are ignored
    fn cancel(&mut self, timer: TimerId);
}

/// Scheduler backed by `tokio::time::sleep` tasks.
///
/// Must be used from within a tokio runtime.
pub struct TokioScheduler {
    handle: LoopHandle,
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(handle: LoopHandle) -> Self {
        Self {
            handle,
            timers: HashMap::new(),
        }
    }

    /// Number of timers that have not fired or been cancelled
    pub fn pending(&self) -> usize {
        self.timers.values().filter(|task| !task.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, timer: TimerId, delay: Duration) {
        self.timers.retain(|_, task| !task.is_finished());

        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.post(LoopEvent::Timer(timer));
        });
        if let Some(previous) = self.timers.insert(timer, task) {
            previous.abort();
        }
    }

    fn cancel(&mut self, timer: TimerId) {
        if let Some(task) = self.timers.remove(&timer) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}
