//! Deferred-to-next-frame task queue.
//!
//! Writes into shared preview state must not interleave with a render pass in
//! progress, so they are queued here and applied when the host flushes the
//! next frame. Hosts either call [`FrameQueue::flush`] after each render or
//! spawn the interval driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

type FrameTask = Box<dyn FnOnce() + Send + 'static>;

/// FIFO of tasks run on the next frame.
#[derive(Clone, Default)]
pub struct FrameQueue {
    pending: Arc<Mutex<Vec<FrameTask>>>,
    frames: Arc<AtomicU64>,
}

impl FrameQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` for the next frame.
    pub fn defer<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending
            .lock()
            .expect("acquire frame queue lock")
            .push(Box::new(task));
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().expect("acquire frame queue lock").len()
    }

    /// Number of frames flushed so far.
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Run every task queued before this call. Tasks deferred while flushing
    /// wait for the following frame. Returns the number of tasks run.
    pub fn flush(&self) -> usize {
        let tasks = std::mem::take(&mut *self.pending.lock().expect("acquire frame queue lock"));
        let count = tasks.len();
        for task in tasks {
            task();
        }
        let frame = self.frames.fetch_add(1, Ordering::AcqRel) + 1;
        if count > 0 {
            trace!(frame, count, "flushed frame tasks");
        }
        count
    }

    /// Flush on a fixed interval until `cancel` fires.
    pub fn spawn_driver(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        queue.flush();
                    }
                }
            }
        })
    }
}
