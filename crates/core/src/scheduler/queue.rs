//! Main thread task queue
//!
//! Allows background threads to queue work for the thread that drives
//! [`EventRuntime::tick`](crate::EventRuntime::tick).

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::panic_message;

/// A task to execute on the main thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Capacity of the task queue per tick
pub const QUEUE_CAPACITY: usize = 1024;

/// Reasons a task could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("task queue is full")]
    Full,
    #[error("task queue is disconnected")]
    Disconnected,
}

/// Task queue channels
pub(crate) struct TaskQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(QUEUE_CAPACITY);
        Self { sender, receiver }
    }

    /// Queue a task without blocking
    pub fn push(&self, task: Task) -> Result<(), QueueError> {
        match self.sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Task queue full, dropping task");
                Err(QueueError::Full)
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::error!("Task queue disconnected");
                Err(QueueError::Disconnected)
            }
        }
    }

    /// Run queued tasks, at most [`QUEUE_CAPACITY`] per call
    ///
    /// Returns the number of tasks processed.
    pub fn process(&self) -> usize {
        let mut count = 0;

        while let Ok(task) = self.receiver.try_recv() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                tracing::error!("Queued task panicked: {}", panic_message(payload));
            }
            count += 1;

            if count >= QUEUE_CAPACITY {
                break;
            }
        }

        count
    }

    /// Drop every queued task without running it
    pub fn clear(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }
}
