//! Bounded-concurrency task queue
//!
//! An admission-controlled work queue: tasks are accepted in FIFO order
//! and at most `capacity` of them execute at once. A single dispatcher
//! loop reacts to submissions, completions, and capacity changes; it is
//! woken through a [`tokio::sync::Notify`] rather than re-spawned per
//! event, so queued work advances without polling.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{oneshot, Notify};

/// Lowest admissible concurrency cap.
pub const MIN_CAPACITY: usize = 1;
/// Highest admissible concurrency cap.
pub const MAX_CAPACITY: usize = 32;

/// Clamp a requested cap into the supported range.
pub fn clamp_capacity(requested: usize) -> usize {
    requested.clamp(MIN_CAPACITY, MAX_CAPACITY)
}

#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue was dropped before the task produced its result.
    #[error("task queue shut down before the task completed")]
    Closed,
}

/// Snapshot of the scheduler state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    pub capacity: usize,
    pub running: usize,
    pub pending: usize,
}

struct QueuedTask<T> {
    id: u64,
    work: BoxFuture<'static, T>,
    result_tx: oneshot::Sender<T>,
}

struct State<T> {
    capacity: usize,
    pending: VecDeque<QueuedTask<T>>,
    running: HashSet<u64>,
    closed: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    wake: Notify,
    next_id: AtomicU64,
}

/// Admission-controlled FIFO work queue.
///
/// Must be created inside a Tokio runtime; the dispatcher runs as a
/// background task for the queue's lifetime.
pub struct TaskQueue<T: Send + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Send + 'static> TaskQueue<T> {
    pub fn new(max_concurrent: usize) -> Self {
        let capacity = clamp_capacity(max_concurrent);
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                capacity,
                pending: VecDeque::new(),
                running: HashSet::new(),
                closed: false,
            }),
            wake: Notify::new(),
            next_id: AtomicU64::new(1),
        });
        tokio::spawn(dispatch_loop(inner.clone()));
        tracing::info!(capacity, "task queue initialized");
        Self { inner }
    }

    /// Enqueue `work` and wait for its result.
    ///
    /// The returned future resolves when the task has run to completion,
    /// not when it is admitted.
    pub async fn submit<F>(&self, work: F) -> Result<T, QueueError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.inner.state.lock();
            state.pending.push_back(QueuedTask {
                id,
                work: Box::pin(work),
                result_tx,
            });
            tracing::debug!(
                id,
                pending = state.pending.len(),
                running = state.running.len(),
                "task enqueued"
            );
        }
        self.inner.wake.notify_one();
        result_rx.await.map_err(|_| QueueError::Closed)
    }

    /// Update the concurrency cap, clamped to [`MIN_CAPACITY`],
    /// [`MAX_CAPACITY`], and immediately re-evaluate pending work.
    ///
    /// Lowering the cap never interrupts tasks that are already running;
    /// it only throttles new dispatch.
    pub fn set_capacity(&self, max_concurrent: usize) {
        let capacity = clamp_capacity(max_concurrent);
        self.inner.state.lock().capacity = capacity;
        tracing::info!(capacity, "queue capacity updated");
        self.inner.wake.notify_one();
    }

    pub fn capacity(&self) -> usize {
        self.inner.state.lock().capacity
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state.lock();
        QueueStatus {
            capacity: state.capacity,
            running: state.running.len(),
            pending: state.pending.len(),
        }
    }
}

impl<T: Send + 'static> Drop for TaskQueue<T> {
    fn drop(&mut self) {
        self.inner.state.lock().closed = true;
        self.inner.wake.notify_one();
    }
}

/// Dispatcher: drain admissible work, then sleep until the next event.
///
/// The lock is held only while popping/bookkeeping, never across task
/// execution. A `Notify` permit is retained if a wake-up arrives while
/// the dispatcher is mid-drain, so no event is ever lost.
async fn dispatch_loop<T: Send + 'static>(inner: Arc<Inner<T>>) {
    loop {
        loop {
            let next = {
                let mut state = inner.state.lock();
                if state.closed {
                    // Pending result channels are dropped here, which
                    // resolves their submitters with QueueError::Closed.
                    state.pending.clear();
                    return;
                }
                if state.running.len() < state.capacity {
                    if let Some(task) = state.pending.pop_front() {
                        state.running.insert(task.id);
                        Some((task, state.running.len(), state.capacity))
                    } else {
                        None
                    }
                } else {
                    None
                }
            };
            let Some((task, running, capacity)) = next else {
                break;
            };
            tracing::debug!(id = task.id, running, capacity, "task started");
            let inner = inner.clone();
            tokio::spawn(async move {
                let id = task.id;
                let value = task.work.await;
                // A dropped receiver just means the submitter went away.
                let _ = task.result_tx.send(value);
                {
                    let mut state = inner.state.lock();
                    state.running.remove(&id);
                    tracing::debug!(id, running = state.running.len(), "task completed");
                }
                inner.wake.notify_one();
            });
        }
        inner.wake.notified().await;
    }
}
