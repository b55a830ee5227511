use crate::utils::error::compact_error_message;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct TaskQueueInner<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

/// Single-worker work queue serializing watch cycles.
///
/// Items are opaque; there is no deduplication and no cancellation — once
/// queued, an item eventually runs. `push_front` lets the clock prioritize the
/// freshest tick over any backlog without discarding older ticks.
pub struct TaskQueue<T> {
    inner: Arc<TaskQueueInner<T>>,
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TaskQueueInner {
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    closed: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState<T>> {
        match self.inner.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push_back(&self, item: T) {
        {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.items.push_back(item);
        }
        self.inner.notify.notify_one();
    }

    pub fn push_front(&self, item: T) {
        {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.items.push_front(item);
        }
        self.inner.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        self.lock_state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().items.is_empty()
    }

    /// Stop accepting items; the worker drains what is queued, then exits.
    pub fn close(&self) {
        {
            let mut state = self.lock_state();
            state.closed = true;
        }
        self.inner.notify.notify_waiters();
    }

    /// Wait for the next item. Returns `None` once the queue is closed and
    /// fully drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            // The notified future must exist before the lock is released, or a
            // push/close landing in between would be missed.
            let notified = {
                let mut state = self.lock_state();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
                self.inner.notify.notified()
            };
            notified.await;
        }
    }
}

impl<T: Send + 'static> TaskQueue<T> {
    /// Spawn the single consumer. The handler is awaited to completion before
    /// the next item is pulled, so items never run concurrently; a failing
    /// handler is logged and the worker keeps draining.
    pub fn spawn_worker<H, Fut>(&self, mut handler: H) -> JoinHandle<()>
    where
        H: FnMut(T) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let queue = self.clone();
        tokio::spawn(async move {
            while let Some(item) = queue.pop().await {
                if let Err(err) = handler(item).await {
                    tracing::error!(
                        "[QUEUE] task failed: {}",
                        compact_error_message(&err.to_string(), 320)
                    );
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TaskQueue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_front_pushes_run_before_backlog() {
        let queue: TaskQueue<u32> = TaskQueue::new();
        queue.push_back(1);
        queue.push_back(2);
        queue.push_front(3);

        assert_eq!(queue.pop().await, Some(3));
        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, Some(2));
    }

    #[tokio::test]
    async fn test_newest_front_push_wins_among_front_pushes() {
        let queue: TaskQueue<u32> = TaskQueue::new();
        queue.push_front(1);
        queue.push_front(2);
        queue.push_front(3);

        assert_eq!(queue.pop().await, Some(3));
        assert_eq!(queue.pop().await, Some(2));
        assert_eq!(queue.pop().await, Some(1));
    }

    #[tokio::test]
    async fn test_close_drains_remaining_items_then_ends() {
        let queue: TaskQueue<u32> = TaskQueue::new();
        queue.push_back(1);
        queue.close();
        queue.push_back(2);

        assert_eq!(queue.pop().await, Some(1));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_worker_serializes_and_survives_handler_failure() {
        let queue: TaskQueue<u32> = TaskQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker = {
            let seen = Arc::clone(&seen);
            let in_flight = Arc::clone(&in_flight);
            queue.spawn_worker(move |item| {
                let seen = Arc::clone(&seen);
                let in_flight = Arc::clone(&in_flight);
                async move {
                    assert_eq!(in_flight.fetch_add(1, Ordering::SeqCst), 0);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    seen.lock().expect("seen lock").push(item);
                    if item == 2 {
                        anyhow::bail!("boom");
                    }
                    Ok(())
                }
            })
        };

        queue.push_back(1);
        queue.push_back(2);
        queue.push_back(3);
        queue.close();
        worker.await.expect("worker join");

        assert_eq!(*seen.lock().expect("seen lock"), vec![1, 2, 3]);
    }
}
