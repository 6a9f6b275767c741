//! Background task handle with cooperative cancellation.
//!
//! Long-running work (the metadata refresh, mainly) runs on a plain worker
//! thread while the single UI thread polls the handle on its event tick.
//! Cancellation is a flag the worker checks between work items; nothing is
//! pre-empted, so a worker can always finish or abandon an item cleanly
//! before stopping.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::warn;

/// Result of polling a task. `Done`/`Failed` are yielded exactly once;
/// callers drop the handle afterwards.
#[derive(Debug)]
pub enum TaskStatus<T> {
    Pending,
    Done(T),
    Failed(String),
}

/// Worker-side view of a task: the cancellation flag plus a progress
/// counter the worker bumps after each completed item.
pub struct TaskContext {
    cancelled: Arc<AtomicBool>,
    items_done: Arc<AtomicUsize>,
}

impl TaskContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn advance(&self) {
        self.items_done.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to a background worker thread.
pub struct Task<T> {
    handle: Option<JoinHandle<()>>,
    slot: Arc<Mutex<Option<Result<T, String>>>>,
    cancelled: Arc<AtomicBool>,
    items_done: Arc<AtomicUsize>,
}

impl<T: Send + 'static> Task<T> {
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&TaskContext) -> Result<T, String> + Send + 'static,
    {
        let slot = Arc::new(Mutex::new(None));
        let cancelled = Arc::new(AtomicBool::new(false));
        let items_done = Arc::new(AtomicUsize::new(0));

        let ctx = TaskContext {
            cancelled: Arc::clone(&cancelled),
            items_done: Arc::clone(&items_done),
        };
        let worker_slot = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            let result = work(&ctx);
            if let Ok(mut guard) = worker_slot.lock() {
                *guard = Some(result);
            }
        });

        Self {
            handle: Some(handle),
            slot,
            cancelled,
            items_done,
        }
    }

    /// Check on the worker without blocking.
    pub fn poll(&mut self) -> TaskStatus<T> {
        let taken = self.slot.lock().ok().and_then(|mut guard| guard.take());
        match taken {
            Some(Ok(value)) => {
                self.join();
                TaskStatus::Done(value)
            }
            Some(Err(e)) => {
                self.join();
                TaskStatus::Failed(e)
            }
            None => {
                if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
                    // Finished without posting a result: the worker panicked.
                    self.join();
                    TaskStatus::Failed("background task panicked".to_string())
                } else {
                    TaskStatus::Pending
                }
            }
        }
    }

    /// Request early termination. The worker honors it at its next
    /// between-items check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Work items the worker has completed so far.
    pub fn items_done(&self) -> usize {
        self.items_done.load(Ordering::Relaxed)
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("background task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn poll_until_settled<T>(task: &mut Task<T>) -> TaskStatus<T>
    where
        T: Send + 'static,
    {
        for _ in 0..500 {
            match task.poll() {
                TaskStatus::Pending => thread::sleep(Duration::from_millis(2)),
                settled => return settled,
            }
        }
        panic!("task never settled");
    }

    #[test]
    fn completed_task_yields_its_value() {
        let mut task = Task::spawn(|ctx| {
            ctx.advance();
            Ok(41 + 1)
        });
        match poll_until_settled(&mut task) {
            TaskStatus::Done(v) => assert_eq!(v, 42),
            other => panic!("expected Done, got {other:?}"),
        }
        assert_eq!(task.items_done(), 1);
    }

    #[test]
    fn failed_task_reports_its_error() {
        let mut task: Task<()> = Task::spawn(|_| Err("boom".to_string()));
        match poll_until_settled(&mut task) {
            TaskStatus::Failed(e) => assert_eq!(e, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn cancel_is_observed_between_items() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let mut task = Task::spawn(move |ctx| {
            // First item: wait until the test has requested cancellation.
            rx.recv().map_err(|e| e.to_string())?;
            ctx.advance();
            if ctx.is_cancelled() {
                return Ok(1usize);
            }
            ctx.advance();
            Ok(2)
        });

        task.cancel();
        tx.send(()).unwrap();

        match poll_until_settled(&mut task) {
            TaskStatus::Done(items) => assert_eq!(items, 1),
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn panicking_task_reads_as_failed() {
        let mut task: Task<()> = Task::spawn(|_| panic!("worker bug"));
        match poll_until_settled(&mut task) {
            TaskStatus::Failed(e) => assert!(e.contains("panicked")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
