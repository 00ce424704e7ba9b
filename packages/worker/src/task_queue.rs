//! Worker Task Queue (§4.7): a bounded-concurrency executor owned by each polling
//! agent. Wraps the user function so neither a thrown error nor a rejection ever
//! propagates past `on_complete` — both flow back as a tagged outcome.

use std::sync::Arc;
use std::time::Instant;

use je_protocol::PackedBytes;
use tokio::sync::{Semaphore, TryAcquireError};
use tokio::task::JoinSet;

use crate::registry::RegisteredFn;

#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Resolution {
        content: PackedBytes,
        function_execution_time_ms: i64,
    },
    Rejection {
        content: PackedBytes,
        function_execution_time_ms: i64,
    },
}

/// A bounded-concurrency executor. `addTask` only admits a task if the live
/// concurrency cap has room; callers check `available_permits` (surfaced via
/// `try_add_task`) before claiming more work from the dispatcher.
pub struct TaskQueue {
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<()>,
    closed: bool,
}

impl TaskQueue {
    pub fn new(concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            tasks: JoinSet::new(),
            closed: false,
        }
    }

    /// Current in-flight task count.
    pub fn current(&self) -> usize {
        self.tasks.len()
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Tunable at runtime (§4.8 `setConcurrency`); already-running tasks are not
    /// preempted by a lowered cap.
    pub fn set_concurrency(&mut self, concurrency: usize) {
        let current = self.semaphore.available_permits();
        if concurrency > current {
            self.semaphore.add_permits(concurrency - current);
        }
        // Shrinking takes effect as permits are returned by finishing tasks; we
        // never forcibly reclaim a permit already handed to a running task.
    }

    /// Enqueue a task. Returns immediately; `on_complete` runs on this task's own
    /// completion, never inline. Rejects new tasks once `quit()` was called.
    pub fn add_task<F>(
        &mut self,
        handler: Arc<dyn RegisteredFn>,
        args: PackedBytes,
        on_complete: F,
    ) -> Result<(), &'static str>
    where
        F: FnOnce(TaskOutcome) + Send + 'static,
    {
        if self.closed {
            return Err("task queue is closed");
        }

        let permit = match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => return Err("concurrency cap reached"),
            Err(TryAcquireError::Closed) => return Err("task queue is closed"),
        };

        self.tasks.spawn(async move {
            let start = Instant::now();
            let outcome = match handler.call(args).await {
                Ok(content) => TaskOutcome::Resolution {
                    content,
                    function_execution_time_ms: start.elapsed().as_millis() as i64,
                },
                Err(content) => TaskOutcome::Rejection {
                    content,
                    function_execution_time_ms: start.elapsed().as_millis() as i64,
                },
            };
            drop(permit);
            on_complete(outcome);
        });

        Ok(())
    }

    /// Mark closed, reject new tasks, and await all in-flight completions.
    pub async fn quit(&mut self) {
        self.closed = true;
        self.semaphore.close();
        while self.tasks.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn succeed(args: PackedBytes) -> Result<PackedBytes, PackedBytes> {
        Ok(args)
    }

    async fn fail(_args: PackedBytes) -> Result<PackedBytes, PackedBytes> {
        Err(PackedBytes(b"boom".to_vec()))
    }

    #[tokio::test]
    async fn successful_task_delivers_resolution() {
        let mut queue = TaskQueue::new(2);
        let delivered = Arc::new(std::sync::Mutex::new(None));
        let delivered_clone = delivered.clone();

        queue
            .add_task(Arc::new(succeed), PackedBytes(b"hi".to_vec()), move |outcome| {
                *delivered_clone.lock().unwrap() = Some(outcome);
            })
            .unwrap();
        queue.quit().await;

        match delivered.lock().unwrap().take().unwrap() {
            TaskOutcome::Resolution { content, .. } => assert_eq!(content.0, b"hi"),
            TaskOutcome::Rejection { .. } => panic!("expected resolution"),
        }
    }

    #[tokio::test]
    async fn failing_task_delivers_rejection_not_a_panic() {
        let mut queue = TaskQueue::new(2);
        let delivered = Arc::new(AtomicBool::new(false));
        let delivered_clone = delivered.clone();

        queue
            .add_task(Arc::new(fail), PackedBytes::default(), move |outcome| {
                assert!(matches!(outcome, TaskOutcome::Rejection { .. }));
                delivered_clone.store(true, Ordering::SeqCst);
            })
            .unwrap();
        queue.quit().await;

        assert!(delivered.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn concurrency_cap_is_enforced() {
        let mut queue = TaskQueue::new(1);
        queue
            .add_task(Arc::new(succeed), PackedBytes::default(), |_| {})
            .unwrap();
        let second = queue.add_task(Arc::new(succeed), PackedBytes::default(), |_| {});
        assert!(second.is_err());
        queue.quit().await;
    }

    #[tokio::test]
    async fn queue_rejects_tasks_after_quit() {
        let mut queue = TaskQueue::new(2);
        queue.quit().await;
        let result = queue.add_task(Arc::new(succeed), PackedBytes::default(), |_| {});
        assert!(result.is_err());
    }
}
