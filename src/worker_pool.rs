//! # Async Task Pool
//!
//! A fixed set of `may` coroutines that run the deferred half of
//! asynchronous exchanges (transmit, receive, complete the future).
//!
//! - **Unbounded FIFO**: tasks go through one `may::sync::mpsc` channel;
//!   every worker shares the receiver, so under saturation tasks wait in
//!   submission order and nothing is rejected
//! - **Panic isolation**: a panicking task is logged and the worker keeps going
//! - **Shutdown**: dropping the pool drops the sender; workers drain the
//!   queue and exit. Coroutines never keep the process alive
//! - **Metrics**: submitted, completed and approximate queue depth
//!
//! Sizing comes from [`DispatchConfig`]: `WSD_ASYNC_WORKERS` and `WSD_STACK_SIZE`.

use crate::error::DispatchError;
use crate::runtime_config::DispatchConfig;
use may::sync::mpsc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Unit of work run by a pool coroutine.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Counters for one pool.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
    queue_depth: AtomicUsize,
}

impl PoolMetrics {
    fn record_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    fn undo_submit(&self) {
        self.submitted.fetch_sub(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Tasks that panicked; also counted as completed.
    #[must_use]
    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Tasks queued or running.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }
}

/// Worker pool for deferred exchange work.
pub struct AsyncTaskPool {
    sender: mpsc::Sender<Task>,
    metrics: Arc<PoolMetrics>,
    workers: usize,
}

impl AsyncTaskPool {
    /// Spawn `config.async_workers` coroutines.
    ///
    /// Fails only when no worker could be spawned at all.
    pub fn new(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let (tx, rx) = mpsc::channel::<Task>();
        let rx = Arc::new(rx);
        let metrics = Arc::new(PoolMetrics::default());

        info!(
            workers = config.async_workers,
            stack_size = config.stack_size,
            "Creating async task pool"
        );

        let mut spawned = 0;
        for worker_id in 0..config.async_workers {
            let rx = Arc::clone(&rx);
            let metrics = Arc::clone(&metrics);
            // SAFETY: workers only touch data moved into the closure (a shared
            // receiver and metrics) and never hold thread-local state across
            // yields, which is what may requires of spawned coroutines.
            let spawn_result = unsafe {
                may::coroutine::Builder::new()
                    .name(format!("wsd-async-{worker_id}"))
                    .stack_size(config.stack_size)
                    .spawn(move || worker_loop(worker_id, &rx, &metrics))
            };
            match spawn_result {
                Ok(_) => spawned += 1,
                Err(e) => error!(worker_id, error = %e, "Failed to spawn async worker"),
            }
        }

        if spawned == 0 {
            return Err(DispatchError::PoolUnavailable(
                "no async worker could be spawned".into(),
            ));
        }

        Ok(Self {
            sender: tx,
            metrics,
            workers: spawned,
        })
    }

    /// Queue a task. Fails only when every worker has exited.
    pub fn submit(&self, task: Task) -> Result<(), DispatchError> {
        self.metrics.record_submit();
        if let Err(e) = self.sender.send(task) {
            self.metrics.undo_submit();
            error!(error = %e, "Async task pool channel disconnected");
            return Err(DispatchError::PoolUnavailable(
                "async workers are not running".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl std::fmt::Debug for AsyncTaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncTaskPool")
            .field("workers", &self.workers)
            .field("metrics", &self.metrics)
            .finish()
    }
}

fn worker_loop(worker_id: usize, rx: &mpsc::Receiver<Task>, metrics: &PoolMetrics) {
    debug!(worker_id, "Async worker started");
    while let Ok(task) = rx.recv() {
        if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
            metrics.panicked.fetch_add(1, Ordering::Relaxed);
            error!(worker_id, panic_message = ?panic, "Async task panicked");
        }
        metrics.record_completion();
    }
    debug!(worker_id, "Async worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(workers: usize) -> DispatchConfig {
        DispatchConfig {
            async_workers: workers,
            ..DispatchConfig::default()
        }
    }

    #[test]
    fn test_tasks_run_and_are_counted() {
        let pool = AsyncTaskPool::new(&config(2)).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = mpsc::channel();
        for _ in 0..10 {
            let hits = Arc::clone(&hits);
            let done_tx = done_tx.clone();
            pool.submit(Box::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
                let _ = done_tx.send(());
            }))
            .unwrap();
        }
        for _ in 0..10 {
            done_rx.recv().unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 10);
        assert_eq!(pool.metrics().submitted(), 10);
        assert_eq!(pool.workers(), 2);
    }

    #[test]
    fn test_single_worker_keeps_fifo_order() {
        let pool = AsyncTaskPool::new(&config(1)).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                let _ = tx.send(i);
            }))
            .unwrap();
        }
        let order: Vec<i32> = (0..5).map(|_| rx.recv().unwrap()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = AsyncTaskPool::new(&config(1)).unwrap();
        pool.submit(Box::new(|| panic!("boom"))).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.submit(Box::new(move || {
            let _ = tx.send(42);
        }))
        .unwrap();
        assert_eq!(rx.recv().unwrap(), 42);
        assert_eq!(pool.metrics().panicked(), 1);
    }
}
