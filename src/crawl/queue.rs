// src/crawl/queue.rs
// =============================================================================
// A bounded-concurrency job queue with a "wait until everything is done"
// barrier.
//
// How it works:
// - add() bumps a pending counter and spawns the job onto tokio right away;
//   the job then waits for a semaphore permit before doing any work, so at
//   most `limit` jobs run at once
// - when a job finishes (or panics) a guard decrements the counter and, if
//   it reached zero, wakes everyone waiting in drain()
// - drain() returns once the counter is zero, including jobs that were added
//   by other jobs while the queue was running
//
// The counter is bumped before the spawn, so drain() cannot observe zero
// while a freshly added job is still on its way to the runtime.
//
// Rust concepts:
// - Arc: shared ownership between the queue handle and every spawned task
// - Semaphore: limits how many jobs hold a permit at the same time
// - Notify: lets drain() sleep until the last job wakes it
// - Drop guard: code that runs however the job ends, even on panic
// =============================================================================

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Cloneable handle to a bounded job queue
#[derive(Clone)]
pub struct FetchQueue {
    inner: Arc<Inner>,
}

struct Inner {
    permits: Semaphore,
    pending: AtomicUsize,
    idle: Notify,
}

// Marks one job as finished when dropped
struct PendingGuard(Arc<Inner>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl FetchQueue {
    /// Creates a queue that runs at most `limit` jobs concurrently
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                permits: Semaphore::new(limit.max(1)),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    /// Enqueues a job without waiting for it to start
    pub fn add<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(&self.inner));

        tokio::spawn(async move {
            // The semaphore is never closed; if acquire fails anyway the job
            // is dropped and still counted as finished.
            let Ok(_permit) = guard.0.permits.acquire().await else {
                return;
            };
            job.await;
        });
    }

    /// Number of jobs added but not yet finished
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Waits until every added job has finished
    pub async fn drain(&self) {
        loop {
            // Register interest before checking the counter so a wake-up
            // between the check and the await is not lost.
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }

            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drain_on_empty_queue_returns() {
        let queue = FetchQueue::new(2);
        queue.drain().await;
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_runs_every_job() {
        let queue = FetchQueue::new(4);
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..20 {
            let done = Arc::clone(&done);
            queue.add(async move {
                tokio::time::sleep(Duration::from_millis(i % 5)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }

        queue.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let queue = FetchQueue::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..12 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            queue.add(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        queue.drain().await;
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_jobs_added_by_jobs() {
        let queue = FetchQueue::new(2);
        let done = Arc::new(AtomicUsize::new(0));

        let inner_queue = queue.clone();
        let inner_done = Arc::clone(&done);
        queue.add(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let done = Arc::clone(&inner_done);
            inner_queue.add(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
            inner_done.fetch_add(1, Ordering::SeqCst);
        });

        queue.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_block_drain() {
        let queue = FetchQueue::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        queue.add(async {
            panic!("job failed");
        });
        let after = Arc::clone(&done);
        queue.add(async move {
            after.fetch_add(1, Ordering::SeqCst);
        });

        queue.drain().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
