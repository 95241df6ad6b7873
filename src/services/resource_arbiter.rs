//! Concurrency and memory arbitration for in-flight targets.
//!
//! Grounded in the teacher's `ResourceMonitor` (shared `RwLock` state plus a
//! broadcast of status changes), adapted from passive monitoring to active
//! admission control: callers request a reservation and either get one
//! before their deadline or receive a soft failure — never an exception —
//! so the scheduler can simply try the next ready target instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};

use crate::domain::models::sequence::ResourceUsage;

/// Returned when a reservation could not be granted before its deadline.
/// Not an error in the `Result` sense — the caller is expected to treat
/// this as "try again later", not as a fatal condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationTimedOut;

/// Held while a target is in flight. Releases its concurrency slot and
/// memory reservation on drop.
pub struct ResourceGuard {
    _permit: Option<OwnedSemaphorePermit>,
    memory_bytes: u64,
    reserved: Arc<Mutex<u64>>,
    notify: Arc<Notify>,
    in_progress: Arc<AtomicUsize>,
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.in_progress.fetch_sub(1, Ordering::SeqCst);
        let reserved = Arc::clone(&self.reserved);
        let notify = Arc::clone(&self.notify);
        let memory_bytes = self.memory_bytes;
        tokio::spawn(async move {
            let mut guard = reserved.lock().await;
            *guard = guard.saturating_sub(memory_bytes);
            drop(guard);
            notify.notify_waiters();
        });
    }
}

/// Admission controller for target execution: a concurrency cap plus a
/// soft memory budget.
pub struct ResourceArbiter {
    concurrency: Option<Arc<Semaphore>>,
    max_concurrent_targets: u32,
    memory_limit_bytes: u64,
    reserved_memory_bytes: Arc<Mutex<u64>>,
    notify: Arc<Notify>,
    in_progress: Arc<AtomicUsize>,
}

impl ResourceArbiter {
    /// `max_concurrent_targets == 0` means unlimited (Open Question
    /// default); `memory_limit_bytes == 0` means no memory cap enforced.
    pub fn new(max_concurrent_targets: u32, memory_limit_bytes: u64) -> Self {
        let concurrency = if max_concurrent_targets == 0 {
            None
        } else {
            Some(Arc::new(Semaphore::new(max_concurrent_targets as usize)))
        };
        Self {
            concurrency,
            max_concurrent_targets,
            memory_limit_bytes,
            reserved_memory_bytes: Arc::new(Mutex::new(0)),
            notify: Arc::new(Notify::new()),
            in_progress: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reserve one concurrency slot and `memory_bytes` of the memory
    /// budget, waiting up to `deadline` for both to become available.
    /// Returns `Err(ReservationTimedOut)` — not a panic or propagated
    /// error — if the deadline elapses first.
    pub async fn reserve(
        &self,
        memory_bytes: u64,
        deadline: Duration,
    ) -> Result<ResourceGuard, ReservationTimedOut> {
        let started = tokio::time::Instant::now();

        let permit = match &self.concurrency {
            Some(sem) => {
                match tokio::time::timeout(deadline, Arc::clone(sem).acquire_owned()).await {
                    Ok(Ok(permit)) => Some(permit),
                    _ => return Err(ReservationTimedOut),
                }
            }
            None => None,
        };

        loop {
            {
                let mut reserved = self.reserved_memory_bytes.lock().await;
                let fits = self.memory_limit_bytes == 0
                    || *reserved + memory_bytes <= self.memory_limit_bytes;
                if fits {
                    *reserved += memory_bytes;
                    self.in_progress.fetch_add(1, Ordering::SeqCst);
                    return Ok(ResourceGuard {
                        _permit: permit,
                        memory_bytes,
                        reserved: Arc::clone(&self.reserved_memory_bytes),
                        notify: Arc::clone(&self.notify),
                        in_progress: Arc::clone(&self.in_progress),
                    });
                }
            }

            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Err(ReservationTimedOut);
            }
            let remaining = deadline - elapsed;
            if tokio::time::timeout(remaining, self.notify.notified()).await.is_err() {
                return Err(ReservationTimedOut);
            }
        }
    }

    pub async fn current_usage(&self) -> ResourceUsage {
        let reserved = *self.reserved_memory_bytes.lock().await;
        ResourceUsage {
            reserved_memory_bytes: reserved,
            memory_limit_bytes: self.memory_limit_bytes,
            in_progress_targets: self.in_progress.load(Ordering::SeqCst) as u32,
            max_concurrent_targets: self.max_concurrent_targets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_concurrency_never_blocks_on_slots() {
        let arbiter = ResourceArbiter::new(0, 0);
        let g1 = arbiter.reserve(0, Duration::from_millis(50)).await.unwrap();
        let g2 = arbiter.reserve(0, Duration::from_millis(50)).await.unwrap();
        drop(g1);
        drop(g2);
    }

    #[tokio::test]
    async fn concurrency_cap_blocks_until_release() {
        let arbiter = ResourceArbiter::new(1, 0);
        let guard = arbiter.reserve(0, Duration::from_millis(50)).await.unwrap();
        let result = arbiter.reserve(0, Duration::from_millis(50)).await;
        assert!(result.is_err());
        drop(guard);
        // A fresh reservation succeeds once the slot is returned to the pool.
        let result = arbiter.reserve(0, Duration::from_millis(200)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn memory_budget_rejects_oversized_reservation() {
        let arbiter = ResourceArbiter::new(0, 1024);
        let result = arbiter.reserve(2048, Duration::from_millis(20)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn usage_reflects_in_progress_count() {
        let arbiter = ResourceArbiter::new(4, 0);
        let usage_before = arbiter.current_usage().await;
        assert_eq!(usage_before.in_progress_targets, 0);
        let _guard = arbiter.reserve(0, Duration::from_millis(50)).await.unwrap();
        let usage_after = arbiter.current_usage().await;
        assert_eq!(usage_after.in_progress_targets, 1);
    }
}
