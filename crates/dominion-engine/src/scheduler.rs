//! Deferred execution with cancellable handles.
//!
//! The only time-deferred work in the engine is the warmup-teleport
//! completion and the periodic decay/maintenance ticks. Both go through
//! the [`Scheduler`] trait: `schedule(delay, task)` returns a
//! [`TaskHandle`]; `cancel` is idempotent and safe after the task has
//! already fired (the task then simply never runs again -- a fired task
//! ignores a late cancel, a cancelled task is skipped at fire time).
//!
//! Production uses [`TokioScheduler`] (spawn + sleep). Tests use
//! [`ManualScheduler`], which holds tasks until [`fire_due`] is called,
//! making warmup expiry fully deterministic alongside [`ManualClock`].
//!
//! [`fire_due`]: ManualScheduler::fire_due
//! [`ManualClock`]: crate::clock::ManualClock

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dominion_types::Timestamp;

use crate::clock::Clock;

/// A deferred task.
pub type Task = Box<dyn FnOnce() + Send>;

/// Cancellation handle for one scheduled task.
///
/// Cloneable; all clones cancel the same task. Cancelling twice, or after
/// the task fired, is a no-op.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Create a live (uncancelled) handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the task cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Schedules tasks for later execution.
pub trait Scheduler: Send + Sync {
    /// Run `task` after `delay_ms` milliseconds, unless cancelled first.
    fn schedule(&self, delay_ms: u64, task: Task) -> TaskHandle;

    /// Cancel a scheduled task. Idempotent; a no-op once the task fired.
    fn cancel(&self, handle: &TaskHandle) {
        handle.cancel();
    }
}

/// Scheduler backed by the tokio runtime.
///
/// Must be constructed (and its tasks scheduled) inside a runtime; the
/// spawned future sleeps for the delay and then runs the task unless the
/// handle was cancelled in the meantime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay_ms: u64, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let flag = handle.clone();
        drop(tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            if !flag.is_cancelled() {
                task();
            }
        }));
        handle
    }
}

/// One queued task in the manual scheduler.
struct QueuedTask {
    fire_at: Timestamp,
    handle: TaskHandle,
    task: Task,
}

/// Deterministic scheduler for tests: tasks queue until [`fire_due`] runs
/// everything whose fire time has been reached on the shared clock.
///
/// [`fire_due`]: Self::fire_due
pub struct ManualScheduler {
    clock: Arc<dyn Clock>,
    queue: Mutex<Vec<QueuedTask>>,
}

impl core::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("queued", &self.lock_queue().len())
            .finish_non_exhaustive()
    }
}

impl ManualScheduler {
    /// Create a scheduler reading fire times from the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Run all due, uncancelled tasks. Returns how many ran.
    pub fn fire_due(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<QueuedTask> = {
            let mut queue = self.lock_queue();
            let mut kept = Vec::new();
            let mut due = Vec::new();
            for queued in queue.drain(..) {
                if queued.handle.is_cancelled() {
                    continue;
                }
                if now >= queued.fire_at {
                    due.push(queued);
                } else {
                    kept.push(queued);
                }
            }
            *queue = kept;
            due
        };
        let count = due.len();
        for queued in due {
            (queued.task)();
        }
        count
    }

    /// Number of queued (not yet fired, not yet swept) tasks.
    pub fn pending(&self) -> usize {
        self.lock_queue().len()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, Vec<QueuedTask>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay_ms: u64, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let fire_at = self.clock.now().saturating_add_millis(delay_ms);
        self.lock_queue().push(QueuedTask {
            fire_at,
            handle: handle.clone(),
            task,
        });
        handle
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::atomic::AtomicU32;

    fn setup() -> (Arc<ManualClock>, ManualScheduler) {
        let clock = Arc::new(ManualClock::default());
        let scheduler = ManualScheduler::new(Arc::clone(&clock) as Arc<dyn Clock>);
        (clock, scheduler)
    }

    #[test]
    fn fires_only_once_due() {
        let (clock, scheduler) = setup();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        scheduler.schedule(1000, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(scheduler.fire_due(), 0);
        clock.advance(999);
        assert_eq!(scheduler.fire_due(), 0);
        clock.advance(1);
        assert_eq!(scheduler.fire_due(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Fired tasks are gone; nothing fires twice.
        assert_eq!(scheduler.fire_due(), 0);
    }

    #[test]
    fn cancel_before_fire_skips_task() {
        let (clock, scheduler) = setup();
        let fired = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&fired);
        let handle = scheduler.schedule(1000, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        scheduler.cancel(&handle);
        clock.advance(2000);
        assert_eq!(scheduler.fire_due(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancel_is_idempotent_and_safe_after_fire() {
        let (clock, scheduler) = setup();
        let handle = scheduler.schedule(10, Box::new(|| {}));
        clock.advance(10);
        assert_eq!(scheduler.fire_due(), 1);
        // Late and repeated cancels are harmless.
        scheduler.cancel(&handle);
        scheduler.cancel(&handle);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn tokio_scheduler_fires_and_cancels() {
        let scheduler = TokioScheduler;
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        scheduler.schedule(5, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let counter = Arc::clone(&fired);
        let handle = scheduler.schedule(5, Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        scheduler.cancel(&handle);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
