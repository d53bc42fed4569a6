//! Delayed, cancellable and repeating callbacks.
//!
//! The failure detector relies on replacing the pending "declare partitioned"
//! timer on every heartbeat. A timer that merely sleeps and then acts would
//! stack up one extra partition per heartbeat; here every timer is tracked by
//! a [`TimerHandle`] and cancelling it guarantees the callback never runs.
//!
//! # Architecture
//!
//! ```text
//! after(delay, f) ──► spawn_task: sleep(delay) ──► claim id in table? ──► f()
//!                                                       │ no (cancelled)
//!                                                       ▼
//!                                                     return
//! cancel(handle) ──► remove id from table + abort task
//! ```
//!
//! A callback runs only if it can still remove its own id from the table, so
//! a `cancel` that happens after the delay elapsed but before the task is
//! polled still wins.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::providers::Providers;
use crate::task::TaskProvider;
use crate::time::TimeProvider;

/// Identifies a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

type TimerTable = RefCell<HashMap<u64, JoinHandle<()>>>;

/// Schedules callbacks on the local task set.
///
/// Callbacks of one scheduler run on the current thread, one at a time.
/// Dropping the scheduler aborts every timer it still owns.
pub struct Scheduler<P: Providers> {
    time: P::Time,
    task: P::Task,
    timers: Rc<TimerTable>,
    next_id: Cell<u64>,
}

impl<P: Providers> Scheduler<P> {
    /// Create a scheduler using the bundle's time and task providers.
    pub fn new(providers: &P) -> Self {
        Self {
            time: providers.time().clone(),
            task: providers.task().clone(),
            timers: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(1),
        }
    }

    fn allocate(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Run `callback` once after `delay`, unless cancelled first.
    pub fn after<F>(&self, delay: Duration, callback: F) -> TimerHandle
    where
        F: FnOnce() + 'static,
    {
        let id = self.allocate();
        let timers = Rc::downgrade(&self.timers);
        let time = self.time.clone();

        let handle = self.task.spawn_task("scheduler_after", async move {
            time.sleep(delay).await;
            if claim(&timers, id) {
                tracing::trace!(timer = id, "scheduler: timer fired");
                callback();
            }
        });
        self.timers.borrow_mut().insert(id, handle);
        TimerHandle(id)
    }

    /// Run `callback` every `period` until it returns `Break` or the handle
    /// is cancelled. The first run happens one `period` from now.
    pub fn every<F>(&self, period: Duration, mut callback: F) -> TimerHandle
    where
        F: FnMut() -> ControlFlow<()> + 'static,
    {
        let id = self.allocate();
        let timers = Rc::downgrade(&self.timers);
        let time = self.time.clone();

        let handle = self.task.spawn_task("scheduler_every", async move {
            loop {
                time.sleep(period).await;
                let live = timers.upgrade().is_some_and(|table| {
                    let pending = table.borrow().contains_key(&id);
                    pending
                });
                if !live {
                    return;
                }
                if callback().is_break() {
                    claim(&timers, id);
                    tracing::trace!(timer = id, "scheduler: repeating timer stopped");
                    return;
                }
            }
        });
        self.timers.borrow_mut().insert(id, handle);
        TimerHandle(id)
    }

    /// Cancel a timer. Returns whether it was still pending.
    ///
    /// Cancelling a fired or already cancelled timer is a no-op.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        // Release the table borrow before aborting.
        let entry = self.timers.borrow_mut().remove(&handle.0);
        match entry {
            Some(task) => {
                task.abort();
                tracing::trace!(timer = handle.0, "scheduler: timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether the timer has neither fired nor been cancelled.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.timers.borrow().contains_key(&handle.0)
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending_count(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Cancel every pending timer.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.timers.borrow_mut().drain().collect();
        for (_, task) in drained {
            task.abort();
        }
    }
}

impl<P: Providers> Drop for Scheduler<P> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Remove `id` from the table; true if this call removed it.
fn claim(timers: &Weak<TimerTable>, id: u64) -> bool {
    timers.upgrade().is_some_and(|table| {
        let removed = table.borrow_mut().remove(&id);
        removed.is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TokioProviders;
    use crate::transport::MemoryTransport;
    use tokio::task::LocalSet;
    use tokio::time::sleep;

    fn scheduler() -> Scheduler<TokioProviders<MemoryTransport>> {
        Scheduler::new(&TokioProviders::memory(MemoryTransport::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_after_fires_once() {
        LocalSet::new()
            .run_until(async {
                let scheduler = scheduler();
                let fired = Rc::new(Cell::new(0));
                let counter = fired.clone();
                let handle = scheduler.after(Duration::from_millis(100), move || {
                    counter.set(counter.get() + 1);
                });

                sleep(Duration::from_millis(99)).await;
                assert_eq!(fired.get(), 0);
                assert!(scheduler.is_pending(handle));

                sleep(Duration::from_millis(2)).await;
                assert_eq!(fired.get(), 1);
                assert!(!scheduler.is_pending(handle));

                sleep(Duration::from_secs(1)).await;
                assert_eq!(fired.get(), 1);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_callback() {
        LocalSet::new()
            .run_until(async {
                let scheduler = scheduler();
                let fired = Rc::new(Cell::new(false));
                let flag = fired.clone();
                let handle = scheduler.after(Duration::from_millis(100), move || flag.set(true));

                sleep(Duration::from_millis(50)).await;
                assert!(scheduler.cancel(handle));
                // Idempotent
                assert!(!scheduler.cancel(handle));

                sleep(Duration::from_millis(200)).await;
                assert!(!fired.get());
                assert_eq!(scheduler.pending_count(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_is_noop() {
        LocalSet::new()
            .run_until(async {
                let scheduler = scheduler();
                let handle = scheduler.after(Duration::from_millis(10), || {});
                sleep(Duration::from_millis(20)).await;
                assert!(!scheduler.cancel(handle));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_until_break() {
        LocalSet::new()
            .run_until(async {
                let scheduler = scheduler();
                let runs = Rc::new(Cell::new(0));
                let counter = runs.clone();
                let handle = scheduler.every(Duration::from_millis(100), move || {
                    counter.set(counter.get() + 1);
                    if counter.get() == 3 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                });

                sleep(Duration::from_millis(250)).await;
                assert_eq!(runs.get(), 2);
                assert!(scheduler.is_pending(handle));

                sleep(Duration::from_secs(1)).await;
                assert_eq!(runs.get(), 3);
                assert!(!scheduler.is_pending(handle));
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_stops_on_cancel() {
        LocalSet::new()
            .run_until(async {
                let scheduler = scheduler();
                let runs = Rc::new(Cell::new(0));
                let counter = runs.clone();
                let handle = scheduler.every(Duration::from_millis(100), move || {
                    counter.set(counter.get() + 1);
                    ControlFlow::Continue(())
                });

                sleep(Duration::from_millis(350)).await;
                assert_eq!(runs.get(), 3);
                scheduler.cancel(handle);

                sleep(Duration::from_secs(1)).await;
                assert_eq!(runs.get(), 3);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_timers() {
        LocalSet::new()
            .run_until(async {
                let scheduler = scheduler();
                let fired = Rc::new(Cell::new(false));
                let flag = fired.clone();
                scheduler.after(Duration::from_millis(10), move || flag.set(true));
                drop(scheduler);

                sleep(Duration::from_millis(50)).await;
                assert!(!fired.get());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_can_reschedule() {
        LocalSet::new()
            .run_until(async {
                let scheduler = Rc::new(scheduler());
                let fired = Rc::new(Cell::new(0));

                let inner = scheduler.clone();
                let counter = fired.clone();
                scheduler.after(Duration::from_millis(10), move || {
                    counter.set(counter.get() + 1);
                    let counter = counter.clone();
                    inner.after(Duration::from_millis(10), move || {
                        counter.set(counter.get() + 1);
                    });
                });

                sleep(Duration::from_millis(25)).await;
                assert_eq!(fired.get(), 2);
            })
            .await;
    }
}
