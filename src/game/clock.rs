//! Time and task plumbing for the sync pipeline.
//!
//! The store never touches `setTimeout` or `Date.now()` directly. It asks a
//! `Clock` for the time and for sleep futures, and hands background work to
//! a `Spawner`. The browser build wires these to gloo timers and
//! `spawn_local`; tests use `ManualClock` on a `LocalPool`, where time only
//! moves when the test calls `advance`.

use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

pub trait Clock {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Resolves once `ms` milliseconds have passed.
    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()>;
}

/// Runs detached, single-threaded background tasks.
pub trait Spawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

impl Spawner for futures::executor::LocalSpawner {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        if let Err(e) = self.spawn_local(task) {
            tracing::warn!(error = %e, "executor refused background task");
        }
    }
}

// ── Manual clock ───────────────────────────────────────────────────

#[derive(Default)]
struct ManualInner {
    now: Cell<u64>,
    next_id: Cell<u64>,
    sleepers: RefCell<Vec<Sleeper>>,
}

struct Sleeper {
    id: u64,
    deadline: u64,
    waker: Waker,
}

/// Deterministic clock: sleeps complete only when `advance` moves time past
/// their deadline.
#[derive(Clone, Default)]
pub struct ManualClock {
    inner: Rc<ManualInner>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        let clock = Self::default();
        clock.inner.now.set(start_ms);
        clock
    }

    /// Move time forward and wake every sleeper whose deadline has passed.
    pub fn advance(&self, ms: u64) {
        let now = self.inner.now.get() + ms;
        self.inner.now.set(now);
        let due: Vec<Waker> = {
            let mut sleepers = self.inner.sleepers.borrow_mut();
            let (due, pending): (Vec<_>, Vec<_>) = sleepers.drain(..).partition(|s| s.deadline <= now);
            *sleepers = pending;
            due.into_iter().map(|s| s.waker).collect()
        };
        for waker in due {
            waker.wake();
        }
    }

    /// Number of sleeps still waiting on this clock.
    pub fn pending_sleeps(&self) -> usize {
        self.inner.sleepers.borrow().len()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.inner.now.get()
    }

    fn sleep(&self, ms: u64) -> LocalBoxFuture<'static, ()> {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        Box::pin(ManualSleep {
            id,
            clock: self.inner.clone(),
            deadline: self.inner.now.get() + ms,
            registered: false,
        })
    }
}

struct ManualSleep {
    id: u64,
    clock: Rc<ManualInner>,
    deadline: u64,
    registered: bool,
}

impl Future for ManualSleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.clock.now.get() >= self.deadline {
            return Poll::Ready(());
        }
        if !self.registered {
            let sleeper = Sleeper {
                id: self.id,
                deadline: self.deadline,
                waker: cx.waker().clone(),
            };
            self.clock.sleepers.borrow_mut().push(sleeper);
            self.registered = true;
        }
        Poll::Pending
    }
}

impl Drop for ManualSleep {
    fn drop(&mut self) {
        // A dropped sleep (the losing side of a race) leaves no sleeper behind.
        if self.registered {
            let id = self.id;
            self.clock.sleepers.borrow_mut().retain(|s| s.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;

    #[test]
    fn sleep_completes_only_after_advance() {
        let clock = ManualClock::new(1_000);
        let done = Rc::new(Cell::new(false));
        let mut pool = LocalPool::new();

        let flag = done.clone();
        let sleep = clock.sleep(500);
        pool.spawner().spawn(Box::pin(async move {
            sleep.await;
            flag.set(true);
        }));

        pool.run_until_stalled();
        assert!(!done.get());
        assert_eq!(clock.pending_sleeps(), 1);

        clock.advance(499);
        pool.run_until_stalled();
        assert!(!done.get());

        clock.advance(1);
        pool.run_until_stalled();
        assert!(done.get());
        assert_eq!(clock.now_ms(), 1_500);
        assert_eq!(clock.pending_sleeps(), 0);
    }

    #[test]
    fn zero_sleep_is_immediately_ready() {
        let clock = ManualClock::new(0);
        futures::executor::block_on(clock.sleep(0));
    }

    #[test]
    fn dropped_sleep_deregisters() {
        let clock = ManualClock::new(0);
        futures::executor::block_on(async {
            let mut first = clock.sleep(100);
            let mut second = clock.sleep(100);
            assert!(futures::poll!(&mut first).is_pending());
            assert!(futures::poll!(&mut second).is_pending());
            assert_eq!(clock.pending_sleeps(), 2);
            drop(first);
            assert_eq!(clock.pending_sleeps(), 1);
            drop(second);
        });
        assert_eq!(clock.pending_sleeps(), 0);
    }
}
