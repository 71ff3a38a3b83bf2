/*!
 * Tasklet Backend (cooperative ULT, handle-based)
 *
 * Mutexes and conditions are runtime objects created on demand; blocking
 * never parks the kernel thread, it yields the current task until the
 * resource becomes available.
 *
 * The condition keeps an explicit FIFO of waiter tickets. A waiter enqueues
 * its ticket before releasing the mutex, so a signal issued once the mutex
 * is free always finds it.
 */

use super::super::spinlock::SpinLock;
use super::super::spinwait::Backoff;
use super::super::traits::{Backend, RawCondition, RawMutex, TryLock};
use super::coop::{self, Runtime};
use super::owner::Ownership;
use crate::core::context;
use crate::core::errors::{SyncError, SyncResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static RUNTIME: Runtime = Runtime::new("tasklet");

/// Tasklet backend marker
#[derive(Debug, Clone, Copy, Default)]
pub struct Tasklet;

impl Backend for Tasklet {
    const NAME: &'static str = "tasklet";
    const COOPERATIVE: bool = true;

    type Mutex = TaskletMutex;
    type Condition = TaskletCondition;

    #[inline]
    fn ensure_init() {
        RUNTIME.ensure_init();
    }

    #[inline]
    fn yield_now() {
        coop::yield_now();
    }
}

/// Native tasklet mutex
pub struct TaskletMutex {
    locked: AtomicBool,
    ownership: Ownership,
}

impl TaskletMutex {
    #[inline]
    fn try_acquire_word(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn acquire_word(&self) {
        let mut backoff = Backoff::new();
        while !self.try_acquire_word() {
            backoff.snooze::<Tasklet>();
        }
    }

    fn release_word(&self) -> SyncResult<()> {
        if self.locked.swap(false, Ordering::Release) {
            Ok(())
        } else {
            Err(SyncError::Substrate {
                backend: Tasklet::NAME,
                op: "mutex_unlock",
                code: 1,
            })
        }
    }
}

impl RawMutex for TaskletMutex {
    fn new(recursive: bool) -> Self {
        Tasklet::ensure_init();
        Self {
            locked: AtomicBool::new(false),
            ownership: Ownership::new(recursive),
        }
    }

    fn lock(&self) -> SyncResult<()> {
        let me = context::current();
        if let Some(result) = self.ownership.reenter(me) {
            return result;
        }
        self.acquire_word();
        self.ownership.acquired(me);
        Ok(())
    }

    fn try_lock(&self) -> SyncResult<TryLock> {
        let me = context::current();
        if let Some(result) = self.ownership.try_reenter(me) {
            return Ok(result);
        }
        if self.try_acquire_word() {
            self.ownership.acquired(me);
            Ok(TryLock::Acquired)
        } else {
            Ok(TryLock::Busy)
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        let me = context::current();
        if self.ownership.release(me)? {
            self.release_word()?;
        }
        Ok(())
    }

    #[inline]
    fn is_owned_by_current(&self) -> bool {
        self.ownership.held_by(context::current())
    }
}

/// Native tasklet condition variable
pub struct TaskletCondition {
    waiters: SpinLock<VecDeque<Arc<AtomicBool>>>,
}

impl TaskletCondition {
    #[inline]
    fn wake(ticket: Arc<AtomicBool>) {
        ticket.store(true, Ordering::Release);
    }
}

impl RawCondition<TaskletMutex> for TaskletCondition {
    fn new() -> Self {
        Tasklet::ensure_init();
        Self {
            waiters: SpinLock::new(VecDeque::new()),
        }
    }

    fn wait(&self, mutex: &TaskletMutex) -> SyncResult<()> {
        let me = context::current();
        let depth = mutex.ownership.suspend(me)?;

        let ticket = Arc::new(AtomicBool::new(false));
        self.waiters.lock().push_back(ticket.clone());

        let released = mutex.release_word();
        if released.is_ok() {
            while !ticket.load(Ordering::Acquire) {
                Tasklet::yield_now();
            }
        }

        mutex.acquire_word();
        mutex.ownership.resume(me, depth);
        released
    }

    fn signal(&self) -> SyncResult<()> {
        let ticket = self.waiters.lock().pop_front();
        if let Some(ticket) = ticket {
            Self::wake(ticket);
        }
        Ok(())
    }

    fn broadcast(&self) -> SyncResult<()> {
        let tickets: Vec<_> = self.waiters.lock().drain(..).collect();
        for ticket in tickets {
            Self::wake(ticket);
        }
        Ok(())
    }
}
