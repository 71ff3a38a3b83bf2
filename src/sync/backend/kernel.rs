/*!
 * Kernel-Thread Backend
 *
 * Native primitives for preemptive kernel threads. Contended locks and
 * condition waits park the OS thread.
 *
 * # Design
 *
 * The mutex is a `parking_lot::RawMutex` plus owner bookkeeping. The
 * condition parks directly through `parking_lot_core` on its own address,
 * releasing the mutex in the `before_sleep` callback: by then the thread is
 * already queued, so any signal issued after the mutex is released finds it.
 */

use super::super::traits::{Backend, RawCondition, RawMutex, TryLock};
use super::owner::Ownership;
use crate::core::context;
use crate::core::errors::{SyncError, SyncResult};
use parking_lot::lock_api::RawMutex as LockApi;
use parking_lot_core::{park, unpark_all, unpark_one, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Kernel-thread backend marker
#[derive(Debug, Clone, Copy, Default)]
pub struct Kernel;

impl Backend for Kernel {
    const NAME: &'static str = "kernel";
    const COOPERATIVE: bool = false;

    type Mutex = KernelMutex;
    type Condition = KernelCondition;
}

/// Native kernel mutex
pub struct KernelMutex {
    raw: parking_lot::RawMutex,
    ownership: Ownership,
}

impl KernelMutex {
    /// Release the lock word
    ///
    /// # Safety
    ///
    /// The calling context must hold the lock word and have already cleared
    /// its ownership record.
    #[inline]
    unsafe fn release_word(&self) {
        self.raw.unlock();
    }
}

impl RawMutex for KernelMutex {
    fn new(recursive: bool) -> Self {
        Self {
            raw: <parking_lot::RawMutex as LockApi>::INIT,
            ownership: Ownership::new(recursive),
        }
    }

    fn lock(&self) -> SyncResult<()> {
        let me = context::current();
        if let Some(result) = self.ownership.reenter(me) {
            return result;
        }
        self.raw.lock();
        self.ownership.acquired(me);
        Ok(())
    }

    fn try_lock(&self) -> SyncResult<TryLock> {
        let me = context::current();
        if let Some(result) = self.ownership.try_reenter(me) {
            return Ok(result);
        }
        if self.raw.try_lock() {
            self.ownership.acquired(me);
            Ok(TryLock::Acquired)
        } else {
            Ok(TryLock::Busy)
        }
    }

    fn unlock(&self) -> SyncResult<()> {
        let me = context::current();
        if self.ownership.release(me)? {
            // SAFETY: ownership confirmed `me` held the word and cleared the record
            unsafe { self.release_word() };
        }
        Ok(())
    }

    #[inline]
    fn is_owned_by_current(&self) -> bool {
        self.ownership.held_by(context::current())
    }
}

/// Native kernel condition variable
pub struct KernelCondition {
    waiters: AtomicUsize,
}

impl KernelCondition {
    #[inline(always)]
    fn park_key(&self) -> usize {
        self as *const Self as usize
    }
}

impl RawCondition<KernelMutex> for KernelCondition {
    fn new() -> Self {
        Self {
            waiters: AtomicUsize::new(0),
        }
    }

    fn wait(&self, mutex: &KernelMutex) -> SyncResult<()> {
        let me = context::current();
        let depth = mutex.ownership.suspend(me)?;

        // Counted while the mutex is still held, so a signaler that takes
        // the mutex afterwards always sees this waiter
        self.waiters.fetch_add(1, Ordering::SeqCst);

        // SAFETY: the key is this condition's address, which stays valid for
        // the whole park; no callback panics or parks
        let result = unsafe {
            park(
                self.park_key(),
                || true,
                || {
                    // SAFETY: the word is held by us and ownership was suspended above
                    mutex.release_word();
                },
                |_, _| {},
                DEFAULT_PARK_TOKEN,
                None,
            )
        };

        self.waiters.fetch_sub(1, Ordering::SeqCst);
        mutex.raw.lock();
        mutex.ownership.resume(me, depth);

        match result {
            ParkResult::Unparked(_) => Ok(()),
            ParkResult::Invalid | ParkResult::TimedOut => Err(SyncError::Substrate {
                backend: Kernel::NAME,
                op: "cond_wait",
                code: 1,
            }),
        }
    }

    fn signal(&self) -> SyncResult<()> {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return Ok(());
        }
        // SAFETY: the key is our own address and the callback does nothing
        unsafe {
            unpark_one(self.park_key(), |_| DEFAULT_UNPARK_TOKEN);
        }
        Ok(())
    }

    fn broadcast(&self) -> SyncResult<()> {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return Ok(());
        }
        // SAFETY: the key is our own address
        unsafe {
            unpark_all(self.park_key(), DEFAULT_UNPARK_TOKEN);
        }
        Ok(())
    }
}
