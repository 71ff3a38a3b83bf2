/*!
 * Wait-Sync Completion Object
 *
 * # Signaling Handshake
 *
 * The producer that completes the last operation locks the paired mutex,
 * signals, unlocks, and only then clears `signaling`. The owner can wake
 * (or observe `count == 0` while polling) before the producer has returned
 * from `unlock`, so [`WaitSync::release`] spins until `signaling` is clear
 * before the native handles go away.
 */

use super::{Progress, WaitMode};
use crate::core::errors::{Status, SyncError, SyncResult, STATUS_SUCCESS};
use crate::sync::backend::ActiveBackend;
use crate::sync::condvar::Condition;
use crate::sync::mutex::Mutex;
use crate::sync::spinwait::Backoff;
use crate::sync::traits::Backend;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicPtr, AtomicUsize, Ordering};
use tracing::warn;

/// Blocks its owner until a number of operations complete
pub struct WaitSync<B: Backend = ActiveBackend> {
    count: AtomicI32,
    status: AtomicI32,
    condition: Condition<B>,
    lock: Mutex<B>,
    signaling: AtomicBool,
    mode: WaitMode,
    pub(super) next: AtomicPtr<WaitSync<B>>,
    pub(super) prev: AtomicPtr<WaitSync<B>>,
    /// Address of the owning list, 0 when unlinked
    pub(super) list: AtomicUsize,
}

impl WaitSync {
    /// A wait-sync on the active backend expecting `count` completions
    pub fn new(count: i32) -> SyncResult<Self> {
        Self::with_count(count)
    }
}

impl<B: Backend> WaitSync<B> {
    /// Expect `count` completions, waiting in the current thread mode
    pub fn with_count(count: i32) -> SyncResult<Self> {
        Self::with_mode(count, WaitMode::current())
    }

    /// Expect `count` completions, waiting in `mode`
    pub fn with_mode(count: i32, mode: WaitMode) -> SyncResult<Self> {
        let mut sync = Self {
            count: AtomicI32::new(0),
            status: AtomicI32::new(STATUS_SUCCESS),
            condition: Condition::const_new(),
            lock: Mutex::const_new(false),
            signaling: AtomicBool::new(false),
            mode,
            next: AtomicPtr::new(ptr::null_mut()),
            prev: AtomicPtr::new(ptr::null_mut()),
            list: AtomicUsize::new(0),
        };
        sync.init_with_mode(count, mode)?;
        Ok(sync)
    }

    /// Re-arm for `count` completions, for pooled reuse
    pub fn init(&mut self, count: i32) -> SyncResult<()> {
        self.init_with_mode(count, WaitMode::current())
    }

    pub fn init_with_mode(&mut self, count: i32, mode: WaitMode) -> SyncResult<()> {
        if count < 0 {
            return Err(SyncError::BadParam("wait-sync count must not be negative"));
        }
        if self.is_linked() {
            return Err(SyncError::BadParam("wait-sync is still linked into a list"));
        }

        *self.count.get_mut() = count;
        *self.status.get_mut() = STATUS_SUCCESS;
        *self.signaling.get_mut() = count != 0;
        *self.next.get_mut() = ptr::null_mut();
        *self.prev.get_mut() = ptr::null_mut();
        self.mode = mode;

        if mode == WaitMode::Blocking {
            B::ensure_init();
            self.condition.create()?;
            self.lock.create()?;
        }
        Ok(())
    }

    /// Wait until every operation has completed and return the final status
    ///
    /// Blocking mode suspends on the native condition. Polling mode drives
    /// `progress` and yields until the count drains.
    pub fn wait<P: Progress + ?Sized>(&self, progress: &mut P) -> SyncResult<Status> {
        if self.count.load(Ordering::Acquire) <= 0 {
            return Ok(self.status());
        }

        match self.mode {
            WaitMode::Blocking => self.wait_blocking()?,
            WaitMode::Polling => {
                B::ensure_init();
                while self.count.load(Ordering::Acquire) > 0 {
                    progress.progress();
                    B::yield_now();
                }
            }
        }
        Ok(self.status())
    }

    fn wait_blocking(&self) -> SyncResult<()> {
        self.lock.lock()?;
        let mut waited = Ok(());
        while self.count.load(Ordering::Acquire) > 0 {
            waited = self.condition.wait(&self.lock);
            if waited.is_err() {
                break;
            }
        }
        self.lock.unlock()?;
        waited
    }

    /// Report completion of `updates` operations with `status`
    ///
    /// A non-success status is recorded and forces the count to zero so the
    /// owner wakes immediately. Only the call that brings the count to zero
    /// signals.
    pub fn update(&self, updates: i32, status: Status) -> SyncResult<()> {
        if updates < 0 {
            return Err(SyncError::BadParam("wait-sync updates must not be negative"));
        }

        if status == STATUS_SUCCESS {
            let previous = self.count.fetch_sub(updates, Ordering::AcqRel);
            let remaining = previous - updates;
            if remaining < 0 {
                return Err(SyncError::BadParam("wait-sync completed more operations than expected"));
            }
            if remaining == 0 && previous > 0 {
                return self.signal();
            }
            return Ok(());
        }

        self.status.store(status, Ordering::Release);
        if self.count.swap(0, Ordering::AcqRel) > 0 {
            self.signal()
        } else {
            Ok(())
        }
    }

    /// Wake the owner and end the signaling window
    ///
    /// `signaling` is cleared even when the wakeup fails, so `release`
    /// cannot spin forever.
    pub fn signal(&self) -> SyncResult<()> {
        let result = match self.mode {
            WaitMode::Blocking => self.signal_locked(),
            WaitMode::Polling => Ok(()),
        };
        self.signaling.store(false, Ordering::Release);
        result
    }

    fn signal_locked(&self) -> SyncResult<()> {
        self.lock.lock()?;
        let signaled = self.condition.signal();
        let unlocked = self.lock.unlock();
        signaled.and(unlocked)
    }

    /// End the signaling window without waking anyone
    #[inline]
    pub fn mark_signaled(&self) {
        self.signaling.store(false, Ordering::Release);
    }

    /// Wait out any in-flight signal, then free the native handles
    ///
    /// # Safety
    ///
    /// Every producer must be done with `update` apart from one that may
    /// still be inside `signal`. No context may be waiting on this object.
    pub unsafe fn release(&self) {
        let mut backoff = Backoff::new();
        while self.signaling.load(Ordering::Acquire) {
            backoff.snooze::<B>();
        }
        self.free_natives();
    }

    /// Free the native handles without waiting for the signaling window
    ///
    /// # Safety
    ///
    /// No producer may be inside `signal` and no context may be waiting.
    pub unsafe fn release_nowait(&self) {
        self.free_natives();
    }

    unsafe fn free_natives(&self) {
        if self.mode == WaitMode::Blocking {
            self.condition.free_native();
            self.lock.free_native();
        }
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status.load(Ordering::Acquire)
    }

    /// Operations still outstanding
    #[inline]
    pub fn count(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_signaling(&self) -> bool {
        self.signaling.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mode(&self) -> WaitMode {
        self.mode
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.list.load(Ordering::Acquire) != 0
    }
}

impl<B: Backend> Drop for WaitSync<B> {
    fn drop(&mut self) {
        if *self.list.get_mut() != 0 {
            warn!(backend = B::NAME, "Wait-sync dropped while still linked");
        }
    }
}

impl<B: Backend> std::fmt::Debug for WaitSync<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitSync")
            .field("backend", &B::NAME)
            .field("count", &self.count())
            .field("status", &self.status())
            .field("signaling", &self.is_signaling())
            .field("mode", &self.mode)
            .finish()
    }
}
