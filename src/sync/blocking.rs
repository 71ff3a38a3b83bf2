/*!
 * Blocking Lock
 *
 * Single-shot rendezvous: a context blocks until another one clears the
 * `active` flag. Built from a [`Mutex`] and a [`Condition`].
 *
 * - `wait`: block until woken, leave `active` as it is
 * - `wakeup`: clear `active` and wake every waiter
 * - `acquire` / `release`: exclusive section that re-arms `active` on entry
 *   and keeps the mutex held until `release`
 *
 * When `debug_threads` is on, every wait logs the call site on entry and
 * exit.
 */

use super::backend::ActiveBackend;
use super::condvar::Condition;
use super::mutex::Mutex;
use super::traits::Backend;
use crate::core::context;
use crate::core::errors::{Status, SyncError, SyncResult, STATUS_SUCCESS};
use std::panic::Location;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tracing::info;

/// Mutex + condition + `active` flag + status
pub struct BlockingLock<B: Backend = ActiveBackend> {
    mutex: Mutex<B>,
    cond: Condition<B>,
    active: AtomicBool,
    status: AtomicI32,
}

impl BlockingLock {
    /// An armed lock on the active backend
    pub const fn new() -> Self {
        Self::const_new()
    }
}

impl<B: Backend> BlockingLock<B> {
    /// An armed lock on backend `B`
    pub const fn const_new() -> Self {
        Self {
            mutex: Mutex::const_new(false),
            cond: Condition::const_new(),
            active: AtomicBool::new(true),
            status: AtomicI32::new(STATUS_SUCCESS),
        }
    }

    /// Block until woken, then re-arm and keep the mutex
    ///
    /// Must be paired with [`release`](Self::release) from the same context.
    ///
    /// On failure the error's status code is also recorded in
    /// [`status`](Self::status).
    #[track_caller]
    pub fn acquire(&self) -> SyncResult<()> {
        self.mutex.lock().map_err(|err| self.fail(err))?;
        if let Err(err) = self.wait_inactive() {
            self.mutex.unlock()?;
            return Err(self.fail(err));
        }
        self.active.store(true, Ordering::Release);
        Ok(())
    }

    /// Leave the section entered by [`acquire`](Self::acquire)
    #[track_caller]
    pub fn release(&self) -> SyncResult<()> {
        if !self.mutex.is_locked_by_current() {
            return Err(SyncError::NotOwner);
        }
        if context::debug_threads() {
            let site = Location::caller();
            info!(file = site.file(), line = site.line(), "Releasing thread");
        }
        self.active.store(false, Ordering::Release);
        let woke = self.cond.broadcast();
        self.mutex.unlock()?;
        woke
    }

    /// Block until woken; the `active` flag is left untouched
    #[track_caller]
    pub fn wait(&self) -> SyncResult<()> {
        self.mutex.lock().map_err(|err| self.fail(err))?;
        let waited = self.wait_inactive().map_err(|err| self.fail(err));
        self.mutex.unlock()?;
        waited
    }

    /// Clear `active` and wake every waiter
    pub fn wakeup(&self) -> SyncResult<()> {
        self.mutex.lock()?;
        self.active.store(false, Ordering::Release);
        let woke = self.cond.broadcast();
        self.mutex.unlock()?;
        woke
    }

    fn fail(&self, err: SyncError) -> SyncError {
        self.set_status(err.status());
        err
    }

    #[track_caller]
    fn wait_inactive(&self) -> SyncResult<()> {
        let site = Location::caller();
        let debug = context::debug_threads();
        if debug {
            info!(file = site.file(), line = site.line(), "Waiting for thread");
        }
        while self.active.load(Ordering::Acquire) {
            self.cond.wait(&self.mutex)?;
        }
        if debug {
            info!(file = site.file(), line = site.line(), "Thread obtained");
        }
        Ok(())
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status.load(Ordering::Acquire)
    }

    /// Record a result for the woken context to pick up
    #[inline]
    pub fn set_status(&self, status: Status) {
        self.status.store(status, Ordering::Release);
    }
}

impl<B: Backend> Default for BlockingLock<B> {
    fn default() -> Self {
        Self::const_new()
    }
}

impl<B: Backend> std::fmt::Debug for BlockingLock<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingLock")
            .field("backend", &B::NAME)
            .field("active", &self.is_active())
            .field("status", &self.status())
            .finish()
    }
}
