/*!
 * Condition Variable
 *
 * Monitor-style condition paired with a [`Mutex`] on every wait. The native
 * condition is created lazily with the same CAS discipline as the mutex.
 * Spurious wakeups are possible: always wait in a loop on the predicate.
 */

use super::backend::ActiveBackend;
use super::lazy::LazyHandle;
use super::mutex::Mutex;
use super::traits::{Backend, RawCondition};
use crate::core::errors::SyncResult;
use std::panic::Location;
use tracing::error;

/// Lazily created condition variable
pub struct Condition<B: Backend = ActiveBackend> {
    native: LazyHandle<B::Condition>,
}

impl Condition {
    /// A condition on the active backend
    pub const fn new() -> Self {
        Self::const_new()
    }
}

impl<B: Backend> Condition<B> {
    /// A condition on backend `B`
    pub const fn const_new() -> Self {
        Self {
            native: LazyHandle::new(),
        }
    }

    /// Force creation of the native condition
    pub fn create(&self) -> SyncResult<()> {
        self.native();
        Ok(())
    }

    #[inline]
    pub fn is_created(&self) -> bool {
        self.native.is_created()
    }

    #[inline]
    fn native(&self) -> &B::Condition {
        self.native.get_or_create(|| {
            B::ensure_init();
            <B::Condition as RawCondition<B::Mutex>>::new()
        })
    }

    /// Release `mutex`, suspend until signaled, reacquire `mutex`
    ///
    /// The caller must hold `mutex`; a recursive mutex regains its full
    /// depth on return.
    #[track_caller]
    pub fn wait(&self, mutex: &Mutex<B>) -> SyncResult<()> {
        self.native().wait(mutex.native()).map_err(|err| {
            let site = Location::caller();
            error!(
                backend = B::NAME,
                file = site.file(),
                line = site.line(),
                error = %err,
                "Condition wait failed"
            );
            err
        })
    }

    /// Wake at least one waiter
    pub fn signal(&self) -> SyncResult<()> {
        self.native().signal()
    }

    /// Wake every waiter
    pub fn broadcast(&self) -> SyncResult<()> {
        self.native().broadcast()
    }

    /// Destroy the native condition; it is recreated on next use
    pub fn destroy(&mut self) {
        // SAFETY: `&mut self` rules out concurrent waiters
        unsafe {
            self.native.free();
        }
    }

    /// Destroy the native condition through a shared reference
    ///
    /// # Safety
    ///
    /// No context may be waiting on or signaling the condition.
    pub(crate) unsafe fn free_native(&self) -> bool {
        self.native.free()
    }
}

impl<B: Backend> Default for Condition<B> {
    fn default() -> Self {
        Self::const_new()
    }
}

impl<B: Backend> std::fmt::Debug for Condition<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("backend", &B::NAME)
            .field("created", &self.is_created())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::SyncError;
    use crate::sync::backend::{Feb, Kernel};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_without_lock_rejected() {
        let mutex = Mutex::<Kernel>::const_new(false);
        let cond = Condition::<Kernel>::const_new();
        assert_eq!(cond.wait(&mutex), Err(SyncError::NotOwner));
    }

    #[test]
    fn test_signal_without_waiters() {
        let cond = Condition::<Feb>::const_new();
        cond.signal().unwrap();
        cond.broadcast().unwrap();
        assert!(cond.is_created());
    }

    #[test]
    fn test_destroy_then_reuse() {
        let mut cond = Condition::<Kernel>::default();
        cond.create().unwrap();
        cond.destroy();
        assert!(!cond.is_created());
        cond.signal().unwrap();
        assert!(cond.is_created());
    }

    #[test]
    fn test_recursive_depth_restored_after_wait() {
        let state = Arc::new((
            Mutex::<Kernel>::const_new(true),
            Condition::<Kernel>::const_new(),
            AtomicBool::new(false),
        ));

        let waiter = {
            let state = state.clone();
            thread::spawn(move || {
                let (mutex, cond, ready) = &*state;
                mutex.lock().unwrap();
                mutex.lock().unwrap();
                while !ready.load(Ordering::SeqCst) {
                    cond.wait(mutex).unwrap();
                }
                mutex.unlock().unwrap();
                assert!(mutex.is_locked_by_current());
                mutex.unlock().unwrap();
                assert!(!mutex.is_locked_by_current());
            })
        };

        let (mutex, cond, ready) = &*state;
        loop {
            mutex.lock().unwrap();
            ready.store(true, Ordering::SeqCst);
            cond.broadcast().unwrap();
            mutex.unlock().unwrap();
            if waiter.is_finished() {
                break;
            }
            thread::yield_now();
        }
        waiter.join().unwrap();
    }
}
