/*!
 * Atomic Spinlocks
 *
 * `AtomicLock` is the raw test-and-set word embedded in every mutex for the
 * low-latency path. `SpinLock<T>` wraps it around data for the short
 * internal critical sections of cooperative backends, where parking the
 * kernel thread is not an option.
 */

use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// Raw test-and-set spinlock
#[derive(Debug, Default)]
pub struct AtomicLock {
    locked: AtomicBool,
}

impl AtomicLock {
    /// Create an unlocked spinlock
    #[inline]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Try to take the lock without spinning
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Spin until the lock is taken
    #[inline]
    pub fn lock(&self) {
        while !self.try_lock() {
            // Test-and-test-and-set: wait on a plain load to keep the line shared
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    /// Release the lock
    #[inline]
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    /// Whether any context holds the lock
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// Spinlock protecting a value
pub struct SpinLock<T> {
    lock: AtomicLock,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is serialized by `lock`
unsafe impl<T: Send> Send for SpinLock<T> {}
// SAFETY: access to `data` is serialized by `lock`
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Create an unlocked spinlock around `value`
    #[inline]
    pub const fn new(value: T) -> Self {
        Self {
            lock: AtomicLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    /// Spin until the lock is taken
    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        self.lock.lock();
        SpinLockGuard { owner: self }
    }
}

/// RAII guard for [`SpinLock`]
pub struct SpinLockGuard<'a, T> {
    owner: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard proves the lock is held
        unsafe { &*self.owner.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves the lock is held exclusively
        unsafe { &mut *self.owner.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.owner.lock.unlock();
    }
}
