/*!
 * Mutex
 *
 * Backend-agnostic lock with a lazily created native handle.
 *
 * # Design
 *
 * A `Mutex` is constructible in `const` context and owns no native object
 * until the first `create`, `lock`, `trylock` or `unlock`. Racing first
 * users each build a candidate native mutex and install it with a single
 * CAS; losers destroy theirs (see [`LazyHandle`]).
 *
 * Independently of the native handle each mutex embeds an [`AtomicLock`]
 * word for the `atomic_*` fast path. The two paths guard different words:
 * a logical lock must use one or the other, never both.
 *
 * Debug builds remember the call site of the last successful acquisition
 * and log failures with file and line. With `debug_threads` on, every
 * acquisition is logged with its call site.
 */

use super::backend::ActiveBackend;
use super::lazy::LazyHandle;
use super::spinlock::AtomicLock;
use super::traits::{Backend, RawMutex, TryLock};
use crate::core::context;
use crate::core::errors::{SerializableError, SyncError, SyncResult};
use std::marker::PhantomData;
use std::panic::Location;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicPtr, Ordering};
use tracing::{error, info, warn};

/// Lazily created, optionally recursive mutex
pub struct Mutex<B: Backend = ActiveBackend> {
    native: LazyHandle<B::Mutex>,
    recursive: bool,
    #[cfg(debug_assertions)]
    site: AtomicPtr<Location<'static>>,
    #[cfg_attr(not(feature = "spinlocks"), allow(dead_code))]
    atomic: AtomicLock,
}

impl Mutex {
    /// A non-recursive mutex on the active backend
    pub const fn new() -> Self {
        Self::const_new(false)
    }

    /// A recursive mutex on the active backend
    pub const fn new_recursive() -> Self {
        Self::const_new(true)
    }
}

impl<B: Backend> Mutex<B> {
    /// A mutex on backend `B`
    pub const fn const_new(recursive: bool) -> Self {
        Self {
            native: LazyHandle::new(),
            recursive,
            #[cfg(debug_assertions)]
            site: AtomicPtr::new(std::ptr::null_mut()),
            atomic: AtomicLock::new(),
        }
    }

    #[inline]
    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    /// Whether the native mutex exists yet
    #[inline]
    pub fn is_created(&self) -> bool {
        self.native.is_created()
    }

    /// Force creation of the native mutex
    ///
    /// Idempotent; concurrent callers end up sharing one native mutex.
    pub fn create(&self) -> SyncResult<()> {
        self.native();
        Ok(())
    }

    #[inline]
    pub(crate) fn native(&self) -> &B::Mutex {
        self.native.get_or_create(|| {
            B::ensure_init();
            <B::Mutex as RawMutex>::new(self.recursive)
        })
    }

    /// Acquire the mutex, suspending while another context holds it
    ///
    /// Relocking a non-recursive mutex from its owner fails with
    /// [`SyncError::WouldDeadlock`].
    #[track_caller]
    pub fn lock(&self) -> SyncResult<()> {
        match self.native().lock() {
            Ok(()) => {
                self.record_site();
                Ok(())
            }
            Err(err) => Err(self.report("lock", err)),
        }
    }

    /// Acquire the mutex if it is free, never suspending
    #[track_caller]
    pub fn trylock(&self) -> SyncResult<TryLock> {
        match self.native().try_lock() {
            Ok(TryLock::Acquired) => {
                self.record_site();
                Ok(TryLock::Acquired)
            }
            Ok(TryLock::Busy) => Ok(TryLock::Busy),
            Err(err) => Err(self.report("trylock", err)),
        }
    }

    /// Release one level of ownership
    ///
    /// Cooperative backends yield afterwards so the releasing task cannot
    /// starve the others.
    #[track_caller]
    pub fn unlock(&self) -> SyncResult<()> {
        self.native()
            .unlock()
            .map_err(|err| self.report("unlock", err))?;
        if B::COOPERATIVE {
            B::yield_now();
        }
        Ok(())
    }

    /// Acquire and return a guard that unlocks on drop
    #[track_caller]
    pub fn guard(&self) -> SyncResult<MutexGuard<'_, B>> {
        self.lock()?;
        Ok(MutexGuard {
            mutex: self,
            _not_send: PhantomData,
        })
    }

    /// Whether the calling context holds the native mutex
    pub fn is_locked_by_current(&self) -> bool {
        self.native
            .get()
            .map_or(false, |native| native.is_owned_by_current())
    }

    /// Call site of the most recent successful acquisition (debug builds)
    pub fn last_lock_site(&self) -> Option<&'static Location<'static>> {
        #[cfg(debug_assertions)]
        {
            let site = self.site.load(Ordering::Relaxed);
            // SAFETY: only `&'static Location` values are ever stored
            unsafe { site.as_ref() }
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    }

    /// Destroy the native mutex, leaving this mutex uncreated
    ///
    /// # Safety
    ///
    /// No context may hold or be waiting on the mutex.
    pub(crate) unsafe fn free_native(&self) -> bool {
        self.native.free()
    }

    #[inline]
    #[track_caller]
    fn record_site(&self) {
        let site = Location::caller();
        if context::debug_threads() {
            info!(backend = B::NAME, file = site.file(), line = site.line(), "Mutex acquired");
        }
        #[cfg(debug_assertions)]
        self.site.store(
            site as *const Location<'static> as *mut Location<'static>,
            Ordering::Relaxed,
        );
    }

    #[track_caller]
    fn report(&self, op: &'static str, err: SyncError) -> SyncError {
        let site = Location::caller();
        match &err {
            SyncError::Substrate { .. } if cfg!(debug_assertions) => {
                let diagnostic = SerializableError::from(err.clone());
                error!(
                    backend = B::NAME,
                    op,
                    file = site.file(),
                    line = site.line(),
                    error_type = %diagnostic.error_type,
                    details = ?diagnostic.details,
                    error = %diagnostic.message,
                    "Mutex operation failed"
                );
            }
            SyncError::Substrate { .. } => {
                error!(backend = B::NAME, op, error = %err, "Mutex operation failed");
            }
            _ => {
                warn!(backend = B::NAME, op, error = %err, "Mutex misuse");
            }
        }
        err
    }
}

#[cfg(feature = "spinlocks")]
impl<B: Backend> Mutex<B> {
    /// Take the embedded spinlock word if it is free
    #[inline]
    pub fn atomic_trylock(&self) -> SyncResult<TryLock> {
        if self.atomic.try_lock() {
            Ok(TryLock::Acquired)
        } else {
            Ok(TryLock::Busy)
        }
    }

    /// Spin until the embedded spinlock word is taken
    #[inline]
    pub fn atomic_lock(&self) -> SyncResult<()> {
        self.atomic.lock();
        Ok(())
    }

    /// Release the embedded spinlock word
    #[inline]
    pub fn atomic_unlock(&self) -> SyncResult<()> {
        self.atomic.unlock();
        Ok(())
    }
}

#[cfg(not(feature = "spinlocks"))]
impl<B: Backend> Mutex<B> {
    /// Same as [`trylock`](Self::trylock) without the `spinlocks` feature
    #[inline]
    #[track_caller]
    pub fn atomic_trylock(&self) -> SyncResult<TryLock> {
        self.trylock()
    }

    /// Same as [`lock`](Self::lock) without the `spinlocks` feature
    #[inline]
    #[track_caller]
    pub fn atomic_lock(&self) -> SyncResult<()> {
        self.lock()
    }

    /// Same as [`unlock`](Self::unlock) without the `spinlocks` feature
    #[inline]
    #[track_caller]
    pub fn atomic_unlock(&self) -> SyncResult<()> {
        self.unlock()
    }
}

impl<B: Backend> Default for Mutex<B> {
    fn default() -> Self {
        Self::const_new(false)
    }
}

impl<B: Backend> std::fmt::Debug for Mutex<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutex")
            .field("backend", &B::NAME)
            .field("recursive", &self.recursive)
            .field("created", &self.is_created())
            .finish()
    }
}

/// RAII guard returned by [`Mutex::guard`]
///
/// Ownership is tied to the acquiring context, so the guard is `!Send`.
#[must_use = "the mutex is released as soon as the guard is dropped"]
pub struct MutexGuard<'a, B: Backend = ActiveBackend> {
    mutex: &'a Mutex<B>,
    _not_send: PhantomData<*const ()>,
}

impl<B: Backend> MutexGuard<'_, B> {
    pub fn mutex(&self) -> &Mutex<B> {
        self.mutex
    }
}

impl<B: Backend> Drop for MutexGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(err) = self.mutex.unlock() {
            warn!(backend = B::NAME, error = %err, "Failed to release mutex guard");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::backend::{Kernel, KernelCondition, KernelMutex, Tasklet};
    use crate::sync::traits::RawCondition;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    static CREATED: AtomicUsize = AtomicUsize::new(0);
    static DROPPED: AtomicUsize = AtomicUsize::new(0);

    /// Kernel backend that counts native mutex lifetimes
    struct Counting;

    struct CountingMutex(KernelMutex);

    impl Drop for CountingMutex {
        fn drop(&mut self) {
            DROPPED.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RawMutex for CountingMutex {
        fn new(recursive: bool) -> Self {
            CREATED.fetch_add(1, Ordering::SeqCst);
            Self(KernelMutex::new(recursive))
        }
        fn lock(&self) -> SyncResult<()> {
            self.0.lock()
        }
        fn try_lock(&self) -> SyncResult<TryLock> {
            self.0.try_lock()
        }
        fn unlock(&self) -> SyncResult<()> {
            self.0.unlock()
        }
        fn is_owned_by_current(&self) -> bool {
            self.0.is_owned_by_current()
        }
    }

    struct CountingCondition(KernelCondition);

    impl RawCondition<CountingMutex> for CountingCondition {
        fn new() -> Self {
            Self(KernelCondition::new())
        }
        fn wait(&self, mutex: &CountingMutex) -> SyncResult<()> {
            self.0.wait(&mutex.0)
        }
        fn signal(&self) -> SyncResult<()> {
            self.0.signal()
        }
        fn broadcast(&self) -> SyncResult<()> {
            self.0.broadcast()
        }
    }

    impl Backend for Counting {
        const NAME: &'static str = "counting";
        const COOPERATIVE: bool = false;
        type Mutex = CountingMutex;
        type Condition = CountingCondition;
    }

    static STATIC_MUTEX: Mutex = Mutex::new();

    #[test]
    fn test_lazy_creation_single_winner() {
        let mutex = Arc::new(Mutex::<Counting>::const_new(false));
        let barrier = Arc::new(Barrier::new(8));
        let total = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let (mutex, barrier, total) = (mutex.clone(), barrier.clone(), total.clone());
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..100 {
                        mutex.lock().unwrap();
                        total.fetch_add(1, Ordering::Relaxed);
                        mutex.unlock().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(total.load(Ordering::SeqCst), 800);
        let live = CREATED.load(Ordering::SeqCst) - DROPPED.load(Ordering::SeqCst);
        assert_eq!(live, 1);

        drop(mutex);
        assert_eq!(CREATED.load(Ordering::SeqCst), DROPPED.load(Ordering::SeqCst));
    }

    #[test]
    fn test_static_mutex() {
        assert!(!STATIC_MUTEX.is_recursive());
        STATIC_MUTEX.lock().unwrap();
        assert!(STATIC_MUTEX.is_created());
        assert!(STATIC_MUTEX.is_locked_by_current());
        STATIC_MUTEX.unlock().unwrap();
    }

    #[test]
    fn test_non_recursive_relock_fails() {
        let mutex = Mutex::<Kernel>::const_new(false);
        mutex.lock().unwrap();
        assert_eq!(mutex.lock(), Err(SyncError::WouldDeadlock));
        assert_eq!(mutex.trylock(), Ok(TryLock::Busy));
        mutex.unlock().unwrap();
        assert_eq!(mutex.unlock(), Err(SyncError::NotOwner));
    }

    #[test]
    fn test_recursive_lock() {
        let mutex = Mutex::<Tasklet>::const_new(true);
        for _ in 0..3 {
            mutex.lock().unwrap();
        }
        assert!(mutex.trylock().unwrap().is_acquired());
        for _ in 0..4 {
            mutex.unlock().unwrap();
        }
        assert!(!mutex.is_locked_by_current());
    }

    #[test]
    fn test_explicit_create_is_idempotent() {
        let mutex: Mutex<Kernel> = Mutex::default();
        assert!(!mutex.is_created());
        mutex.create().unwrap();
        mutex.create().unwrap();
        assert!(mutex.is_created());
    }

    #[test]
    fn test_guard_unlocks_on_drop() {
        let mutex = Mutex::<Kernel>::const_new(false);
        {
            let guard = mutex.guard().unwrap();
            assert!(guard.mutex().is_locked_by_current());
        }
        assert!(!mutex.is_locked_by_current());
        assert_eq!(mutex.trylock(), Ok(TryLock::Acquired));
        mutex.unlock().unwrap();
    }

    #[test]
    fn test_atomic_path() {
        let mutex = Mutex::<Kernel>::const_new(false);
        assert_eq!(mutex.atomic_trylock(), Ok(TryLock::Acquired));
        assert_eq!(mutex.atomic_trylock(), Ok(TryLock::Busy));
        mutex.atomic_unlock().unwrap();
        mutex.atomic_lock().unwrap();
        mutex.atomic_unlock().unwrap();
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_records_lock_site() {
        let mutex = Mutex::<Kernel>::const_new(false);
        assert!(mutex.last_lock_site().is_none());
        mutex.lock().unwrap();
        let site = mutex.last_lock_site().unwrap();
        assert!(site.file().ends_with("mutex.rs"));
        mutex.unlock().unwrap();
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(debug_assertions)]
    #[test]
    #[serial_test::serial]
    fn test_debug_threads_logs_acquisition_site() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let mutex = Mutex::<Kernel>::const_new(false);
        tracing::subscriber::with_default(subscriber, || {
            mutex.lock().unwrap();
            mutex.unlock().unwrap();

            context::set_debug_threads(true);
            mutex.lock().unwrap();
            context::set_debug_threads(false);
            mutex.unlock().unwrap();
        });

        let output = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert_eq!(output.matches("Mutex acquired").count(), 1);
        assert!(output.contains("mutex.rs"));
    }
}
