/*!
 * Backend Capability Traits
 *
 * The surface every threading backend provides: a native mutex, a native
 * condition variable, per-context storage slots and a way to yield.
 *
 * # Design: Compile-Time Selection Over Dynamic Dispatch
 *
 * Backends are zero-sized marker types implementing [`Backend`]. The public
 * primitives are generic over the backend with the build's active backend as
 * the default parameter, so every hot path is monomorphized and no vtable is
 * involved. All backends stay compiled, which keeps each one testable.
 */

use super::tsd::{slots, Destructor, TsdKey};
use crate::core::errors::SyncResult;

/// Outcome of a non-blocking lock attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryLock {
    /// The calling context now holds the lock
    Acquired,
    /// Another context holds the lock (or a non-recursive lock is already
    /// held by the caller)
    Busy,
}

impl TryLock {
    /// Check if the lock was acquired
    #[inline(always)]
    pub fn is_acquired(&self) -> bool {
        matches!(self, TryLock::Acquired)
    }
}

/// Native mutex provided by a backend
///
/// Implementations track their owning context so that unlocking from a
/// non-owner and relocking a non-recursive mutex are reported instead of
/// corrupting the lock word.
pub trait RawMutex: Send + Sync + 'static {
    /// Build a fresh native mutex
    fn new(recursive: bool) -> Self;

    /// Acquire, suspending the calling context while contended
    fn lock(&self) -> SyncResult<()>;

    /// Acquire without suspending
    fn try_lock(&self) -> SyncResult<TryLock>;

    /// Release one level of ownership
    fn unlock(&self) -> SyncResult<()>;

    /// Whether the calling context holds this mutex
    fn is_owned_by_current(&self) -> bool;
}

/// Native condition variable paired with a backend's mutex per wait call
pub trait RawCondition<M: RawMutex>: Send + Sync + 'static {
    /// Build a fresh native condition
    fn new() -> Self;

    /// Atomically release `mutex`, suspend until signaled, reacquire `mutex`
    ///
    /// No wakeup issued after the mutex was released is lost.
    fn wait(&self, mutex: &M) -> SyncResult<()>;

    /// Wake at least one waiter, if any
    fn signal(&self) -> SyncResult<()>;

    /// Wake every waiter
    fn broadcast(&self) -> SyncResult<()>;
}

/// A threading substrate: kernel threads or a cooperative ULT runtime
///
/// Exactly one implementation is the build's [`ActiveBackend`](super::ActiveBackend).
pub trait Backend: Send + Sync + 'static {
    /// Backend name for diagnostics
    const NAME: &'static str;

    /// Cooperative backends yield after unlocking so one task cannot
    /// monopolize the scheduler
    const COOPERATIVE: bool;

    /// Native mutex type
    type Mutex: RawMutex;

    /// Native condition type
    type Condition: RawCondition<Self::Mutex>;

    /// Bring up the underlying runtime on first use
    #[inline(always)]
    fn ensure_init() {}

    /// Yield the calling execution context
    #[inline]
    fn yield_now() {
        std::thread::yield_now();
    }

    /// Allocate a per-context storage slot
    fn key_create(destructor: Option<Destructor>) -> SyncResult<TsdKey> {
        Self::ensure_init();
        slots::create(Self::NAME, destructor)
    }

    /// Free a per-context storage slot
    fn key_delete(key: TsdKey) -> SyncResult<()> {
        Self::ensure_init();
        slots::delete(key)
    }

    /// Store the calling context's value for `key`
    fn set_specific(key: TsdKey, value: *mut ()) -> SyncResult<()> {
        Self::ensure_init();
        slots::set(key, value)
    }

    /// Fetch the calling context's value for `key` (null when unset)
    fn get_specific(key: TsdKey) -> SyncResult<*mut ()> {
        Self::ensure_init();
        slots::get(key)
    }
}
