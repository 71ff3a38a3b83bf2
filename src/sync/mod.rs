/*!
 * Synchronization Primitives
 *
 * Backend-agnostic mutex, condition variable, thread-specific storage,
 * wait-sync completion object and blocking lock. The threading backend is
 * chosen at build time (see [`backend`]); every primitive defaults to it.
 *
 * # Usage
 *
 * ```ignore
 * static LOCK: Mutex = Mutex::new();
 *
 * LOCK.lock()?;
 * // critical section
 * LOCK.unlock()?;
 *
 * let sync = WaitSync::new(2)?;
 * // hand `&sync` to two producers, each calling `sync.update(1, STATUS_SUCCESS)`
 * let status = sync.wait(&mut NoProgress)?;
 * unsafe { sync.release() };
 * ```
 */

pub mod backend;
pub mod blocking;
pub mod condvar;
pub mod config;
pub mod lazy;
pub mod mutex;
pub mod spinlock;
pub mod spinwait;
pub mod traits;
pub mod tsd;
pub mod wait_sync;

pub use backend::{ActiveBackend, BackendKind, Feb, Kernel, Tasklet};
pub use blocking::BlockingLock;
pub use condvar::Condition;
pub use config::SyncConfig;
pub use lazy::LazyHandle;
pub use mutex::{Mutex, MutexGuard};
pub use spinlock::{AtomicLock, SpinLock, SpinLockGuard};
pub use spinwait::Backoff;
pub use traits::{Backend, RawCondition, RawMutex, TryLock};
pub use tsd::{keys_destruct, Destructor, TsdKey};
pub use wait_sync::{NoProgress, Progress, WaitMode, WaitSync, WaitSyncList};
