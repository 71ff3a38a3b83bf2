/*!
 * HPC Synchronization Layer
 *
 * Mutexes, condition variables, thread-specific storage and completion
 * objects that behave the same on kernel threads and on cooperative
 * user-level thread runtimes.
 */

pub mod core;
pub mod monitoring;
pub mod sync;

// Re-exports
pub use crate::core::errors::*;
pub use crate::core::context::{set_main, using_threads};
pub use monitoring::init_tracing;
pub use sync::{
    BlockingLock, Condition, Mutex, MutexGuard, NoProgress, Progress, SyncConfig, TryLock,
    WaitMode, WaitSync, WaitSyncList,
};
