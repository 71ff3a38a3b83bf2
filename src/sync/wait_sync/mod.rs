/*!
 * Wait-Sync
 *
 * Completion object that blocks its owner until N outstanding operations
 * (sends, receives, collectives) have completed.
 *
 * # Lifecycle
 *
 * 1. The owner initializes it with the number of operations
 * 2. Producers report completions through [`WaitSync::update`]; the one that
 *    brings the count to zero signals
 * 3. The owner's [`WaitSync::wait`] returns the final status
 * 4. [`WaitSync::release`] waits out a producer still inside `signal`
 *    before the native condition and mutex are freed
 *
 * Without thread support the object degrades to polling: `wait` drives the
 * injected [`Progress`] engine until the count drains.
 */

mod completion;
mod list;

pub use completion::WaitSync;
pub use list::WaitSyncList;

use crate::core::context;

/// Progress engine driven by polling waits
pub trait Progress {
    /// Advance outstanding operations, returning how many events completed
    fn progress(&mut self) -> usize;
}

impl<F> Progress for F
where
    F: FnMut() -> usize,
{
    #[inline]
    fn progress(&mut self) -> usize {
        self()
    }
}

/// A progress engine that never completes anything
///
/// For waits whose completions come entirely from other contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    #[inline(always)]
    fn progress(&mut self) -> usize {
        0
    }
}

/// How a wait-sync waits, fixed at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitMode {
    /// Block on the native condition variable
    Blocking,
    /// Poll the progress engine and yield
    Polling,
}

impl WaitMode {
    /// Blocking when threads are in use, polling otherwise
    #[inline]
    pub fn current() -> Self {
        if context::using_threads() {
            WaitMode::Blocking
        } else {
            WaitMode::Polling
        }
    }
}
