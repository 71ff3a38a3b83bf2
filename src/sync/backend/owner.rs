/*!
 * Ownership Tracking
 *
 * Owner and recursion depth bookkeeping shared by every native mutex.
 * Only the owning context writes these fields while it holds the lock word,
 * so relaxed ordering suffices: a context can only ever observe its own id
 * in `owner` if it stored it itself.
 */

use super::super::traits::TryLock;
use crate::core::context::ContextId;
use crate::core::errors::{SyncError, SyncResult};
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) struct Ownership {
    owner: AtomicUsize,
    depth: AtomicUsize,
    recursive: bool,
}

impl Ownership {
    pub(crate) const fn new(recursive: bool) -> Self {
        Self {
            owner: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            recursive,
        }
    }

    #[inline(always)]
    pub(crate) fn held_by(&self, me: ContextId) -> bool {
        self.owner.load(Ordering::Relaxed) == me.as_usize()
    }

    /// Resolve a lock request by a context that already owns the mutex
    ///
    /// Returns `None` when the caller does not own it and must acquire the
    /// lock word.
    #[inline]
    pub(crate) fn reenter(&self, me: ContextId) -> Option<SyncResult<()>> {
        if !self.held_by(me) {
            return None;
        }
        if self.recursive {
            self.depth.fetch_add(1, Ordering::Relaxed);
            Some(Ok(()))
        } else {
            Some(Err(SyncError::WouldDeadlock))
        }
    }

    /// Non-blocking counterpart of [`reenter`](Self::reenter)
    #[inline]
    pub(crate) fn try_reenter(&self, me: ContextId) -> Option<TryLock> {
        if !self.held_by(me) {
            return None;
        }
        if self.recursive {
            self.depth.fetch_add(1, Ordering::Relaxed);
            Some(TryLock::Acquired)
        } else {
            Some(TryLock::Busy)
        }
    }

    /// Record that `me` just acquired the lock word
    #[inline]
    pub(crate) fn acquired(&self, me: ContextId) {
        self.depth.store(1, Ordering::Relaxed);
        self.owner.store(me.as_usize(), Ordering::Relaxed);
    }

    /// Drop one level of ownership
    ///
    /// Returns `true` when the lock word must now be released.
    #[inline]
    pub(crate) fn release(&self, me: ContextId) -> SyncResult<bool> {
        if !self.held_by(me) {
            return Err(SyncError::NotOwner);
        }
        let depth = self.depth.load(Ordering::Relaxed).saturating_sub(1);
        self.depth.store(depth, Ordering::Relaxed);
        if depth == 0 {
            self.owner.store(0, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Give up ownership entirely ahead of a condition wait
    ///
    /// Returns the recursion depth to restore afterwards.
    #[inline]
    pub(crate) fn suspend(&self, me: ContextId) -> SyncResult<usize> {
        if !self.held_by(me) {
            return Err(SyncError::NotOwner);
        }
        let depth = self.depth.swap(0, Ordering::Relaxed);
        self.owner.store(0, Ordering::Relaxed);
        Ok(depth)
    }

    /// Reinstate ownership after a condition wait reacquired the lock word
    #[inline]
    pub(crate) fn resume(&self, me: ContextId, depth: usize) {
        self.depth.store(depth, Ordering::Relaxed);
        self.owner.store(me.as_usize(), Ordering::Relaxed);
    }
}
