/*!
 * Intrusive Wait-Sync List
 *
 * Non-owning doubly linked list threaded through the `prev`/`next` links of
 * each [`WaitSync`], so a progress engine can enumerate outstanding waits
 * without allocating. All link updates happen under the list's mutex.
 */

use super::WaitSync;
use crate::core::errors::{SyncError, SyncResult};
use crate::sync::backend::ActiveBackend;
use crate::sync::mutex::Mutex;
use crate::sync::traits::Backend;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

/// List of wait-syncs linked through their own storage
pub struct WaitSyncList<B: Backend = ActiveBackend> {
    head: AtomicPtr<WaitSync<B>>,
    len: AtomicUsize,
    lock: Mutex<B>,
}

impl WaitSyncList {
    pub const fn new() -> Self {
        Self::const_new()
    }
}

impl<B: Backend> WaitSyncList<B> {
    pub const fn const_new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
            lock: Mutex::const_new(false),
        }
    }

    #[inline]
    fn id(&self) -> usize {
        self as *const Self as usize
    }

    /// Link `sync` at the front of the list
    ///
    /// # Safety
    ///
    /// `sync` must stay alive and must not move until it is removed or the
    /// list is dropped.
    pub unsafe fn push(&self, sync: &WaitSync<B>) -> SyncResult<()> {
        if sync.is_linked() {
            return Err(SyncError::BadParam("wait-sync is already linked"));
        }

        let _guard = self.lock.guard()?;
        let node = sync as *const WaitSync<B> as *mut WaitSync<B>;
        let head = self.head.load(Ordering::Relaxed);

        sync.prev.store(ptr::null_mut(), Ordering::Relaxed);
        sync.next.store(head, Ordering::Relaxed);
        if let Some(first) = head.as_ref() {
            first.prev.store(node, Ordering::Relaxed);
        }
        self.head.store(node, Ordering::Relaxed);
        sync.list.store(self.id(), Ordering::Release);
        self.len.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Unlink `sync`; returns false if it was not in this list
    pub fn remove(&self, sync: &WaitSync<B>) -> SyncResult<bool> {
        if sync.list.load(Ordering::Acquire) != self.id() {
            return Ok(false);
        }

        let _guard = self.lock.guard()?;
        // A concurrent remove may have won the lock first
        if sync.list.load(Ordering::Acquire) != self.id() {
            return Ok(false);
        }
        let prev = sync.prev.swap(ptr::null_mut(), Ordering::Relaxed);
        let next = sync.next.swap(ptr::null_mut(), Ordering::Relaxed);

        // SAFETY: linked nodes are alive per the `push` contract
        unsafe {
            match prev.as_ref() {
                Some(before) => before.next.store(next, Ordering::Relaxed),
                None => self.head.store(next, Ordering::Relaxed),
            }
            if let Some(after) = next.as_ref() {
                after.prev.store(prev, Ordering::Relaxed);
            }
        }

        sync.list.store(0, Ordering::Release);
        self.len.fetch_sub(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Visit every linked wait-sync, most recently pushed first
    ///
    /// The list lock is held throughout: `f` must not push or remove.
    pub fn for_each(&self, mut f: impl FnMut(&WaitSync<B>)) -> SyncResult<()> {
        let _guard = self.lock.guard()?;
        let mut cursor = self.head.load(Ordering::Relaxed);
        // SAFETY: linked nodes are alive per the `push` contract
        while let Some(sync) = unsafe { cursor.as_ref() } {
            f(sync);
            cursor = sync.next.load(Ordering::Relaxed);
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<B: Backend> Default for WaitSyncList<B> {
    fn default() -> Self {
        Self::const_new()
    }
}

impl<B: Backend> Drop for WaitSyncList<B> {
    fn drop(&mut self) {
        let mut cursor = *self.head.get_mut();
        // SAFETY: linked nodes are alive per the `push` contract
        while let Some(sync) = unsafe { cursor.as_ref() } {
            cursor = sync.next.swap(ptr::null_mut(), Ordering::Relaxed);
            sync.prev.store(ptr::null_mut(), Ordering::Relaxed);
            sync.list.store(0, Ordering::Release);
        }
    }
}
