/*!
 * Thread-Specific Storage
 *
 * Key creation goes through the active backend. Keys created from the main
 * context are also recorded, with their destructor, in a process-wide
 * registry: the main context never passes through the thread-exit path
 * that runs destructors for other contexts, so [`keys_destruct`] replays
 * them explicitly at shutdown.
 */

pub mod slots;

pub use slots::{Destructor, TsdKey};

use super::backend::ActiveBackend;
use super::traits::Backend;
use crate::core::context;
use crate::core::errors::SyncResult;
use parking_lot::Mutex;
use tracing::{debug, warn};

static REGISTRY: Mutex<Vec<(TsdKey, Option<Destructor>)>> = parking_lot::const_mutex(Vec::new());

/// Create a key on the active backend
pub fn key_create(destructor: Option<Destructor>) -> SyncResult<TsdKey> {
    key_create_on::<ActiveBackend>(destructor)
}

/// Create a key on backend `B`, recording it if called from the main context
pub fn key_create_on<B: Backend>(destructor: Option<Destructor>) -> SyncResult<TsdKey> {
    let key = B::key_create(destructor)?;
    if context::is_main() {
        REGISTRY.lock().push((key, destructor));
    }
    Ok(key)
}

pub fn key_delete(key: TsdKey) -> SyncResult<()> {
    ActiveBackend::key_delete(key)
}

/// Store the calling context's value for `key`
pub fn set(key: TsdKey, value: *mut ()) -> SyncResult<()> {
    ActiveBackend::set_specific(key, value)
}

/// The calling context's value for `key`, null when unset
pub fn get(key: TsdKey) -> SyncResult<*mut ()> {
    ActiveBackend::get_specific(key)
}

/// Number of keys awaiting shutdown replay
pub fn registered_keys() -> usize {
    REGISTRY.lock().len()
}

/// Run registered destructors for the calling context and empty the registry
///
/// Each non-null value gets its destructor exactly once and its slot is
/// cleared before the destructor runs. Keys deleted since registration are
/// skipped. A failure on one key does not stop the replay; the first error
/// is returned once every key has been visited. Calling this again finds an
/// empty registry and does nothing.
pub fn keys_destruct() -> SyncResult<()> {
    let entries = std::mem::take(&mut *REGISTRY.lock());
    if entries.is_empty() {
        return Ok(());
    }
    debug!(keys = entries.len(), "Replaying TSD destructors");

    let mut first_error = None;
    for (key, destructor) in entries {
        let value = match ActiveBackend::get_specific(key) {
            Ok(value) => value,
            Err(_) => {
                debug!(key = key.index(), "Skipping deleted TSD key");
                continue;
            }
        };
        if value.is_null() {
            continue;
        }
        if let Err(err) = ActiveBackend::set_specific(key, std::ptr::null_mut()) {
            warn!(key = key.index(), error = %err, "Failed to clear TSD slot");
            first_error.get_or_insert(err);
        }
        // Destructors may delete their own key
        if let Some(destructor) = destructor {
            destructor(value);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
