/*!
 * Synchronization Configuration
 *
 * Process-wide runtime settings for the synchronization layer. The backend
 * itself is fixed at build time; everything else can be set here before
 * the first primitive is used.
 */

use super::backend::BackendKind;
use crate::core::context;
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{DEFAULT_SPIN_LIMIT, ENV_DEBUG_THREADS, ENV_SPIN_LIMIT, ENV_USING_THREADS};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Run primitives multi-threaded (blocking waits)
    pub using_threads: bool,
    /// Log call sites of blocking-lock waits (debug builds)
    pub debug_threads: bool,
    /// Tight spins before a backoff yields
    pub spin_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            using_threads: false,
            debug_threads: false,
            spin_limit: DEFAULT_SPIN_LIMIT,
        }
    }
}

impl SyncConfig {
    /// One execution context: waits poll the progress engine
    pub const fn single_threaded() -> Self {
        Self {
            using_threads: false,
            debug_threads: false,
            spin_limit: DEFAULT_SPIN_LIMIT,
        }
    }

    /// Concurrent contexts: waits block on condition variables
    pub const fn multi_threaded() -> Self {
        Self {
            using_threads: true,
            debug_threads: false,
            spin_limit: DEFAULT_SPIN_LIMIT,
        }
    }

    /// Defaults overridden by `HPC_SYNC_*` environment variables
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();
        if let Some(value) = env_flag(ENV_USING_THREADS)? {
            config.using_threads = value;
        }
        if let Some(value) = env_flag(ENV_DEBUG_THREADS)? {
            config.debug_threads = value;
        }
        if let Ok(raw) = std::env::var(ENV_SPIN_LIMIT) {
            config.spin_limit = raw.trim().parse().map_err(|_| {
                SyncError::Configuration(format!("{ENV_SPIN_LIMIT}: expected an integer, got {raw:?}"))
            })?;
        }
        Ok(config)
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Install the configuration process-wide
    ///
    /// Returns whether threads are in use afterwards, which is false when
    /// thread support is not compiled in.
    pub fn apply(&self) -> bool {
        let using_threads = context::set_using_threads(self.using_threads);
        context::set_debug_threads(self.debug_threads);
        context::set_spin_limit(self.spin_limit);
        info!(
            backend = self.backend_name(),
            using_threads,
            debug_threads = self.debug_threads,
            spin_limit = self.spin_limit,
            "Synchronization configured"
        );
        using_threads
    }

    /// Name of the backend compiled into this build
    pub fn backend_name(&self) -> &'static str {
        BackendKind::active().name()
    }
}

fn env_flag(name: &str) -> SyncResult<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(SyncError::Configuration(format!(
                "{name}: expected a boolean, got {raw:?}"
            ))),
        },
        Err(_) => Ok(None),
    }
}
