/*!
 * System Limits and Constants
 *
 * Centralized location for the thresholds used by the synchronization layer.
 * Performance-critical constants are marked with [PERF].
 */

// =============================================================================
// SPINNING AND BACKOFF
// =============================================================================

/// Tight spins before a backoff starts yielding the execution context
/// [PERF] Covers the signaling window of a wait-sync release without a yield
pub const DEFAULT_SPIN_LIMIT: u32 = 64;

/// Upper bound on the exponent used by the tight spin phase (2^6 hints per step)
pub const SPIN_STEP_SHIFT_MAX: u32 = 6;

// =============================================================================
// THREAD-SPECIFIC STORAGE
// =============================================================================

/// Maximum number of live keys across the process
pub const TSD_MAX_KEYS: usize = 1024;

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Environment variable enabling thread support at runtime
pub const ENV_USING_THREADS: &str = "HPC_SYNC_THREADS";

/// Environment variable enabling call-site logging on blocking locks
pub const ENV_DEBUG_THREADS: &str = "HPC_SYNC_DEBUG_THREADS";

/// Environment variable overriding the backoff spin limit
pub const ENV_SPIN_LIMIT: &str = "HPC_SYNC_SPIN_LIMIT";

/// Environment variable selecting JSON trace output
pub const ENV_TRACE_JSON: &str = "HPC_SYNC_TRACE_JSON";
