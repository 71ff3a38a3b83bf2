/*!
 * Core Module
 * Execution contexts, limits and error handling
 */

pub mod context;
pub mod errors;
pub mod limits;

// Re-export for convenience
pub use errors::*;
