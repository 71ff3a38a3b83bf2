/*!
 * Monitoring
 * Structured logging setup for the synchronization layer
 */

pub mod tracer;

pub use tracer::{init_tracing, try_init_test_tracing};
