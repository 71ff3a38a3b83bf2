/*!
 * Threading Backends
 *
 * Exactly one backend is active per build:
 * - `Kernel` (default): preemptive kernel threads
 * - `Tasklet` (feature `tasklet`): cooperative ULTs with handle-based objects
 * - `Feb` (feature `feb`): cooperative ULTs with full/empty-bit words
 *
 * Every backend is compiled regardless, so any of them can be named
 * explicitly as the type parameter of a primitive.
 */

pub mod coop;
pub mod feb;
pub mod kernel;
pub(crate) mod owner;
pub mod tasklet;

pub use feb::{Feb, FebCondition, FebMutex, FebWord};
pub use kernel::{Kernel, KernelCondition, KernelMutex};
pub use tasklet::{Tasklet, TaskletCondition, TaskletMutex};

#[cfg(all(feature = "tasklet", feature = "feb"))]
compile_error!("features `tasklet` and `feb` are mutually exclusive");

/// The build's active backend
#[cfg(feature = "tasklet")]
pub type ActiveBackend = Tasklet;

/// The build's active backend
#[cfg(feature = "feb")]
pub type ActiveBackend = Feb;

/// The build's active backend
#[cfg(not(any(feature = "tasklet", feature = "feb")))]
pub type ActiveBackend = Kernel;

/// Backend identity, for configuration and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Kernel,
    Tasklet,
    Feb,
}

impl BackendKind {
    /// The backend compiled in as [`ActiveBackend`]
    pub const fn active() -> Self {
        if cfg!(feature = "tasklet") {
            BackendKind::Tasklet
        } else if cfg!(feature = "feb") {
            BackendKind::Feb
        } else {
            BackendKind::Kernel
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BackendKind::Kernel => "kernel",
            BackendKind::Tasklet => "tasklet",
            BackendKind::Feb => "feb",
        }
    }

    /// Whether blocking yields to a user-level scheduler
    pub const fn is_cooperative(self) -> bool {
        !matches!(self, BackendKind::Kernel)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::traits::Backend;

    #[test]
    fn test_active_kind_matches_alias() {
        assert_eq!(BackendKind::active().name(), ActiveBackend::NAME);
        assert_eq!(
            BackendKind::active().is_cooperative(),
            ActiveBackend::COOPERATIVE
        );
    }

    #[test]
    fn test_kind_serde_names() {
        let json = serde_json::to_string(&BackendKind::Tasklet).unwrap();
        assert_eq!(json, "\"tasklet\"");
        let kind: BackendKind = serde_json::from_str("\"feb\"").unwrap();
        assert_eq!(kind, BackendKind::Feb);
    }
}
