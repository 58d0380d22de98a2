//! Solver configuration and resource limits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tunable parameters for a [`crate::Solver`].
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Widths up to this limit get exact bit-set viable domains; wider
    /// variables use the over-approximating sparse representation.
    pub dense_width_limit: u32,
    /// Give up with `Unknown` after this many conflicts.
    pub max_conflicts: Option<u64>,
    /// Give up with `Unknown` after this many decisions.
    pub max_decisions: Option<u64>,
    /// External cancellation flag, polled by the search loop.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            dense_width_limit: 16,
            max_conflicts: None,
            max_decisions: None,
            cancel: None,
        }
    }
}

impl SolverConfig {
    /// Whether external cancellation was requested.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = SolverConfig::default();
        assert_eq!(config.dense_width_limit, 16);
        assert!(!config.cancelled());
    }

    #[test]
    fn test_cancel_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let config = SolverConfig {
            cancel: Some(Arc::clone(&flag)),
            ..SolverConfig::default()
        };
        assert!(!config.cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(config.cancelled());
    }
}
