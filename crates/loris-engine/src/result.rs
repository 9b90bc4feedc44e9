//! Machine-readable build reports.

use serde::Serialize;
use std::fmt;

/// Statistics of one state-space generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildStatistics {
    /// States kept in the chain.
    pub states: usize,
    /// Transitions, merged parallel edges counted once.
    pub transitions: usize,
    /// Successor expansions that mapped onto an already known canonical state.
    pub deduplicated: usize,
    /// States deferred by the approximation bound.
    pub deferred: usize,
    /// BFS layers explored.
    pub layers: usize,
}

impl fmt::Display for BuildStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} states, {} transitions, {} deduplicated, {} deferred, {} layers",
            self.states, self.transitions, self.deduplicated, self.deferred, self.layers
        )
    }
}
