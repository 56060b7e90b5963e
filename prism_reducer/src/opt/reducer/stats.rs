//! Graph reducer statistics.

/// Counters accumulated over the lifetime of a [`GraphReducer`](super::GraphReducer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceStats {
    /// Arbitration calls, i.e. nodes handed to the reducer list.
    pub reductions: usize,
    /// Reducer firings that mutated a node in place.
    pub in_place_changes: usize,
    /// Reducer firings that replaced a node by another one.
    pub replacements: usize,
    /// Nodes popped off the stack as finalized.
    pub nodes_visited: usize,
    /// Entries pushed onto the revisit queue.
    pub revisits_queued: usize,
    /// Queue entries dropped because the node's state changed while queued.
    pub stale_revisits: usize,
    /// Full passes restarted by the whole-graph revisit heuristic.
    pub whole_graph_restarts: usize,
    /// Rounds of reducer finalizers run.
    pub finalize_rounds: usize,
    /// Nodes turned into forwarding placeholders.
    pub placeholders_created: usize,
    /// Edges rewired away from a placeholder during traversal.
    pub placeholder_edges_resolved: usize,
    /// Nodes killed by the replacement protocol.
    pub nodes_killed: usize,
}

impl ReduceStats {
    /// Total reducer firings of either kind.
    pub fn changes(&self) -> usize {
        self.in_place_changes + self.replacements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes() {
        let stats = ReduceStats {
            in_place_changes: 3,
            replacements: 2,
            ..Default::default()
        };
        assert_eq!(stats.changes(), 5);
        assert_eq!(ReduceStats::default().changes(), 0);
    }
}
