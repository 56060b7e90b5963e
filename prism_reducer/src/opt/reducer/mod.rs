//! Fixpoint graph reduction.
//!
//! A [`GraphReducer`] walks the graph depth-first from the end node, hands
//! every node to an ordered list of [`Reducer`]s once its inputs are done,
//! and applies what they ask for until nothing fires any more.
//!
//! # Reducer Contract
//!
//! A reducer looks at one node and returns one of:
//!
//! - [`Reduction::Unchanged`]: nothing to do.
//! - [`Reduction::Replaced`] naming the node itself: the node was mutated in
//!   place (new operator or inputs). Arbitration restarts from the first
//!   reducer, skipping the one that just fired.
//! - [`Reduction::Replaced`] naming another node: every use of the node moves
//!   to the replacement. Nodes created during the reduction are recognised
//!   by id and keep pointing at the original.
//!
//! Reducers edit the graph through the [`Editor`] they are handed, which also
//! lets them replace or revisit nodes other than the one being reduced.

mod config;
mod editor;
mod graph_reducer;
mod state;
mod stats;

pub use config::{ReducerConfig, DEFAULT_MAX_REDUCTIONS, REVISIT_THRESHOLD_DISABLED};
pub use editor::Editor;
pub use graph_reducer::GraphReducer;
pub use state::{NodeState, StateTable};
pub use stats::ReduceStats;

use crate::ir::NodeId;

// =============================================================================
// Reduction
// =============================================================================

/// Outcome of one reducer on one node.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Unchanged,
    /// Node was changed in place (payload is the node itself) or should be
    /// replaced by the payload.
    Replaced(NodeId),
}

impl Reduction {
    #[inline]
    pub const fn unchanged() -> Self {
        Reduction::Unchanged
    }

    #[inline]
    pub const fn replace(replacement: NodeId) -> Self {
        Reduction::Replaced(replacement)
    }

    /// In-place change of `node`.
    #[inline]
    pub const fn changed(node: NodeId) -> Self {
        Reduction::Replaced(node)
    }

    #[inline]
    pub const fn is_changed(&self) -> bool {
        matches!(self, Reduction::Replaced(_))
    }

    #[inline]
    pub const fn replacement(&self) -> Option<NodeId> {
        match *self {
            Reduction::Unchanged => None,
            Reduction::Replaced(id) => Some(id),
        }
    }
}

// =============================================================================
// Reducer
// =============================================================================

/// A local rewrite rule.
pub trait Reducer {
    /// Name used in reduction traces.
    fn name(&self) -> &'static str;

    /// Try to reduce `node`.
    fn reduce(&mut self, node: NodeId, editor: &mut Editor<'_>) -> Reduction;

    /// Called whenever the reducer runs out of work. May revisit nodes to
    /// schedule more reductions.
    fn finalize(&mut self, _editor: &mut Editor<'_>) {}
}
