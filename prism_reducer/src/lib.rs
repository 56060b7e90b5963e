//! Fixpoint graph reducer for the Prism JIT.
//!
//! Drives an ordered set of rewrite rules over a sea-of-nodes graph until
//! no rule reports a change:
//! - Minimal sea-of-nodes IR with def-use chains
//! - Explicit-stack traversal that terminates on cyclic graphs
//! - Incremental revisiting, with a whole-graph restart past a threshold
//! - Lazy edge rewiring through forwarding placeholders

pub mod error;
pub mod ir;
pub mod opt;

pub use error::{ReduceError, Result};
pub use ir::{Graph, NodeId};
pub use opt::{Editor, GraphReducer, Reducer, ReducerConfig, Reduction};
