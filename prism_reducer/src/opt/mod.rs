//! Graph optimization.
//!
//! The [`reducer`] module drives local rewrite rules over the graph until
//! none of them fires. Rules themselves are supplied by the compiler.

pub mod reducer;

pub use reducer::{Editor, GraphReducer, ReduceStats, Reducer, ReducerConfig, Reduction};
