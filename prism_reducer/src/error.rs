//! Error types for graph reduction.

use thiserror::Error;

use crate::ir::NodeId;

pub type Result<T, E = ReduceError> = std::result::Result<T, E>;

/// Failure of a reduction run.
///
/// Structural invariant violations are not reported here: they are bugs and
/// abort through assertions. This covers the one failure a well-formed graph
/// can still hit, a reducer set that never converges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReduceError {
    #[error(
        "reduction limit of {limit} exceeded while reducing {node}; \
         a reducer is likely not monotonic"
    )]
    ReductionLimitExceeded { limit: usize, node: NodeId },
}
