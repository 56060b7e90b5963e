//! Embedder heap tracing boundary.
//!
//! Objects that wrap embedder-side data (API wrappers) keep that data alive
//! only if the embedder's own heap is traced together with ours. The
//! embedder plugs in a [`RemoteTracer`]; the collector talks to it solely
//! through [`LocalEmbedderTracer`], which turns every call into a no-op while
//! no remote tracer is installed.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐        ┌──────────────────────┐
//! │    collector     │        │       embedder       │
//! │                  │        │                      │
//! │ LocalEmbedder-   │───────▶│  impl RemoteTracer   │
//! │ Tracer           │        │                      │
//! │   ProcessingScope│───────▶│  register_references │
//! └──────────────────┘        └──────────────────────┘
//! ```

mod local;
mod scope;

pub use local::{
    LocalEmbedderTracer, RemoteStats, EMBEDDER_ALLOCATED_THRESHOLD, MIN_REPORTING_TIME_MS,
};
pub use scope::{extract_wrapper_info, ProcessingScope, WRAPPER_CACHE_SIZE};

use std::ffi::c_void;
use std::ptr::NonNull;

use bitflags::bitflags;

bitflags! {
    /// Flags passed to the embedder when a tracing cycle starts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TraceFlags: u8 {
        /// The collection tries to free as much memory as possible.
        const REDUCE_MEMORY = 1 << 0;
        /// The collection was forced by the embedder or a test.
        const FORCED = 1 << 1;
    }
}

/// Whether the embedder's native stack may hold pointers into the heap at
/// the final pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderStackState {
    /// Unknown; the embedder must scan its stack conservatively.
    #[default]
    MayContainHeapPointers,
    NoHeapPointers,
}

/// Outcome the embedder reports at the end of a tracing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TraceSummary {
    /// Bytes allocated on the embedder heap after the cycle.
    pub allocated_size: usize,
    /// Time spent tracing, in milliseconds.
    pub time_ms: f64,
}

/// The two embedder fields of an API wrapper: a type descriptor and the
/// embedder-side instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperInfo {
    pub type_info: NonNull<c_void>,
    pub instance: *mut c_void,
}

/// Tracer for the embedder's heap.
pub trait RemoteTracer {
    /// A tracing cycle starts.
    fn trace_prologue(&mut self, flags: TraceFlags);

    /// A tracing cycle ended.
    fn trace_epilogue(&mut self) -> TraceSummary;

    /// The collector entered its atomic pause.
    fn enter_final_pause(&mut self, stack_state: EmbedderStackState);

    /// Trace until `deadline_ms`. Returns whether tracing is done.
    fn advance_tracing(&mut self, deadline_ms: f64) -> bool;

    fn is_tracing_done(&self) -> bool;

    /// The embedder stack holds no heap pointers for the next finalization.
    fn notify_empty_embedder_stack(&mut self) {}

    /// Wrappers discovered by the collector while marking.
    fn register_references(&mut self, references: Vec<WrapperInfo>);
}

/// A heap object that may carry embedder fields.
pub trait EmbedderObject {
    fn embedder_field_count(&self) -> usize;

    /// The aligned pointer stored in embedder field `index`, or `None` if the
    /// slot does not hold one.
    fn aligned_pointer(&self, index: usize) -> Option<*mut c_void>;
}
