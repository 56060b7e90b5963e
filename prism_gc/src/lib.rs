//! Prism Garbage Collector: embedder tracing boundary.
//!
//! Objects created through the embedding API can keep embedder-side memory
//! alive, and vice versa. This crate is the seam between the collector and
//! the embedder's tracer:
//!
//! - **[`LocalEmbedderTracer`]**: collector-side handle that forwards
//!   prologue, epilogue, incremental steps and the final pause to an
//!   optional [`RemoteTracer`], and tracks embedder heap growth
//! - **[`ProcessingScope`]**: batches wrapper references found while marking
//!
//! # Usage
//!
//! ```
//! use prism_gc::{LocalEmbedderTracer, TraceFlags};
//!
//! let mut tracer = LocalEmbedderTracer::new();
//! // Without a remote tracer every call is a no-op.
//! tracer.trace_prologue(TraceFlags::FORCED);
//! assert!(tracer.trace(1.0));
//! tracer.trace_epilogue();
//! ```

#![warn(missing_debug_implementations)]

pub mod embedder;

mod stats;

pub use embedder::{
    EmbedderObject, EmbedderStackState, LocalEmbedderTracer, ProcessingScope, RemoteStats,
    RemoteTracer, TraceFlags, TraceSummary, WrapperInfo,
};
pub use stats::EmbedderStats;
