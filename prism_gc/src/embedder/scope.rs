//! Batching of wrapper references found during marking.

use std::ffi::c_void;
use std::ptr::NonNull;

use super::local::LocalEmbedderTracer;
use super::{EmbedderObject, WrapperInfo};

/// Wrappers collected before a batch is handed to the embedder.
pub const WRAPPER_CACHE_SIZE: usize = 1000;

/// Read the type/instance pair out of an API wrapper.
///
/// Returns `None` if either field does not hold an aligned pointer or the
/// type field is null.
pub fn extract_wrapper_info<O: EmbedderObject + ?Sized>(object: &O) -> Option<WrapperInfo> {
    debug_assert!(object.embedder_field_count() >= 2);
    let type_info = NonNull::new(object.aligned_pointer(0)?)?;
    let instance: *mut c_void = object.aligned_pointer(1)?;
    Some(WrapperInfo {
        type_info,
        instance,
    })
}

/// Collects wrappers while marking and forwards them to the remote tracer
/// in batches of [`WRAPPER_CACHE_SIZE`]. Whatever is left is flushed on drop.
pub struct ProcessingScope<'a> {
    tracer: &'a mut LocalEmbedderTracer,
    cache: Vec<WrapperInfo>,
}

impl<'a> ProcessingScope<'a> {
    pub fn new(tracer: &'a mut LocalEmbedderTracer) -> Self {
        Self {
            tracer,
            cache: Vec::with_capacity(WRAPPER_CACHE_SIZE),
        }
    }

    /// Record `object` if it is a wrapper with valid embedder fields.
    pub fn trace_possible_wrapper<O: EmbedderObject + ?Sized>(&mut self, object: &O) {
        if object.embedder_field_count() < 2 {
            return;
        }
        if let Some(info) = extract_wrapper_info(object) {
            self.cache.push(info);
        }
        self.flush_if_full();
    }

    /// Record an already extracted wrapper.
    pub fn add_wrapper_info(&mut self, info: WrapperInfo) {
        self.cache.push(info);
        self.flush_if_full();
    }

    /// Wrappers waiting for the next flush.
    #[inline]
    pub fn pending(&self) -> usize {
        self.cache.len()
    }

    fn flush_if_full(&mut self) {
        if self.cache.len() >= WRAPPER_CACHE_SIZE {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let batch = std::mem::replace(&mut self.cache, Vec::with_capacity(WRAPPER_CACHE_SIZE));
        match self.tracer.remote_mut() {
            Some(remote) => {
                tracing::trace!(count = batch.len(), "flushing wrapper batch");
                remote.register_references(batch);
            }
            None => tracing::trace!(count = batch.len(), "no remote tracer, wrapper batch dropped"),
        }
    }
}

impl std::fmt::Debug for ProcessingScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingScope")
            .field("pending", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Drop for ProcessingScope<'_> {
    fn drop(&mut self) {
        if !self.cache.is_empty() {
            self.flush();
        }
    }
}
