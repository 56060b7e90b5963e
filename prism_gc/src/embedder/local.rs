//! Collector-side handle on the embedder tracer.

use super::{EmbedderStackState, RemoteTracer, TraceFlags};
use crate::stats::EmbedderStats;

/// Epilogues faster than this are too noisy to derive a tracing speed from.
pub const MIN_REPORTING_TIME_MS: f64 = 0.5;

/// Embedder allocation growth between two incremental-marking checks.
pub const EMBEDDER_ALLOCATED_THRESHOLD: usize = 128 * 1024;

/// Embedder heap size as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteStats {
    /// Live embedder bytes: the last epilogue's figure plus growth since.
    pub used_size: usize,
    /// Bytes the embedder allocated since the tracer was created.
    pub allocated_size: usize,
    /// `allocated_size` at which the next marking check is due.
    pub allocated_size_limit_for_check: usize,
}

/// Forwards collector events to an optional [`RemoteTracer`].
#[derive(Default)]
pub struct LocalEmbedderTracer {
    remote: Option<Box<dyn RemoteTracer>>,
    stack_state: EmbedderStackState,
    embedder_worklist_empty: bool,
    remote_stats: RemoteStats,
    stats: EmbedderStats,
}

impl LocalEmbedderTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or with `None`, remove) the remote tracer, returning the
    /// previous one.
    pub fn set_remote_tracer(
        &mut self,
        tracer: Option<Box<dyn RemoteTracer>>,
    ) -> Option<Box<dyn RemoteTracer>> {
        tracing::debug!(installed = tracer.is_some(), "remote tracer changed");
        std::mem::replace(&mut self.remote, tracer)
    }

    #[inline]
    pub fn in_use(&self) -> bool {
        self.remote.is_some()
    }

    pub(crate) fn remote_mut(&mut self) -> Option<&mut (dyn RemoteTracer + 'static)> {
        self.remote.as_deref_mut()
    }

    #[inline]
    pub fn remote_stats(&self) -> RemoteStats {
        self.remote_stats
    }

    #[inline]
    pub fn stats(&self) -> &EmbedderStats {
        &self.stats
    }

    #[inline]
    pub fn stack_state(&self) -> EmbedderStackState {
        self.stack_state
    }

    // =========================================================================
    // Tracing Cycle
    // =========================================================================

    pub fn trace_prologue(&mut self, flags: TraceFlags) {
        let Some(remote) = self.remote.as_deref_mut() else {
            return;
        };
        tracing::debug!(?flags, "embedder trace prologue");
        self.embedder_worklist_empty = false;
        remote.trace_prologue(flags);
    }

    pub fn trace_epilogue(&mut self) {
        let Some(remote) = self.remote.as_deref_mut() else {
            return;
        };
        let summary = remote.trace_epilogue();
        tracing::debug!(
            allocated_size = summary.allocated_size,
            time_ms = summary.time_ms,
            "embedder trace epilogue"
        );
        self.remote_stats.used_size = summary.allocated_size;
        // Check again on the next reported growth.
        self.remote_stats.allocated_size_limit_for_check = 0;
        if summary.time_ms > MIN_REPORTING_TIME_MS {
            self.stats.record_speed(summary.allocated_size, summary.time_ms);
        }
    }

    pub fn enter_final_pause(&mut self) {
        let Some(remote) = self.remote.as_deref_mut() else {
            return;
        };
        remote.enter_final_pause(self.stack_state);
        // Follow-up collections may start from callbacks with another stack.
        self.stack_state = EmbedderStackState::MayContainHeapPointers;
    }

    /// Trace until `deadline_ms`. Returns whether the embedder is done.
    pub fn trace(&mut self, deadline_ms: f64) -> bool {
        match self.remote.as_deref_mut() {
            Some(remote) => remote.advance_tracing(deadline_ms),
            None => true,
        }
    }

    pub fn is_remote_tracing_done(&self) -> bool {
        self.remote.as_deref().map_or(true, |remote| remote.is_tracing_done())
    }

    pub fn set_embedder_stack_state_for_next_finalization(&mut self, state: EmbedderStackState) {
        let Some(remote) = self.remote.as_deref_mut() else {
            return;
        };
        self.stack_state = state;
        if state == EmbedderStackState::NoHeapPointers {
            remote.notify_empty_embedder_stack();
        }
    }

    // =========================================================================
    // Worklist / Allocation
    // =========================================================================

    #[inline]
    pub fn set_embedder_worklist_empty(&mut self, empty: bool) {
        self.embedder_worklist_empty = empty;
    }

    #[inline]
    pub fn embedder_worklist_empty(&self) -> bool {
        self.embedder_worklist_empty
    }

    /// Whether marking may finish as far as the embedder is concerned.
    pub fn should_finalize_incremental_marking(&self) -> bool {
        !self.in_use() || (self.is_remote_tracing_done() && self.embedder_worklist_empty)
    }

    /// Account for `bytes` of new embedder allocation. Returns whether the
    /// caller should check if incremental marking needs to start.
    pub fn increase_allocated_size(&mut self, bytes: usize) -> bool {
        let stats = &mut self.remote_stats;
        stats.used_size += bytes;
        stats.allocated_size += bytes;
        if stats.allocated_size > stats.allocated_size_limit_for_check {
            stats.allocated_size_limit_for_check =
                stats.allocated_size + EMBEDDER_ALLOCATED_THRESHOLD;
            return true;
        }
        false
    }

    pub fn decrease_allocated_size(&mut self, bytes: usize) {
        debug_assert!(
            self.remote_stats.used_size >= bytes,
            "embedder freed more than it reported"
        );
        self.remote_stats.used_size = self.remote_stats.used_size.saturating_sub(bytes);
    }
}

impl std::fmt::Debug for LocalEmbedderTracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedderTracer")
            .field("in_use", &self.in_use())
            .field("stack_state", &self.stack_state)
            .field("embedder_worklist_empty", &self.embedder_worklist_empty)
            .field("remote_stats", &self.remote_stats)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::embedder::{TraceSummary, WrapperInfo};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Everything a recording tracer saw.
    #[derive(Debug, Default)]
    pub(crate) struct Calls {
        pub prologues: Vec<TraceFlags>,
        pub final_pauses: Vec<EmbedderStackState>,
        pub empty_stack_notifications: usize,
        pub batches: Vec<usize>,
        pub advance_deadlines: Vec<f64>,
    }

    pub(crate) struct RecordingTracer {
        pub calls: Rc<RefCell<Calls>>,
        pub summary: TraceSummary,
        pub done: bool,
    }

    impl RecordingTracer {
        pub fn new(calls: &Rc<RefCell<Calls>>) -> Self {
            Self {
                calls: calls.clone(),
                summary: TraceSummary::default(),
                done: false,
            }
        }
    }

    impl RemoteTracer for RecordingTracer {
        fn trace_prologue(&mut self, flags: TraceFlags) {
            self.calls.borrow_mut().prologues.push(flags);
        }

        fn trace_epilogue(&mut self) -> TraceSummary {
            self.summary
        }

        fn enter_final_pause(&mut self, stack_state: EmbedderStackState) {
            self.calls.borrow_mut().final_pauses.push(stack_state);
        }

        fn advance_tracing(&mut self, deadline_ms: f64) -> bool {
            self.calls.borrow_mut().advance_deadlines.push(deadline_ms);
            self.done
        }

        fn is_tracing_done(&self) -> bool {
            self.done
        }

        fn notify_empty_embedder_stack(&mut self) {
            self.calls.borrow_mut().empty_stack_notifications += 1;
        }

        fn register_references(&mut self, references: Vec<WrapperInfo>) {
            self.calls.borrow_mut().batches.push(references.len());
        }
    }

    #[test]
    fn test_without_remote_everything_is_done() {
        let mut tracer = LocalEmbedderTracer::new();
        assert!(!tracer.in_use());

        tracer.trace_prologue(TraceFlags::FORCED);
        tracer.trace_epilogue();
        tracer.enter_final_pause();
        assert!(tracer.trace(10.0));
        assert!(tracer.is_remote_tracing_done());
        assert!(tracer.should_finalize_incremental_marking());

        tracer.set_embedder_stack_state_for_next_finalization(EmbedderStackState::NoHeapPointers);
        assert_eq!(tracer.stack_state(), EmbedderStackState::MayContainHeapPointers);
    }

    #[test]
    fn test_forwards_to_remote() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut tracer = LocalEmbedderTracer::new();
        let previous = tracer.set_remote_tracer(Some(Box::new(RecordingTracer::new(&calls))));
        assert!(previous.is_none());
        assert!(tracer.in_use());

        tracer.trace_prologue(TraceFlags::REDUCE_MEMORY | TraceFlags::FORCED);
        assert!(!tracer.embedder_worklist_empty());
        assert!(!tracer.trace(5.0));
        assert!(!tracer.should_finalize_incremental_marking());

        let calls = calls.borrow();
        assert_eq!(calls.prologues, vec![TraceFlags::REDUCE_MEMORY | TraceFlags::FORCED]);
        assert_eq!(calls.advance_deadlines, vec![5.0]);
    }

    #[test]
    fn test_final_pause_resets_stack_state() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut tracer = LocalEmbedderTracer::new();
        tracer.set_remote_tracer(Some(Box::new(RecordingTracer::new(&calls))));

        tracer.set_embedder_stack_state_for_next_finalization(EmbedderStackState::NoHeapPointers);
        assert_eq!(calls.borrow().empty_stack_notifications, 1);
        tracer.enter_final_pause();
        tracer.enter_final_pause();

        assert_eq!(
            calls.borrow().final_pauses,
            vec![
                EmbedderStackState::NoHeapPointers,
                EmbedderStackState::MayContainHeapPointers
            ]
        );
    }

    #[test]
    fn test_epilogue_updates_stats() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut remote = RecordingTracer::new(&calls);
        remote.summary = TraceSummary {
            allocated_size: 1000,
            time_ms: 0.25,
        };
        let mut tracer = LocalEmbedderTracer::new();
        tracer.set_remote_tracer(Some(Box::new(remote)));

        tracer.increase_allocated_size(10);
        tracer.trace_epilogue();
        assert_eq!(tracer.remote_stats().used_size, 1000);
        assert_eq!(tracer.remote_stats().allocated_size_limit_for_check, 0);
        // Too short to be meaningful.
        assert_eq!(tracer.stats().speed_bytes_per_ms(), None);

        let mut remote = RecordingTracer::new(&calls);
        remote.summary = TraceSummary {
            allocated_size: 2000,
            time_ms: 2.0,
        };
        tracer.set_remote_tracer(Some(Box::new(remote)));
        tracer.trace_epilogue();
        assert_eq!(tracer.stats().speed_bytes_per_ms(), Some(1000.0));
    }

    #[test]
    fn test_allocation_limit_checks() {
        let mut tracer = LocalEmbedderTracer::new();
        assert!(tracer.increase_allocated_size(100));
        assert!(!tracer.increase_allocated_size(EMBEDDER_ALLOCATED_THRESHOLD));
        assert!(tracer.increase_allocated_size(1));

        let stats = tracer.remote_stats();
        assert_eq!(stats.allocated_size, EMBEDDER_ALLOCATED_THRESHOLD + 101);
        assert_eq!(
            stats.allocated_size_limit_for_check,
            2 * EMBEDDER_ALLOCATED_THRESHOLD + 101
        );

        tracer.decrease_allocated_size(101);
        assert_eq!(tracer.remote_stats().used_size, EMBEDDER_ALLOCATED_THRESHOLD);
    }

    #[test]
    fn test_worklist_gates_finalization() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut remote = RecordingTracer::new(&calls);
        remote.done = true;
        let mut tracer = LocalEmbedderTracer::new();
        tracer.set_remote_tracer(Some(Box::new(remote)));

        tracer.trace_prologue(TraceFlags::empty());
        assert!(!tracer.should_finalize_incremental_marking());
        tracer.set_embedder_worklist_empty(true);
        assert!(tracer.should_finalize_incremental_marking());
    }
}
