//! Graph reducer configuration.
//!
//! Every knob is a read-only input to a reduction run; the surrounding
//! compiler owns the values and builds one config per compilation.

/// Default cap on arbitration calls per reduction run.
pub const DEFAULT_MAX_REDUCTIONS: usize = 1 << 20;

/// Threshold value at which the whole-graph revisit heuristic is disabled.
pub const REVISIT_THRESHOLD_DISABLED: u32 = 100;

/// Configuration for [`GraphReducer`](super::GraphReducer).
///
/// # Example
///
/// ```
/// use prism_reducer::opt::reducer::ReducerConfig;
///
/// // Trade incremental revisits for whole-graph passes on hot compiles.
/// let config = ReducerConfig::latency().with_trace(true);
/// assert!(config.lazy_placeholders);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducerConfig {
    /// Emit a `debug` event for every reducer firing.
    ///
    /// Default: false
    pub trace_reductions: bool,

    /// Defer rewiring of a replaced node's uses through a placeholder while
    /// a whole-graph revisit is pending.
    ///
    /// Default: false
    pub lazy_placeholders: bool,

    /// Ratio (in percent) of traversed uses to visited nodes above which the
    /// reducer stops revisiting users one by one and restarts a full pass
    /// instead. Values of [`REVISIT_THRESHOLD_DISABLED`] or more turn the
    /// heuristic off.
    ///
    /// Default: 100 (disabled)
    pub revisit_threshold_percent: u32,

    /// Run the edge verifier before every eager edge rewrite.
    ///
    /// Default: on in debug builds, off in release builds
    pub verify_edges: bool,

    /// Maximum number of arbitration calls per run before the reducer gives
    /// up with [`ReduceError::ReductionLimitExceeded`](crate::ReduceError).
    /// `None` never gives up.
    ///
    /// Default: `Some(DEFAULT_MAX_REDUCTIONS)`
    pub max_reductions: Option<usize>,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            trace_reductions: false,
            lazy_placeholders: false,
            revisit_threshold_percent: REVISIT_THRESHOLD_DISABLED,
            verify_edges: cfg!(debug_assertions),
            max_reductions: Some(DEFAULT_MAX_REDUCTIONS),
        }
    }
}

impl ReducerConfig {
    /// Always revisit users incrementally; never restart a pass.
    pub fn eager() -> Self {
        Self::default()
    }

    /// Restart whole passes once incremental revisiting gets expensive, and
    /// defer edge rewiring through placeholders meanwhile.
    pub fn latency() -> Self {
        Self {
            lazy_placeholders: true,
            revisit_threshold_percent: 50,
            ..Default::default()
        }
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_reductions = enabled;
        self
    }

    pub fn with_lazy_placeholders(mut self, enabled: bool) -> Self {
        self.lazy_placeholders = enabled;
        self
    }

    pub fn with_revisit_threshold(mut self, percent: u32) -> Self {
        self.revisit_threshold_percent = percent;
        self
    }

    pub fn with_edge_verification(mut self, enabled: bool) -> Self {
        self.verify_edges = enabled;
        self
    }

    pub fn with_max_reductions(mut self, limit: Option<usize>) -> Self {
        self.max_reductions = limit;
        self
    }

    /// Whether the whole-graph revisit heuristic can ever fire.
    #[inline]
    pub fn revisit_threshold_enabled(&self) -> bool {
        self.revisit_threshold_percent < REVISIT_THRESHOLD_DISABLED
    }
}
