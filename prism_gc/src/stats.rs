//! Embedder tracing statistics.
//!
//! Tracks how fast the embedder traces its own heap so the collector can
//! budget incremental marking steps that include wrapper tracing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Statistics about embedder tracing activity.
#[derive(Debug)]
pub struct EmbedderStats {
    /// Embedder bytes covered by recorded tracing cycles.
    pub bytes_traced: AtomicU64,
    /// Time spent in recorded tracing cycles (nanoseconds).
    pub tracing_time_ns: AtomicU64,
    /// Number of recorded tracing cycles.
    pub cycles: AtomicU64,
}

impl EmbedderStats {
    /// Create new empty statistics.
    pub const fn new() -> Self {
        Self {
            bytes_traced: AtomicU64::new(0),
            tracing_time_ns: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
        }
    }

    /// Record one tracing cycle that covered `bytes` in `time_ms`.
    pub fn record_speed(&self, bytes: usize, time_ms: f64) {
        let time_ns = (time_ms.max(0.0) * 1_000_000.0).round() as u64;
        self.bytes_traced.fetch_add(bytes as u64, Ordering::Relaxed);
        self.tracing_time_ns.fetch_add(time_ns, Ordering::Relaxed);
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Total time spent in recorded cycles.
    pub fn tracing_time(&self) -> Duration {
        Duration::from_nanos(self.tracing_time_ns.load(Ordering::Relaxed))
    }

    /// Average tracing speed in bytes per millisecond, if anything was
    /// recorded.
    pub fn speed_bytes_per_ms(&self) -> Option<f64> {
        let ns = self.tracing_time_ns.load(Ordering::Relaxed);
        if ns == 0 {
            return None;
        }
        let bytes = self.bytes_traced.load(Ordering::Relaxed) as f64;
        Some(bytes / (ns as f64 / 1_000_000.0))
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.bytes_traced.store(0, Ordering::Relaxed);
        self.tracing_time_ns.store(0, Ordering::Relaxed);
        self.cycles.store(0, Ordering::Relaxed);
    }

    /// Log a summary at `debug` level.
    pub fn log_summary(&self) {
        tracing::debug!(
            cycles = self.cycles.load(Ordering::Relaxed),
            traced = %format_bytes(self.bytes_traced.load(Ordering::Relaxed)),
            time = ?self.tracing_time(),
            "embedder tracing statistics"
        );
    }
}

impl Default for EmbedderStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Format bytes in human-readable form.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
