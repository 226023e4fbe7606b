// Performance metrics module
//
// Lightweight counters for monitoring batch generation performance

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Batch generation metrics
///
/// Uses atomic operations for thread-safe tracking without locks. Counters are
/// bumped by the conversion workers as jobs complete and a summary is logged
/// after each batch.
#[derive(Debug)]
pub struct Metrics {
    /// Documents converted successfully
    pub documents_converted: AtomicUsize,

    /// Documents that failed to convert
    pub documents_failed: AtomicUsize,

    /// Individual artifacts rendered (a document converted with both themes
    /// counts twice)
    pub artifacts_rendered: AtomicUsize,

    /// Total renderer time in milliseconds
    pub total_render_time_ms: AtomicU64,

    /// Creation time of this metrics instance
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            documents_converted: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            artifacts_rendered: AtomicUsize::new(0),
            total_render_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_document_converted(&self) {
        self.documents_converted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_artifact_rendered(&self) {
        self.artifacts_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_render_time(&self, duration: Duration) {
        self.total_render_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Time elapsed since this metrics instance was created
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average renderer time per artifact in milliseconds
    pub fn avg_render_time_ms(&self) -> f64 {
        let total = self.total_render_time_ms.load(Ordering::Relaxed);
        let count = self.artifacts_rendered.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log a metrics summary
    pub fn log_summary(&self) {
        tracing::info!(
            "Documents: {} converted, {} failed; {} artifacts rendered",
            self.documents_converted.load(Ordering::Relaxed),
            self.documents_failed.load(Ordering::Relaxed),
            self.artifacts_rendered.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Total render time: {:.2}s (avg: {:.2}ms per artifact), elapsed {:.2}s",
            self.total_render_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
            self.avg_render_time_ms(),
            self.uptime().as_secs_f64()
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
