//! Progress reporting trait for the enrichment pipeline.
//!
//! Decouples progress reporting from any specific rendering backend
//! (progress bars, log-only reporting, or silence). A rendering
//! implementation is provided upstream by the CLI crates.

use std::sync::Arc;

/// Trait for reporting progress from long-running operations.
///
/// Implementations must be `Send + Sync` so a single reporter can be
/// shared `Arc`-style across the pipeline.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work (enables percentage/ETA).
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A no-op implementation of [`ProgressCallback`] that silently ignores
/// all progress updates. Useful for tests and non-interactive runs.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`] instance for convenient use.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
