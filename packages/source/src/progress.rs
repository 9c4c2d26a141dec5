//! Progress reporting for fan-out dispatches.
//!
//! A dispatch sets the total to the number of enabled sources and ticks once
//! per source as its batch arrives. Rendering (e.g. `indicatif` bars) lives
//! in the binaries.

use std::sync::Arc;

/// Receives dispatch progress.
///
/// Implementations must be `Send + Sync` because ticks come from spawned
/// tasks when dispatching through a channel.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of sources being queried.
    fn set_total(&self, total: u64);

    /// Records `delta` more completed sources.
    fn inc(&self, delta: u64);

    /// Updates the message shown alongside the indicator.
    fn set_message(&self, msg: String);

    /// Marks the dispatch as complete.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
