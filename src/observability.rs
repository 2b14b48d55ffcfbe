//! Metrics hooks for field reads and page fetches.

use std::time::Duration;

/// Receives timing and outcome events from field caches, readers and loaders.
///
/// All methods default to no-ops, so an implementation only overrides what
/// it records.
pub trait LazyMetrics: Send + Sync {
    /// A field read was served from its cell.
    fn record_hit(&self, _key: &str, _duration: Duration) {}

    /// A field read had to run its compute function.
    fn record_compute(&self, _key: &str, _duration: Duration) {}

    /// A field read, retrieval or page fetch failed.
    fn record_error(&self, _key: &str, _error: &str) {}

    /// A page was fetched by a reader.
    fn record_page(&self, _key: &str, _page: u32, _items: usize, _duration: Duration) {}
}

/// Default metrics sink that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl LazyMetrics for NoOpMetrics {}
