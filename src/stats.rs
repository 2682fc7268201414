//! # Statistics Module
//!
//! Per-crawl counters and the tracing subscriber bootstrap.
//!
//! ## Overview
//!
//! `CrawlStats` tracks what one crawl has done so far: seeds enqueued, pages
//! fetched, fetch failures, items scraped, and control-loop ticks. The
//! counters are plain atomics updated from the seeding task, every worker,
//! and the manager, and a `Display` implementation renders a one-look summary
//! for the shutdown log line.
//!
//! ## Key Metrics Tracked
//!
//! - **Seeding**: requests enqueued by the startup and background seed paths
//! - **Fetching**: successful fetches and worker-level failures
//! - **Items**: items accepted by the item store
//! - **Control Loop**: ticks evaluated by the manager
//!
//! `init_tracing` installs the process-wide `tracing` subscriber exactly
//! once, honoring `RUST_LOG` and defaulting to `info`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

static TRACING: OnceLock<()> = OnceLock::new();

/// Installs the global tracing subscriber. Safe to call more than once; only
/// the first call has any effect.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Counters describing the progress of one crawl.
#[derive(Debug)]
pub struct CrawlStats {
    start_time: Instant,
    /// Seed requests enqueued, counting both the synchronous head and the
    /// background tail.
    pub requests_seeded: AtomicU64,
    /// Requests fetched successfully by workers.
    pub requests_fetched: AtomicU64,
    /// Requests that failed to fetch or parse.
    pub requests_failed: AtomicU64,
    /// Items accepted by the item store.
    pub items_scraped: AtomicU64,
    /// Control-loop ticks evaluated.
    pub ticks: AtomicU64,
}

struct StatsSnapshot {
    requests_seeded: u64,
    requests_fetched: u64,
    requests_failed: u64,
    items_scraped: u64,
    ticks: u64,
    elapsed_secs: u64,
}

impl CrawlStats {
    /// Creates a new, atomically reference-counted counter set.
    pub fn new() -> Arc<Self> {
        Arc::new(CrawlStats {
            start_time: Instant::now(),
            requests_seeded: AtomicU64::new(0),
            requests_fetched: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            items_scraped: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        })
    }

    /// Increments the count of enqueued seed requests.
    pub(crate) fn increment_requests_seeded(&self) {
        self.requests_seeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of successful fetches.
    pub(crate) fn increment_requests_fetched(&self) {
        self.requests_fetched.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of failed fetches or parses.
    pub(crate) fn increment_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of stored items.
    pub(crate) fn increment_items_scraped(&self) {
        self.items_scraped.fetch_add(1, Ordering::SeqCst);
    }

    /// Increments the count of control-loop ticks.
    pub(crate) fn increment_ticks(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_seeded: self.requests_seeded.load(Ordering::SeqCst),
            requests_fetched: self.requests_fetched.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            items_scraped: self.items_scraped.load(Ordering::SeqCst),
            ticks: self.ticks.load(Ordering::SeqCst),
            elapsed_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for CrawlStats {
    fn default() -> Self {
        CrawlStats {
            start_time: Instant::now(),
            requests_seeded: AtomicU64::new(0),
            requests_fetched: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            items_scraped: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
        }
    }
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        write!(
            f,
            "seeded: {}, fetched: {}, failed: {}, items: {}, ticks: {}, elapsed: {}s",
            snapshot.requests_seeded,
            snapshot.requests_fetched,
            snapshot.requests_failed,
            snapshot.items_scraped,
            snapshot.ticks,
            snapshot.elapsed_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = CrawlStats::new();
        stats.increment_requests_seeded();
        stats.increment_requests_seeded();
        stats.increment_requests_fetched();
        stats.increment_items_scraped();
        stats.increment_ticks();

        assert_eq!(stats.requests_seeded.load(Ordering::SeqCst), 2);
        assert_eq!(stats.requests_fetched.load(Ordering::SeqCst), 1);
        assert_eq!(stats.requests_failed.load(Ordering::SeqCst), 0);
        assert_eq!(stats.items_scraped.load(Ordering::SeqCst), 1);
        assert_eq!(stats.ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn display_summarizes_every_counter() {
        let stats = CrawlStats::new();
        stats.increment_requests_fetched();
        stats.increment_items_scraped();
        let rendered = stats.to_string();
        assert!(rendered.contains("fetched: 1"));
        assert!(rendered.contains("items: 1"));
        assert!(rendered.contains("ticks: 0"));
    }
}
