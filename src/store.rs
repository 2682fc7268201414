//! Item storage keyed per crawl.
//!
//! Workers push every scraped item through an `ItemStore`; the control loop
//! reads the same store's per-crawl count to measure crawl velocity. The
//! trait keeps persistence out of the engine: `MemoryItemStore` is the
//! in-process reference implementation, and anything that can count items per
//! crawl (a database table, a message bus consumer) can stand in for it.

use crate::crawl::CrawlId;
use crate::error::EngineError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Destination for scraped items, counted per crawl.
#[async_trait]
pub trait ItemStore<I>: Send + Sync + 'static
where
    I: Send + 'static,
{
    /// Provisions the partition for a crawl. Fails if it already exists.
    async fn start(&self, crawl: &CrawlId) -> Result<(), EngineError>;

    /// Stores one scraped item.
    async fn store(&self, crawl: &CrawlId, item: I) -> Result<(), EngineError>;

    /// Number of items stored for the crawl so far. The control loop calls
    /// this every tick; implementations must not block indefinitely.
    async fn stats(&self, crawl: &CrawlId) -> Result<u64, EngineError>;

    /// Closes the partition. Closing an unknown partition is a no-op.
    async fn close(&self, crawl: &CrawlId) -> Result<(), EngineError>;
}

struct Partition<I> {
    items: Mutex<Vec<I>>,
    stored: AtomicU64,
}

impl<I> Partition<I> {
    fn new() -> Self {
        Partition {
            items: Mutex::new(Vec::new()),
            stored: AtomicU64::new(0),
        }
    }
}

/// In-memory `ItemStore` with one partition per crawl.
pub struct MemoryItemStore<I> {
    partitions: DashMap<CrawlId, Arc<Partition<I>>>,
}

impl<I> MemoryItemStore<I> {
    /// Creates a store with no partitions.
    pub fn new() -> Self {
        MemoryItemStore {
            partitions: DashMap::new(),
        }
    }

    fn partition(&self, crawl: &CrawlId) -> Result<Arc<Partition<I>>, EngineError> {
        self.partitions
            .get(crawl)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| EngineError::storage(crawl, "no item partition for this crawl"))
    }

    /// Copies out the items stored for a crawl, in arrival order.
    pub fn items(&self, crawl: &CrawlId) -> Vec<I>
    where
        I: Clone,
    {
        self.partitions
            .get(crawl)
            .map(|entry| entry.value().items.lock().clone())
            .unwrap_or_default()
    }
}

impl<I> Default for MemoryItemStore<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<I> ItemStore<I> for MemoryItemStore<I>
where
    I: Send + 'static,
{
    async fn start(&self, crawl: &CrawlId) -> Result<(), EngineError> {
        match self.partitions.entry(crawl.clone()) {
            Entry::Occupied(_) => Err(EngineError::storage(crawl, "item partition already exists")),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Partition::new()));
                debug!("item partition opened for crawl {}", crawl);
                Ok(())
            }
        }
    }

    async fn store(&self, crawl: &CrawlId, item: I) -> Result<(), EngineError> {
        let partition = self.partition(crawl)?;
        partition.items.lock().push(item);
        partition.stored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stats(&self, crawl: &CrawlId) -> Result<u64, EngineError> {
        Ok(self.partition(crawl)?.stored.load(Ordering::SeqCst))
    }

    async fn close(&self, crawl: &CrawlId) -> Result<(), EngineError> {
        if let Some((_, partition)) = self.partitions.remove(crawl) {
            debug!(
                "item partition closed for crawl {} with {} items",
                crawl,
                partition.stored.load(Ordering::SeqCst)
            );
        }
        Ok(())
    }
}
