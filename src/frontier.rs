//! # Frontier Module
//!
//! Implements the request frontier backing the worker pool.
//!
//! ## Overview
//!
//! The frontier holds the requests a crawl has discovered but not yet fetched.
//! Each crawl gets its own lane, keyed by `CrawlId`, so many crawls can share
//! one frontier service without observing each other. Workers park on the
//! lane's async dequeue while it is empty and wake as soon as a seed task or a
//! sibling worker enqueues something.
//!
//! ## Key Responsibilities
//!
//! - **Lane Management**: Provisions a lane at crawl startup and tears it
//!   down when the crawl stops
//! - **Request Queueing**: Accepts requests from the seeding tasks and from
//!   workers discovering follow-ups
//! - **Dequeue Coordination**: Hands each queued request to exactly one worker
//! - **Depth Accounting**: Tracks how many requests are waiting per lane
//!
//! ## Architecture
//!
//! `MemoryFrontier` backs each lane with an unbounded async channel, which
//! gives multi-producer multi-consumer semantics for free: the seed task and
//! every worker hold clones of the same sender and receiver. Closing a lane
//! closes its channel, which wakes all parked workers with an end-of-lane
//! signal; requests still queued at that point are dropped.

use crate::crawl::CrawlId;
use crate::error::EngineError;
use crate::fetch::Request;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use kanal::{unbounded_async, AsyncReceiver, AsyncSender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Per-crawl request queue backing the worker pool.
#[async_trait]
pub trait FrontierQueue: Send + Sync + 'static {
    /// Provisions the lane for a crawl. Fails if the lane already exists.
    async fn start(&self, crawl: &CrawlId) -> Result<(), EngineError>;

    /// Adds one request to the crawl's lane.
    async fn enqueue(&self, crawl: &CrawlId, request: Request) -> Result<(), EngineError>;

    /// Removes the next request, waiting while the lane is empty.
    /// Returns `None` once the lane has been closed.
    async fn next(&self, crawl: &CrawlId) -> Result<Option<Request>, EngineError>;

    /// Number of requests currently queued in the crawl's lane.
    async fn pending(&self, crawl: &CrawlId) -> Result<usize, EngineError>;

    /// Closes the lane, waking parked workers. Requests still queued are
    /// dropped. Closing an unknown lane is a no-op.
    async fn close(&self, crawl: &CrawlId) -> Result<(), EngineError>;
}

#[derive(Clone)]
struct Lane {
    tx: AsyncSender<Request>,
    rx: AsyncReceiver<Request>,
    queued: Arc<AtomicUsize>,
}

/// In-memory `FrontierQueue` with one channel-backed lane per crawl.
#[derive(Default)]
pub struct MemoryFrontier {
    lanes: DashMap<CrawlId, Lane>,
}

impl MemoryFrontier {
    /// Creates a frontier with no lanes.
    pub fn new() -> Self {
        MemoryFrontier {
            lanes: DashMap::new(),
        }
    }

    // Clones the lane handles out so no map guard is held across an await.
    fn lane(&self, crawl: &CrawlId) -> Result<Lane, EngineError> {
        self.lanes
            .get(crawl)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EngineError::storage(crawl, "no frontier lane for this crawl"))
    }
}

#[async_trait]
impl FrontierQueue for MemoryFrontier {
    async fn start(&self, crawl: &CrawlId) -> Result<(), EngineError> {
        match self.lanes.entry(crawl.clone()) {
            Entry::Occupied(_) => Err(EngineError::storage(crawl, "frontier lane already exists")),
            Entry::Vacant(slot) => {
                let (tx, rx) = unbounded_async();
                slot.insert(Lane {
                    tx,
                    rx,
                    queued: Arc::new(AtomicUsize::new(0)),
                });
                debug!("frontier lane opened for crawl {}", crawl);
                Ok(())
            }
        }
    }

    async fn enqueue(&self, crawl: &CrawlId, request: Request) -> Result<(), EngineError> {
        let lane = self.lane(crawl)?;
        trace!("enqueuing request for crawl {}: {}", crawl, request.url);
        lane.queued.fetch_add(1, Ordering::SeqCst);
        if lane.tx.send(request).await.is_err() {
            lane.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::storage(crawl, "frontier lane is closed"));
        }
        Ok(())
    }

    async fn next(&self, crawl: &CrawlId) -> Result<Option<Request>, EngineError> {
        let lane = self.lane(crawl)?;
        match lane.rx.recv().await {
            Ok(request) => {
                lane.queued.fetch_sub(1, Ordering::SeqCst);
                trace!("dequeued request for crawl {}: {}", crawl, request.url);
                Ok(Some(request))
            }
            Err(_) => Ok(None),
        }
    }

    async fn pending(&self, crawl: &CrawlId) -> Result<usize, EngineError> {
        Ok(self.lane(crawl)?.queued.load(Ordering::SeqCst))
    }

    async fn close(&self, crawl: &CrawlId) -> Result<(), EngineError> {
        if let Some((_, lane)) = self.lanes.remove(crawl) {
            lane.tx.close();
            debug!(
                "frontier lane closed for crawl {} with {} queued requests dropped",
                crawl,
                lane.queued.load(Ordering::SeqCst)
            );
        }
        Ok(())
    }
}
