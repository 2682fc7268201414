//! # Worker Pool Module
//!
//! Supervises the fetch/parse workers of one crawl.
//!
//! ## Overview
//!
//! The pool owns the join handles of every worker it has spawned and the
//! cancellation token that links them to the crawl's lifetime. Members are
//! added one at a time through `start_worker`, both at startup and later when
//! an `add_workers` command arrives. A worker panic is caught and logged at
//! the pool boundary; the crawl itself keeps running on the remaining
//! members.
//!
//! Shutdown cancels the shared token, then joins every member so that no
//! fetch is still in flight when the crawl's storage partitions close.

use crate::crawl::CrawlId;
use crate::error::EngineError;
use crate::fetch::Downloader;
use crate::frontier::FrontierQueue;
use crate::spider::Spider;
use crate::stats::CrawlStats;
use crate::store::ItemStore;
use crate::worker::{self, WorkerContext};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handle to one spawned worker, held by the manager for diagnostics.
#[derive(Debug)]
pub struct WorkerHandle {
    id: usize,
    abort: AbortHandle,
}

impl WorkerHandle {
    /// The pool-unique id of this worker.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Whether the worker's task has already exited.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Supervisor for the workers of one crawl.
pub struct WorkerPool<S: Spider> {
    crawl: CrawlId,
    spider: Arc<S>,
    downloader: Arc<dyn Downloader>,
    frontier: Arc<dyn FrontierQueue>,
    store: Arc<dyn ItemStore<S::Item>>,
    stats: Arc<CrawlStats>,
    backoff: Duration,
    cancel: CancellationToken,
    next_worker_id: AtomicUsize,
    members: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl<S: Spider> WorkerPool<S> {
    /// Creates an empty pool bound to one crawl's collaborators.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        crawl: CrawlId,
        spider: Arc<S>,
        downloader: Arc<dyn Downloader>,
        frontier: Arc<dyn FrontierQueue>,
        store: Arc<dyn ItemStore<S::Item>>,
        stats: Arc<CrawlStats>,
        backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        WorkerPool {
            crawl,
            spider,
            downloader,
            frontier,
            store,
            stats,
            backoff,
            cancel,
            next_worker_id: AtomicUsize::new(0),
            members: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Spawns exactly one additional worker bound to this pool's crawl.
    pub fn start_worker(&self) -> Result<WorkerHandle, EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::PoolClosed);
        }

        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let ctx = WorkerContext {
            id,
            crawl: self.crawl.clone(),
            spider: Arc::clone(&self.spider),
            downloader: Arc::clone(&self.downloader),
            frontier: Arc::clone(&self.frontier),
            store: Arc::clone(&self.store),
            stats: Arc::clone(&self.stats),
            backoff: self.backoff,
            cancel: self.cancel.child_token(),
        };

        let handle = tokio::spawn(async move {
            if let Err(payload) = AssertUnwindSafe(worker::run_worker(ctx)).catch_unwind().await {
                error!("worker {} panicked: {}", id, panic_message(payload));
            }
        });
        let descriptor = WorkerHandle {
            id,
            abort: handle.abort_handle(),
        };
        self.members.lock().push(handle);
        info!("worker {} launched for crawl {}", id, self.crawl);
        Ok(descriptor)
    }

    /// Total number of workers ever spawned into this pool.
    pub fn size(&self) -> usize {
        self.members.lock().len()
    }

    /// Number of workers whose tasks have not yet exited.
    pub fn active(&self) -> usize {
        self.members
            .lock()
            .iter()
            .filter(|member| !member.is_finished())
            .count()
    }

    /// Cancels every member and waits for all of them to exit. Idempotent.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let members: Vec<JoinHandle<()>> = {
            let mut guard = self.members.lock();
            guard.drain(..).collect()
        };
        debug!(
            "joining {} workers for crawl {}",
            members.len(),
            self.crawl
        );
        for result in join_all(members).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    error!("worker task failed during shutdown: {}", e);
                }
            }
        }
        info!("worker pool for crawl {} shut down", self.crawl);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
