//! The crawl manager implementation.
//!
//! This module defines the `CrawlManager`, the single task that owns one
//! crawl from startup to teardown. It provisions the crawl's storage,
//! resolves and seeds the start requests, launches the worker pool, and then
//! settles into an actor loop whose only inputs are its mailbox messages:
//! control-loop ticks, administrative commands, and stop requests. Because
//! every input arrives through the same mailbox, commands and ticks are
//! processed in strict arrival order and never concurrently.
//!
//! The periodic tick is produced by a spawned sleep task rather than an
//! interval so that the manager can guarantee at most one outstanding timer:
//! each tick aborts the fired timer handle and arms the next one only after
//! the policies have been evaluated, and only while the crawl is still
//! running.

use crate::config::CrawlConfig;
use crate::crawl::{CrawlId, CrawlOptions, CrawlPhase, Orchestrator, StopReason};
use crate::error::EngineError;
use crate::fetch::{Downloader, Request};
use crate::frontier::FrontierQueue;
use crate::manager::policy;
use crate::pool::{WorkerHandle, WorkerPool};
use crate::spider::Spider;
use crate::stats::CrawlStats;
use crate::store::ItemStore;
use kanal::{unbounded_async, AsyncReceiver, AsyncSender};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

enum ManagerMessage {
    Tick,
    AddWorkers(usize),
    Stop,
}

/// Client-side handle to a running crawl.
///
/// The handle is cheap to clone and remains valid until the manager task
/// exits; afterwards every command fails with `EngineError::ManagerGone`.
#[derive(Clone)]
pub struct CrawlHandle {
    crawl: CrawlId,
    tx: AsyncSender<ManagerMessage>,
    phase: watch::Receiver<CrawlPhase>,
    stats: Arc<CrawlStats>,
}

impl CrawlHandle {
    /// The identity of the crawl this handle controls.
    #[inline]
    pub fn crawl(&self) -> &CrawlId {
        &self.crawl
    }

    /// The crawl's current lifecycle phase.
    pub fn phase(&self) -> CrawlPhase {
        *self.phase.borrow()
    }

    /// The crawl's progress counters.
    pub fn stats(&self) -> Arc<CrawlStats> {
        Arc::clone(&self.stats)
    }

    /// Asks the manager to launch `count` additional workers.
    ///
    /// Fire-and-forget: acceptance of the message is the only
    /// acknowledgement, and the added capacity is not remembered across
    /// restarts of the crawl.
    pub async fn add_workers(&self, count: usize) -> Result<(), EngineError> {
        if count == 0 {
            return Err(EngineError::Configuration(
                "add_workers needs a count of at least 1.".to_string(),
            ));
        }
        self.tx
            .send(ManagerMessage::AddWorkers(count))
            .await
            .map_err(|_| EngineError::ManagerGone)
    }

    /// Asks the manager to tear the crawl down.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.tx
            .send(ManagerMessage::Stop)
            .await
            .map_err(|_| EngineError::ManagerGone)
    }

    /// Waits until the crawl has fully terminated.
    pub async fn stopped(&self) {
        let mut phase = self.phase.clone();
        loop {
            if phase.borrow_and_update().is_terminal() {
                return;
            }
            if phase.changed().await.is_err() {
                return;
            }
        }
    }
}

/// The single task owning one crawl: its storage, its worker pool, and the
/// periodic control loop enforcing the stop policies.
pub struct CrawlManager<S: Spider> {
    crawl: CrawlId,
    config: CrawlConfig,
    frontier: Arc<dyn FrontierQueue>,
    store: Arc<dyn ItemStore<S::Item>>,
    orchestrator: Arc<dyn Orchestrator>,
    pool: Arc<WorkerPool<S>>,
    stats: Arc<CrawlStats>,
    tx: AsyncSender<ManagerMessage>,
    phase: watch::Sender<CrawlPhase>,
    cancel: CancellationToken,
    previous_item_count: u64,
    timer: Option<JoinHandle<()>>,
    worker_handles: Vec<WorkerHandle>,
}

impl<S: Spider> CrawlManager<S> {
    /// Provisions storage, seeds the frontier, launches the worker pool, and
    /// starts the control loop for one crawl.
    ///
    /// Every step here is a hard dependency on the previous one: a frontier
    /// or store that cannot start, a spider that cannot produce its start
    /// set, or a failure while enqueuing the synchronous head of the seed
    /// list all fail the startup, and partially provisioned storage is
    /// closed again before the error is returned. On success the crawl is
    /// `Running` and the returned handle controls it.
    pub async fn start(
        spider: S,
        downloader: Arc<dyn Downloader>,
        frontier: Arc<dyn FrontierQueue>,
        store: Arc<dyn ItemStore<S::Item>>,
        orchestrator: Arc<dyn Orchestrator>,
        config: CrawlConfig,
        options: CrawlOptions,
    ) -> Result<CrawlHandle, EngineError> {
        let config = config.merge(&spider.overrides());
        config.validate()?;

        let crawl = match &options.run_id {
            Some(run) => CrawlId::with_run(spider.name(), run.clone()),
            None => CrawlId::new(spider.name()),
        };
        let spider = Arc::new(spider);
        info!(
            "crawl {}: starting with {} workers, control interval {}ms, itemcount limit {}, timeout limit {}",
            crawl,
            config.concurrent_workers,
            config.control_loop_interval_ms,
            config.closespider_itemcount,
            config.closespider_timeout
        );

        frontier.start(&crawl).await?;
        if let Err(e) = store.start(&crawl).await {
            unwind_storage(frontier.as_ref(), store.as_ref(), &crawl).await;
            return Err(e);
        }

        let stats = CrawlStats::new();

        let seeds = match resolve_seeds(spider.as_ref(), &options) {
            Ok(seeds) => seeds,
            Err(e) => {
                unwind_storage(frontier.as_ref(), store.as_ref(), &crawl).await;
                return Err(e);
            }
        };
        if let Err(e) = seed_frontier(&crawl, seeds, &config, &frontier, &stats).await {
            unwind_storage(frontier.as_ref(), store.as_ref(), &crawl).await;
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let pool = Arc::new(WorkerPool::new(
            crawl.clone(),
            Arc::clone(&spider),
            downloader,
            Arc::clone(&frontier),
            Arc::clone(&store),
            Arc::clone(&stats),
            config.worker_backoff(),
            cancel.child_token(),
        ));
        let mut worker_handles = Vec::with_capacity(config.concurrent_workers);
        for _ in 0..config.concurrent_workers {
            match pool.start_worker() {
                Ok(handle) => worker_handles.push(handle),
                Err(e) => {
                    pool.shutdown().await;
                    unwind_storage(frontier.as_ref(), store.as_ref(), &crawl).await;
                    return Err(e);
                }
            }
        }

        let (tx, rx) = unbounded_async();
        let (phase_tx, phase_rx) = watch::channel(CrawlPhase::Starting);
        let handle = CrawlHandle {
            crawl: crawl.clone(),
            tx: tx.clone(),
            phase: phase_rx,
            stats: Arc::clone(&stats),
        };

        let mut manager = CrawlManager {
            crawl,
            config,
            frontier,
            store,
            orchestrator,
            pool,
            stats,
            tx,
            phase: phase_tx,
            cancel,
            previous_item_count: 0,
            timer: None,
            worker_handles,
        };
        manager.arm_timer();
        manager.phase.send_replace(CrawlPhase::Running);
        info!("crawl {}: running", manager.crawl);
        tokio::spawn(async move { manager.run_loop(rx).await });

        Ok(handle)
    }

    async fn run_loop(mut self, rx: AsyncReceiver<ManagerMessage>) {
        info!(
            "crawl {}: control loop started with interval {}ms",
            self.crawl, self.config.control_loop_interval_ms
        );
        loop {
            if !self.handle_message(rx.recv().await).await {
                break;
            }
        }
        self.shutdown().await;
    }

    async fn handle_message(
        &mut self,
        msg: Result<ManagerMessage, kanal::ReceiveError>,
    ) -> bool {
        match msg {
            Ok(ManagerMessage::Tick) => self.handle_tick().await,
            Ok(ManagerMessage::AddWorkers(count)) => {
                self.handle_add_workers(count);
                true
            }
            Ok(ManagerMessage::Stop) => {
                info!("crawl {}: stop requested", self.crawl);
                false
            }
            Err(_) => {
                warn!(
                    "crawl {}: manager mailbox closed unexpectedly, shutting down",
                    self.crawl
                );
                false
            }
        }
    }

    async fn handle_tick(&mut self) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let phase = *self.phase.borrow();
        if phase != CrawlPhase::Running {
            trace!("crawl {}: tick ignored in phase {}", self.crawl, phase);
            return true;
        }
        self.stats.increment_ticks();

        let current = match self.store.stats(&self.crawl).await {
            Ok(count) => count,
            Err(e) => {
                error!(
                    "crawl {}: item store stats failed, shutting down: {}",
                    self.crawl, e
                );
                return false;
            }
        };

        let outcome = policy::evaluate_tick(&self.config, self.previous_item_count, current);
        debug!(
            "crawl {}: tick observed {} items, delta {}",
            self.crawl, outcome.current, outcome.delta
        );
        self.previous_item_count = outcome.current;

        if let Some(reason) = outcome.stop {
            match reason {
                StopReason::ItemCountLimit => info!(
                    "crawl {}: item-count limit reached ({} items), requesting stop",
                    self.crawl, outcome.current
                ),
                StopReason::ItemCountTimeout => info!(
                    "crawl {}: throughput below threshold (delta {}), requesting stop",
                    self.crawl, outcome.delta
                ),
            }
            self.phase.send_replace(CrawlPhase::Stopping);
            self.orchestrator.stop(&self.crawl, reason).await;
            return true;
        }

        self.arm_timer();
        true
    }

    fn handle_add_workers(&mut self, count: usize) {
        info!("crawl {}: adding {} workers on request", self.crawl, count);
        for _ in 0..count {
            match self.pool.start_worker() {
                Ok(handle) => self.worker_handles.push(handle),
                Err(e) => {
                    warn!("crawl {}: could not add worker: {}", self.crawl, e);
                    break;
                }
            }
        }
        debug!(
            "crawl {}: pool now holds {} workers",
            self.crawl,
            self.pool.size()
        );
    }

    // Replaces any pending timer so at most one tick is ever outstanding.
    fn arm_timer(&mut self) {
        if let Some(stale) = self.timer.take() {
            stale.abort();
        }
        let tx = self.tx.clone();
        let interval = self.config.tick_interval();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if tx.send(ManagerMessage::Tick).await.is_err() {
                trace!("control tick dropped, manager mailbox already closed");
            }
        }));
    }

    async fn shutdown(&mut self) {
        self.phase.send_replace(CrawlPhase::Stopping);
        info!("crawl {}: shutting down", self.crawl);
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        // Close the lane first so parked workers wake and drain out.
        if let Err(e) = self.frontier.close(&self.crawl).await {
            warn!("crawl {}: frontier close failed: {}", self.crawl, e);
        }
        self.pool.shutdown().await;
        if let Err(e) = self.store.close(&self.crawl).await {
            warn!("crawl {}: item store close failed: {}", self.crawl, e);
        }
        self.cancel.cancel();

        debug!(
            "crawl {}: {} workers were launched over the crawl's lifetime",
            self.crawl,
            self.worker_handles.len()
        );
        self.phase.send_replace(CrawlPhase::Stopped);
        info!("crawl {}: stopped. {}", self.crawl, self.stats);
    }
}

fn resolve_seeds<S: Spider>(
    spider: &S,
    options: &CrawlOptions,
) -> Result<Vec<Request>, EngineError> {
    let mut seeds = spider
        .start_requests()
        .map_err(|e| EngineError::spider_init(spider.name(), e))?;
    for url in &options.extra_urls {
        seeds.push(Request::new(url.clone()));
    }
    seeds.extend(options.extra_requests.iter().cloned());
    Ok(seeds)
}

// Enqueues the head of the seed list synchronously and hands the remainder to
// a detached task. Requests behind a failed background enqueue are lost;
// startup only guarantees the synchronous head.
async fn seed_frontier(
    crawl: &CrawlId,
    mut seeds: Vec<Request>,
    config: &CrawlConfig,
    frontier: &Arc<dyn FrontierQueue>,
    stats: &Arc<CrawlStats>,
) -> Result<(), EngineError> {
    let total = seeds.len();
    let tail = if total > config.seed_sync_limit {
        seeds.split_off(config.seed_sync_limit)
    } else {
        Vec::new()
    };

    for request in seeds {
        frontier.enqueue(crawl, request).await?;
        stats.increment_requests_seeded();
    }
    debug!(
        "crawl {}: {} of {} seed requests enqueued synchronously",
        crawl,
        total.min(config.seed_sync_limit),
        total
    );

    if !tail.is_empty() {
        debug!(
            "crawl {}: enqueuing {} remaining seed requests in the background",
            crawl,
            tail.len()
        );
        let crawl = crawl.clone();
        let frontier = Arc::clone(frontier);
        let stats = Arc::clone(stats);
        tokio::spawn(async move {
            for request in tail {
                match frontier.enqueue(&crawl, request).await {
                    Ok(()) => stats.increment_requests_seeded(),
                    Err(e) => {
                        error!(
                            "crawl {}: background seeding aborted, remaining seeds dropped: {}",
                            crawl, e
                        );
                        break;
                    }
                }
            }
        });
    }
    Ok(())
}

async fn unwind_storage<I: Send + 'static>(
    frontier: &dyn FrontierQueue,
    store: &dyn ItemStore<I>,
    crawl: &CrawlId,
) {
    if let Err(e) = frontier.close(crawl).await {
        warn!("crawl {}: frontier cleanup failed: {}", crawl, e);
    }
    if let Err(e) = store.close(crawl).await {
        warn!("crawl {}: item store cleanup failed: {}", crawl, e);
    }
}
