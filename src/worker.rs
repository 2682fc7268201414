//! The fetch/parse loop run by every pool member.
//!
//! A worker repeatedly takes one request from its crawl's frontier lane,
//! fetches it through the downloader seam, hands the response to the spider,
//! stores the scraped items, and enqueues the discovered follow-ups. Fetch,
//! parse, and store failures stay inside the worker: they are logged, counted,
//! and answered with a short backoff, never escalated to the manager. The
//! loop ends when the lane closes or the crawl's cancellation token fires.

use crate::crawl::CrawlId;
use crate::error::EngineError;
use crate::fetch::{Downloader, Request};
use crate::frontier::FrontierQueue;
use crate::spider::Spider;
use crate::stats::CrawlStats;
use crate::store::ItemStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Everything one worker needs, cloned out of the pool at spawn time.
pub(crate) struct WorkerContext<S: Spider> {
    pub id: usize,
    pub crawl: CrawlId,
    pub spider: Arc<S>,
    pub downloader: Arc<dyn Downloader>,
    pub frontier: Arc<dyn FrontierQueue>,
    pub store: Arc<dyn ItemStore<S::Item>>,
    pub stats: Arc<CrawlStats>,
    pub backoff: Duration,
    pub cancel: CancellationToken,
}

pub(crate) async fn run_worker<S: Spider>(ctx: WorkerContext<S>) {
    debug!("worker {} started for crawl {}", ctx.id, ctx.crawl);
    loop {
        let request = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                trace!("worker {}: cancellation requested, exiting", ctx.id);
                break;
            }
            next = ctx.frontier.next(&ctx.crawl) => match next {
                Ok(Some(request)) => request,
                Ok(None) => {
                    debug!("worker {}: frontier lane closed, exiting", ctx.id);
                    break;
                }
                Err(e) => {
                    debug!("worker {}: frontier unavailable, exiting: {}", ctx.id, e);
                    break;
                }
            },
        };

        if let Err(e) = process_request(&ctx, request).await {
            warn!("worker {} for crawl {}: {}", ctx.id, ctx.crawl, e);
            ctx.stats.increment_requests_failed();
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = sleep(ctx.backoff) => {}
            }
        }
    }
    debug!("worker {} finished for crawl {}", ctx.id, ctx.crawl);
}

async fn process_request<S: Spider>(
    ctx: &WorkerContext<S>,
    request: Request,
) -> Result<(), EngineError> {
    trace!("worker {} fetching {}", ctx.id, request.url);
    let response = ctx.downloader.fetch(request).await?;
    ctx.stats.increment_requests_fetched();

    let url = response.url.clone();
    let output = ctx.spider.parse(response).await?;
    trace!(
        "worker {} parsed {}: {} items, {} follow-ups",
        ctx.id,
        url,
        output.items.len(),
        output.requests.len()
    );

    for item in output.items {
        ctx.store.store(&ctx.crawl, item).await?;
        ctx.stats.increment_items_scraped();
    }

    for follow in output.requests {
        // The lane may be closing underneath us; dropping follow-ups then is
        // part of normal shutdown.
        if let Err(e) = ctx.frontier.enqueue(&ctx.crawl, follow).await {
            warn!("worker {}: dropping follow-up request: {}", ctx.id, e);
        }
    }

    Ok(())
}
