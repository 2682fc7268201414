#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use harvester::{
    async_trait, CrawlHandle, CrawlId, Downloader, EngineError, FrontierQueue, ItemStore,
    MemoryFrontier, Orchestrator, ParseOutput, Request, Response, Spider, StopReason,
};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

pub fn init_tracing() {
    harvester::init_tracing();
}

/// Polls `cond` under the paused test clock until it holds, advancing virtual
/// time between polls. Panics when the condition never becomes true.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {}", what);
}

/// Spider producing a fixed number of seed requests and nothing else; every
/// parsed page yields an empty output.
pub struct SeedOnlySpider {
    name: String,
    seeds: usize,
}

impl SeedOnlySpider {
    pub fn new(name: &str, seeds: usize) -> Self {
        SeedOnlySpider {
            name: name.to_string(),
            seeds,
        }
    }
}

#[async_trait]
impl Spider for SeedOnlySpider {
    type Item = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn start_requests(&self) -> Result<Vec<Request>, EngineError> {
        (0..self.seeds)
            .map(|i| Request::get(&format!("https://seeds.test/page/{}", i)))
            .collect()
    }

    async fn parse(&self, _response: Response) -> Result<ParseOutput<String>, EngineError> {
        Ok(ParseOutput::new())
    }
}

/// Spider whose start set cannot be resolved.
pub struct BrokenSpider;

#[async_trait]
impl Spider for BrokenSpider {
    type Item = String;

    fn name(&self) -> &str {
        "broken"
    }

    fn start_requests(&self) -> Result<Vec<Request>, EngineError> {
        Err(EngineError::spider_init("broken", "no start set today"))
    }

    async fn parse(&self, _response: Response) -> Result<ParseOutput<String>, EngineError> {
        Ok(ParseOutput::new())
    }
}

/// Spider walking a short chain of pages: page `i` yields one item and a
/// follow-up to page `i + 1` until `pages` is reached.
pub struct PagingSpider {
    pages: usize,
}

impl PagingSpider {
    pub fn new(pages: usize) -> Self {
        PagingSpider { pages }
    }
}

#[async_trait]
impl Spider for PagingSpider {
    type Item = String;

    fn name(&self) -> &str {
        "paging"
    }

    fn start_urls(&self) -> Vec<&'static str> {
        vec!["https://pages.test/page/0"]
    }

    async fn parse(&self, response: Response) -> Result<ParseOutput<String>, EngineError> {
        let page: usize = response
            .url
            .path_segments()
            .and_then(|mut segments| segments.nth(1))
            .and_then(|segment| segment.parse().ok())
            .ok_or_else(|| EngineError::parse(&response.url, "no page number in path"))?;

        let mut output = ParseOutput::with_items(vec![format!("item-{}", page)]);
        if page + 1 < self.pages {
            let next = response
                .url
                .join(&format!("/page/{}", page + 1))
                .map_err(|e| EngineError::parse(&response.url, e))?;
            output.add_request(response.request.follow(next));
        }
        Ok(output)
    }
}

/// Downloader answering every request with an empty 200 response.
pub struct StaticDownloader;

#[async_trait]
impl Downloader for StaticDownloader {
    async fn fetch(&self, request: Request) -> Result<Response, EngineError> {
        Ok(Response::new(request, 200, ""))
    }
}

/// Downloader that counts entries and then parks each fetch until the test
/// releases it. The entry count equals the number of workers that have picked
/// up a request, which makes pool growth observable.
pub struct StallingDownloader {
    entered: AtomicUsize,
    gate: Semaphore,
}

impl StallingDownloader {
    pub fn new() -> Arc<Self> {
        Arc::new(StallingDownloader {
            entered: AtomicUsize::new(0),
            gate: Semaphore::new(0),
        })
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    /// Lets `count` parked fetches complete.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }
}

#[async_trait]
impl Downloader for StallingDownloader {
    async fn fetch(&self, request: Request) -> Result<Response, EngineError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| EngineError::fetch(&request.url, "gate closed"))?;
        permit.forget();
        Ok(Response::new(request, 200, ""))
    }
}

/// Frontier wrapper that counts enqueues and admits only as many as the test
/// has granted; further enqueues park until `release` is called. Seed-split
/// tests use this to freeze the background seeding task at a known point.
pub struct GatedFrontier {
    inner: MemoryFrontier,
    admissions: Semaphore,
    enqueued: AtomicUsize,
}

impl GatedFrontier {
    pub fn new(admitted: usize) -> Arc<Self> {
        Arc::new(GatedFrontier {
            inner: MemoryFrontier::new(),
            admissions: Semaphore::new(admitted),
            enqueued: AtomicUsize::new(0),
        })
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued.load(Ordering::SeqCst)
    }

    /// Admits `count` more enqueues.
    pub fn release(&self, count: usize) {
        self.admissions.add_permits(count);
    }
}

#[async_trait]
impl FrontierQueue for GatedFrontier {
    async fn start(&self, crawl: &CrawlId) -> Result<(), EngineError> {
        self.inner.start(crawl).await
    }

    async fn enqueue(&self, crawl: &CrawlId, request: Request) -> Result<(), EngineError> {
        let permit = self
            .admissions
            .acquire()
            .await
            .map_err(|_| EngineError::storage(crawl, "admission gate closed"))?;
        permit.forget();
        self.inner.enqueue(crawl, request).await?;
        self.enqueued.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next(&self, crawl: &CrawlId) -> Result<Option<Request>, EngineError> {
        self.inner.next(crawl).await
    }

    async fn pending(&self, crawl: &CrawlId) -> Result<usize, EngineError> {
        self.inner.pending(crawl).await
    }

    async fn close(&self, crawl: &CrawlId) -> Result<(), EngineError> {
        self.inner.close(crawl).await
    }
}

/// Item store whose per-tick counts follow a script. Each `stats` call
/// consumes the next scripted value; once the script runs out the last value
/// repeats.
pub struct ScriptedStore {
    script: Mutex<VecDeque<u64>>,
    last: AtomicU64,
    stats_calls: AtomicUsize,
    closed: AtomicBool,
}

impl ScriptedStore {
    pub fn new(counts: &[u64]) -> Arc<Self> {
        Arc::new(ScriptedStore {
            script: Mutex::new(counts.iter().copied().collect()),
            last: AtomicU64::new(counts.last().copied().unwrap_or(0)),
            stats_calls: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemStore<String> for ScriptedStore {
    async fn start(&self, _crawl: &CrawlId) -> Result<(), EngineError> {
        Ok(())
    }

    async fn store(&self, _crawl: &CrawlId, _item: String) -> Result<(), EngineError> {
        Ok(())
    }

    async fn stats(&self, _crawl: &CrawlId) -> Result<u64, EngineError> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().pop_front() {
            Some(count) => {
                self.last.store(count, Ordering::SeqCst);
                Ok(count)
            }
            None => Ok(self.last.load(Ordering::SeqCst)),
        }
    }

    async fn close(&self, _crawl: &CrawlId) -> Result<(), EngineError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Item store that refuses to start, for exercising the startup unwind.
pub struct FailingStore;

#[async_trait]
impl ItemStore<String> for FailingStore {
    async fn start(&self, crawl: &CrawlId) -> Result<(), EngineError> {
        Err(EngineError::storage(crawl, "partition backend offline"))
    }

    async fn store(&self, crawl: &CrawlId, _item: String) -> Result<(), EngineError> {
        Err(EngineError::storage(crawl, "partition backend offline"))
    }

    async fn stats(&self, crawl: &CrawlId) -> Result<u64, EngineError> {
        Err(EngineError::storage(crawl, "partition backend offline"))
    }

    async fn close(&self, _crawl: &CrawlId) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Item store that starts fine and then fails every stats read, for
/// exercising the manager's fail-fast teardown mid-crawl.
pub struct BrokenStatsStore {
    closed: AtomicBool,
}

impl BrokenStatsStore {
    pub fn new() -> Arc<Self> {
        Arc::new(BrokenStatsStore {
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemStore<String> for BrokenStatsStore {
    async fn start(&self, _crawl: &CrawlId) -> Result<(), EngineError> {
        Ok(())
    }

    async fn store(&self, _crawl: &CrawlId, _item: String) -> Result<(), EngineError> {
        Ok(())
    }

    async fn stats(&self, crawl: &CrawlId) -> Result<u64, EngineError> {
        Err(EngineError::storage(crawl, "stats backend unreachable"))
    }

    async fn close(&self, _crawl: &CrawlId) -> Result<(), EngineError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Orchestrator that records every stop decision and, when bound to a crawl
/// handle, performs the teardown the engine delegates to it.
pub struct RecordingOrchestrator {
    stops: Mutex<Vec<(CrawlId, StopReason)>>,
    handle: Mutex<Option<CrawlHandle>>,
}

impl RecordingOrchestrator {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingOrchestrator {
            stops: Mutex::new(Vec::new()),
            handle: Mutex::new(None),
        })
    }

    /// Binds the crawl handle stop decisions should be forwarded to.
    pub fn bind(&self, handle: CrawlHandle) {
        *self.handle.lock() = Some(handle);
    }

    pub fn stops(&self) -> Vec<(CrawlId, StopReason)> {
        self.stops.lock().clone()
    }
}

#[async_trait]
impl Orchestrator for RecordingOrchestrator {
    async fn stop(&self, crawl: &CrawlId, reason: StopReason) {
        self.stops.lock().push((crawl.clone(), reason));
        let handle = self.handle.lock().clone();
        if let Some(handle) = handle {
            let _ = handle.stop().await;
        }
    }
}
