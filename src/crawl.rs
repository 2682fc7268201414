//! Identity and lifecycle vocabulary for a single crawl.
//!
//! This module defines the `CrawlId` that keys every per-crawl resource, the
//! `CrawlPhase` state machine the manager moves through, the `StopReason`
//! codes attached to policy-triggered stops, and the `Orchestrator` trait
//! through which stop decisions leave the engine. A crawl is created in
//! `Starting`, spends its life in `Running`, and moves through `Stopping` to
//! `Stopped` exactly once; there is no transition back to `Starting`.

use crate::fetch::Request;
use async_trait::async_trait;
use std::fmt;
use url::Url;

/// Identifies one crawl run: the spider name plus an optional run qualifier.
///
/// Two crawls of the same spider can run side by side as long as their run
/// qualifiers differ; every storage partition and worker is keyed by this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrawlId {
    spider: String,
    run: Option<String>,
}

impl CrawlId {
    /// Creates an id for the spider's default run.
    pub fn new(spider: impl Into<String>) -> Self {
        CrawlId {
            spider: spider.into(),
            run: None,
        }
    }

    /// Creates an id for a named run of the spider.
    pub fn with_run(spider: impl Into<String>, run: impl Into<String>) -> Self {
        CrawlId {
            spider: spider.into(),
            run: Some(run.into()),
        }
    }

    /// The spider this crawl belongs to.
    #[inline]
    pub fn spider(&self) -> &str {
        &self.spider
    }

    /// The run qualifier, if the crawl was launched with one.
    #[inline]
    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }
}

impl fmt::Display for CrawlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.run {
            Some(run) => write!(f, "{}:{}", self.spider, run),
            None => write!(f, "{}", self.spider),
        }
    }
}

/// Lifecycle phase of a crawl, published through the manager's watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    /// Storage is being provisioned and the frontier seeded.
    Starting,
    /// Workers are active and the control loop is armed.
    Running,
    /// A stop has been requested; no further control ticks are scheduled.
    Stopping,
    /// The manager has torn down its resources and exited.
    Stopped,
}

impl CrawlPhase {
    /// Whether the crawl has fully terminated.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlPhase::Stopped)
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlPhase::Starting => "starting",
            CrawlPhase::Running => "running",
            CrawlPhase::Stopping => "stopping",
            CrawlPhase::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

/// Why the control loop asked for a crawl to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The item store reached the configured `closespider_itemcount` ceiling.
    ItemCountLimit,
    /// Items per interval fell to or below the `closespider_timeout` floor.
    ItemCountTimeout,
}

impl StopReason {
    /// Stable reason code used in logs and on external surfaces.
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::ItemCountLimit => "itemcount_limit",
            StopReason::ItemCountTimeout => "itemcount_timeout",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Receives stop decisions from the control loop.
///
/// The engine never kills its own workers when a stop policy fires; it hands
/// the decision to the orchestrator, which performs the actual teardown
/// (typically by calling `CrawlHandle::stop`). Implementations are called from
/// inside the manager's loop and must not wait for the crawl to finish within
/// this call.
#[async_trait]
pub trait Orchestrator: Send + Sync + 'static {
    /// Called at most once per crawl when a stop policy fires.
    async fn stop(&self, crawl: &CrawlId, reason: StopReason);
}

/// Extra inputs supplied when a crawl is launched.
///
/// Everything here is merged into the spider's own start set during startup;
/// the run id, when present, becomes part of the `CrawlId`.
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Qualifier distinguishing this run from other runs of the same spider.
    pub run_id: Option<String>,
    /// Additional start URLs, fetched as plain GET requests.
    pub extra_urls: Vec<Url>,
    /// Additional fully-formed start requests.
    pub extra_requests: Vec<Request>,
}

impl CrawlOptions {
    /// Creates empty options: default run, no extra seeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the run qualifier.
    pub fn run_id(mut self, run: impl Into<String>) -> Self {
        self.run_id = Some(run.into());
        self
    }

    /// Adds a start URL on top of the spider's own start set.
    pub fn extra_url(mut self, url: Url) -> Self {
        self.extra_urls.push(url);
        self
    }

    /// Adds a start request on top of the spider's own start set.
    pub fn extra_request(mut self, request: Request) -> Self {
        self.extra_requests.push(request);
        self
    }
}
