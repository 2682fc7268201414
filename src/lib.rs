//! # harvester
//!
//! Per-crawl supervision engine: frontier seeding, worker pools, and
//! stop-policy control loops.
//!
//! Provides the main components: `CrawlManager`, `FrontierQueue`, `ItemStore`,
//! the `Spider` trait, and infrastructure.
//!
//! ## Example
//!
//! ```rust,ignore
//! use harvester::prelude::*;
//! use harvester::{CrawlConfig, CrawlOptions, MemoryFrontier, MemoryItemStore};
//! use std::sync::Arc;
//!
//! struct MyItem {
//!     title: String,
//!     url: String,
//! }
//!
//! struct MySpider;
//!
//! #[async_trait]
//! impl Spider for MySpider {
//!     type Item = MyItem;
//!     fn name(&self) -> &str { "my-spider" }
//!     fn start_urls(&self) -> Vec<&'static str> { vec!["https://example.com"] }
//!     async fn parse(&self, response: Response) -> Result<ParseOutput<Self::Item>, EngineError> {
//!         todo!()
//!     }
//! }
//!
//! async fn run_crawl(
//!     downloader: Arc<dyn Downloader>,
//!     orchestrator: Arc<dyn Orchestrator>,
//! ) -> Result<(), EngineError> {
//!     let config = CrawlConfig::new().closespider_itemcount(1_000u64);
//!     let handle = CrawlManager::start(
//!         MySpider,
//!         downloader,
//!         Arc::new(MemoryFrontier::new()),
//!         Arc::new(MemoryItemStore::new()),
//!         orchestrator,
//!         config,
//!         CrawlOptions::new(),
//!     )
//!     .await?;
//!     handle.stopped().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod frontier;
pub mod manager;
pub mod pool;
pub mod prelude;
pub mod spider;
pub mod stats;
pub mod store;
mod worker;

pub use config::{ConfigOverrides, CrawlConfig, Threshold};
pub use crawl::{CrawlId, CrawlOptions, CrawlPhase, Orchestrator, StopReason};
pub use error::{EngineError, Result};
pub use fetch::{Downloader, Request, Response};
pub use frontier::{FrontierQueue, MemoryFrontier};
pub use manager::{CrawlHandle, CrawlManager};
pub use pool::{WorkerHandle, WorkerPool};
pub use spider::{ParseOutput, Spider};
pub use stats::{init_tracing, CrawlStats};
pub use store::{ItemStore, MemoryItemStore};

pub use async_trait::async_trait;
pub use tokio;
