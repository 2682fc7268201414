//! # Spider Module
//!
//! Defines the `Spider` trait and the `ParseOutput` container.
//!
//! ## Overview
//!
//! A spider names a crawl, declares where it starts, and turns fetched
//! responses into scraped items and follow-up requests. The engine treats the
//! extraction logic as opaque: whatever `parse` returns is stored and
//! enqueued, nothing else about the page is inspected.
//!
//! ## Implementation
//!
//! Implementors must define:
//! - `name`: the identity every per-crawl resource is keyed under
//! - `parse`: logic for extracting items and discovering new URLs
//! - `Item`: the type of data structure holding scraped information
//!
//! `start_urls` and `start_requests` feed the frontier once at startup;
//! `overrides` lets a spider adjust the global configuration for its own
//! crawls. `parse` takes `&self` because every worker in the pool shares one
//! spider instance; implementations needing mutable state use interior
//! mutability.
//!
//! ## Example
//!
//! ```rust,ignore
//! use harvester::{async_trait, EngineError, ParseOutput, Response, Spider};
//!
//! struct Article {
//!     title: String,
//! }
//!
//! struct ArticleSpider;
//!
//! #[async_trait]
//! impl Spider for ArticleSpider {
//!     type Item = Article;
//!
//!     fn name(&self) -> &str {
//!         "articles"
//!     }
//!
//!     fn start_urls(&self) -> Vec<&'static str> {
//!         vec!["https://example.com/articles"]
//!     }
//!
//!     async fn parse(&self, response: Response) -> Result<ParseOutput<Self::Item>, EngineError> {
//!         let mut output = ParseOutput::new();
//!
//!         // Extract articles from the page
//!         // output.add_item(Article { title });
//!
//!         // Add new URLs to follow
//!         // output.add_request(response.request.follow(next_page));
//!
//!         Ok(output)
//!     }
//! }
//! ```

use crate::config::ConfigOverrides;
use crate::error::EngineError;
use crate::fetch::{Request, Response};
use async_trait::async_trait;
use url::Url;

/// Defines the contract for a spider driving one kind of crawl.
#[async_trait]
pub trait Spider: Send + Sync + 'static {
    /// The type of item that the spider scrapes.
    type Item: Send + 'static;

    /// Unique name identifying this spider; becomes the crawl identity.
    fn name(&self) -> &str;

    /// Settings layered over the global configuration for this spider's crawls.
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides::default()
    }

    /// Returns the initial URLs to start crawling from.
    fn start_urls(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Generates the initial requests to start crawling.
    fn start_requests(&self) -> Result<Vec<Request>, EngineError> {
        let urls: Result<Vec<Url>, url::ParseError> =
            self.start_urls().into_iter().map(Url::parse).collect();
        Ok(urls?.into_iter().map(Request::new).collect())
    }

    /// Parses a response and extracts scraped items and new requests.
    async fn parse(&self, response: Response) -> Result<ParseOutput<Self::Item>, EngineError>;
}

/// Container for the items and follow-up requests produced by one parse.
#[derive(Debug)]
pub struct ParseOutput<I> {
    /// Items scraped from the response.
    pub items: Vec<I>,
    /// Newly discovered requests to enqueue.
    pub requests: Vec<Request>,
}

impl<I> ParseOutput<I> {
    /// Creates an empty output.
    pub fn new() -> Self {
        ParseOutput {
            items: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Creates an output carrying only items.
    pub fn with_items(items: Vec<I>) -> Self {
        ParseOutput {
            items,
            requests: Vec::new(),
        }
    }

    /// Adds a scraped item to the output.
    pub fn add_item(&mut self, item: I) {
        self.items.push(item);
    }

    /// Adds a follow-up request to the output.
    pub fn add_request(&mut self, request: Request) {
        self.requests.push(request);
    }

    /// Whether the parse produced neither items nor requests.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.requests.is_empty()
    }
}

impl<I> Default for ParseOutput<I> {
    fn default() -> Self {
        Self::new()
    }
}
