//! Error types shared across the crawl engine.
//!
//! Every fallible operation in this crate surfaces an `EngineError`. Startup
//! failures and storage failures terminate the crawl they belong to; fetch and
//! parse failures stay inside the worker that hit them and are only logged.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The error taxonomy of the crawl engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or unparseable configuration, rejected at load time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The spider failed to produce its start set.
    #[error("spider '{spider}' failed to initialize: {reason}")]
    SpiderInit { spider: String, reason: String },

    /// A frontier or item store operation failed.
    #[error("storage failure for crawl '{crawl}': {reason}")]
    Storage { crawl: String, reason: String },

    /// A page could not be fetched.
    #[error("fetch failed for '{url}': {reason}")]
    Fetch { url: String, reason: String },

    /// A response could not be parsed by the spider.
    #[error("parse failed for '{url}': {reason}")]
    Parse { url: String, reason: String },

    /// A start URL was not a valid URL.
    #[error("invalid start url: {0}")]
    InvalidStartUrl(#[from] url::ParseError),

    /// The worker pool no longer accepts new members.
    #[error("worker pool is closed")]
    PoolClosed,

    /// The crawl manager task has terminated.
    #[error("crawl manager is no longer running")]
    ManagerGone,
}

impl EngineError {
    /// Builds a `Storage` error for the given crawl.
    pub fn storage(crawl: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        EngineError::Storage {
            crawl: crawl.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Builds a `Fetch` error for the given URL.
    pub fn fetch(url: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        EngineError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Builds a `Parse` error for the given URL.
    pub fn parse(url: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        EngineError::Parse {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Builds a `SpiderInit` error for the given spider.
    pub fn spider_init(spider: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        EngineError::SpiderInit {
            spider: spider.to_string(),
            reason: reason.to_string(),
        }
    }
}
