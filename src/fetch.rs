//! Request and response value types, plus the downloader seam.
//!
//! The engine never speaks HTTP itself. Workers hand a `Request` to whatever
//! `Downloader` the crawl was launched with and get a `Response` back; retry
//! logic, connection pooling, and protocol details all live behind that trait.

use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// A unit of fetch work flowing through the frontier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The URL to fetch.
    pub url: Url,
    /// Distance from the seed that produced this request; seeds are depth 0.
    pub depth: u16,
}

impl Request {
    /// Creates a seed request for the given URL.
    pub fn new(url: Url) -> Self {
        Request { url, depth: 0 }
    }

    /// Creates a seed request from a URL string.
    pub fn get(url: &str) -> Result<Self, EngineError> {
        Ok(Request::new(Url::parse(url)?))
    }

    /// Creates a follow-up request one level deeper than this one.
    pub fn follow(&self, url: Url) -> Self {
        Request {
            url,
            depth: self.depth.saturating_add(1),
        }
    }
}

/// A fetched page handed to the spider for parsing.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL of the fetched page.
    pub url: Url,
    /// HTTP-style status code reported by the downloader.
    pub status: u16,
    /// Decoded response body.
    pub body: String,
    /// The request that produced this response.
    pub request: Request,
}

impl Response {
    /// Builds a response for the given request.
    pub fn new(request: Request, status: u16, body: impl Into<String>) -> Self {
        Response {
            url: request.url.clone(),
            status,
            body: body.into(),
            request,
        }
    }

    /// Whether the status code is in the success range.
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the actual fetch for the worker pool.
///
/// Implementations must be safe to share across workers; the engine clones a
/// single `Arc<dyn Downloader>` into every pool member.
#[async_trait]
pub trait Downloader: Send + Sync + 'static {
    /// Fetches one request, returning the response or a fetch error.
    async fn fetch(&self, request: Request) -> Result<Response, EngineError>;
}
