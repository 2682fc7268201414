//! A "prelude" for users of the `harvester` crate.
//!
//! This prelude re-exports the most commonly used traits, structs, and macros
//! so that they can be easily imported.
//!
//! # Example
//!
//! ```
//! use harvester::prelude::*;
//! ```

pub use crate::{
    // Core structs
    CrawlHandle,
    CrawlManager,
    ParseOutput,
    Request,
    Response,
    // Core traits
    Downloader,
    Orchestrator,
    Spider,
    // Error handling
    EngineError,
    // Essential re-exports for trait implementation
    async_trait,
};
