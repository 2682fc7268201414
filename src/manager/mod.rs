//! # Manager Module
//!
//! Implements the per-crawl control process.
//!
//! ## Overview
//!
//! The manager module provides the `CrawlManager`, the single task that owns
//! one crawl end to end: it provisions the crawl's frontier lane and item
//! partition, seeds the start requests, launches the worker pool, and runs
//! the periodic control loop that enforces the stop policies. Callers keep a
//! `CrawlHandle` for administrative commands.
//!
//! ## Key Components
//!
//! - **CrawlManager**: The startup sequence and the actor loop processing
//!   ticks, commands, and stop requests in strict arrival order
//! - **CrawlHandle**: Cloneable client handle for `add_workers`, `stop`, and
//!   phase observation
//! - **Policy Evaluation**: The pure per-tick decision of whether a stop
//!   threshold has been crossed
//!
//! ## Architecture
//!
//! Each crawl gets one manager task with a private mailbox. Everything that
//! can change manager state arrives as a mailbox message, so no two ticks and
//! no tick-and-command pair ever run concurrently for the same crawl. Crawls
//! share nothing with each other and make independent progress.

mod core;
mod policy;

pub use self::core::{CrawlHandle, CrawlManager};
