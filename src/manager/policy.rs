//! Stop-policy evaluation for one control-loop tick.
//!
//! This is the pure heart of the control loop: given the configured
//! thresholds, the previously observed item count, and the current one, it
//! decides whether the crawl should stop and why. The item-count ceiling is
//! checked before the stagnation floor, so when both would fire on the same
//! tick the stop carries the item-count reason. The delta is signed because
//! an externally cleared store can legitimately report a lower count than the
//! previous tick.

use crate::config::{CrawlConfig, Threshold};
use crate::crawl::StopReason;

/// What one tick concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TickOutcome {
    /// The stop to request, if any policy fired.
    pub stop: Option<StopReason>,
    /// The item count observed this tick; becomes the next tick's baseline.
    pub current: u64,
    /// Items produced since the previous tick. Negative when the store
    /// shrank underneath us.
    pub delta: i64,
}

/// Evaluates both stop policies against one observation.
pub(crate) fn evaluate_tick(config: &CrawlConfig, previous: u64, current: u64) -> TickOutcome {
    let delta = current as i64 - previous as i64;

    if let Threshold::Limit(limit) = config.closespider_itemcount {
        if current >= limit {
            return TickOutcome {
                stop: Some(StopReason::ItemCountLimit),
                current,
                delta,
            };
        }
    }

    if let Threshold::Limit(limit) = config.closespider_timeout {
        if (delta as i128) <= (limit as i128) {
            return TickOutcome {
                stop: Some(StopReason::ItemCountTimeout),
                current,
                delta,
            };
        }
    }

    TickOutcome {
        stop: None,
        current,
        delta,
    }
}
