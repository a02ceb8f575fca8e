//! Display loop: polls the block and drives a renderer
//!
//! Phases:
//! 1. poll readiness every `refresh / 10` until all totals are declared
//! 2. capture the aggregate total once
//! 3. render `(cum_steps, total)` every `refresh` until done
//! 4. one final render with the latest count
//!
//! Cancellation is checked at least once per poll slice, so a stop request
//! is honoured within one poll interval. Cancelling during phase 1 returns
//! without ever rendering.

use super::render::ProgressRenderer;
use crate::config::poll_interval;
use crate::memory::{CounterBlock, ReadinessRule};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How a display loop run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOutcome {
    /// Stopped before every worker declared a total; nothing was drawn
    CancelledBeforeReady,
    /// Stopped while rendering
    Cancelled { current: i64, total: i64 },
    /// Aggregate count reached the total
    Completed { current: i64, total: i64 },
}

impl DisplayOutcome {
    pub fn rendered(&self) -> bool {
        !matches!(self, DisplayOutcome::CancelledBeforeReady)
    }
}

pub(crate) fn run_display_loop(
    block: &CounterBlock,
    readiness: ReadinessRule,
    cancel: &AtomicBool,
    renderer: &mut dyn ProgressRenderer,
    refresh: Duration,
) -> DisplayOutcome {
    let poll = poll_interval(refresh);

    while !block.are_workers_ready(readiness) {
        if cancel.load(Ordering::Acquire) {
            log::debug!(
                "SHMPROG: Display loop for '{}' cancelled before workers were ready",
                block.name()
            );
            return DisplayOutcome::CancelledBeforeReady;
        }
        std::thread::sleep(poll);
    }

    let total = block.total_steps();
    log::debug!(
        "SHMPROG: Workers ready on '{}', total {} steps",
        block.name(),
        total
    );

    let mut cancelled = false;
    loop {
        if cancel.load(Ordering::Acquire) {
            cancelled = true;
            break;
        }
        let current = block.cum_steps();
        if current >= total {
            break;
        }
        renderer.render(current, total);
        if sleep_unless_cancelled(cancel, refresh, poll) {
            cancelled = true;
            break;
        }
    }

    let current = block.cum_steps();
    renderer.finish(current, total);

    if cancelled && current < total {
        DisplayOutcome::Cancelled { current, total }
    } else {
        DisplayOutcome::Completed { current, total }
    }
}

/// Sleep for `duration` in `slice` steps. Returns true if cancelled.
fn sleep_unless_cancelled(cancel: &AtomicBool, duration: Duration, slice: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if cancel.load(Ordering::Acquire) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(slice.min(deadline - now));
    }
}
