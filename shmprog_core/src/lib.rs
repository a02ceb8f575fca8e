//! # SHMPROG Core
//!
//! Progress reporting for independent workers (processes or threads) through
//! a single shared memory block, with no messages between them.
//!
//! - **Memory**: the named counter block and its fixed `1 + 2*N` slot layout
//! - **Progress**: the coordinator that owns and aggregates a block, the
//!   per-worker handles that write to it, and the display loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shmprog_core::{Coordinator, DisplayConfig, IndicatifRenderer, WorkerHandle};
//!
//! # fn main() -> shmprog_core::ProgressResult<()> {
//! let config = DisplayConfig::default();
//! let renderer = IndicatifRenderer::new(&config)?;
//! let coordinator = Coordinator::start(2, None, renderer, config.refresh_interval())?;
//!
//! // Usually in another process, told its id and the block name
//! let worker = WorkerHandle::attach(0, coordinator.shm_name())?;
//! worker.set_total_steps(100)?;
//! worker.update(1)?;
//! # Ok(())
//! # }
//! ```
//!
//! Each worker is the only writer of its slots and the coordinator only
//! reads, so there are no locks. Aggregates are eventually consistent.

pub mod config;
pub mod error;
pub mod memory;
pub mod progress;

pub use config::DisplayConfig;
pub use error::{ProgressError, ProgressResult};
pub use memory::{CounterBlock, ProgressSnapshot, ReadinessRule, TOTAL_UNSET};
pub use progress::{
    with_worker, Coordinator, CoordinatorState, DisplayOutcome, FnRenderer, IndicatifRenderer,
    ProgressRenderer, WorkerHandle,
};
