//! Progress aggregation on top of a counter block
//!
//! - **Coordinator**: creates and destroys the block, sums all slots, and
//!   owns the one background display task
//! - **WorkerHandle**: attaches by name and writes only its own slot pair
//! - **ProgressRenderer**: the widget the display loop draws through

pub mod coordinator;
pub mod display;
pub mod render;
pub mod worker;

pub use coordinator::{Coordinator, CoordinatorState};
pub use display::DisplayOutcome;
pub use render::{FnRenderer, IndicatifRenderer, ProgressRenderer};
pub use worker::{with_worker, WorkerHandle};
