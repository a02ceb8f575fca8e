//! # Shared memory layer for SHMPROG
//!
//! - **ShmRegion**: named, memory-mapped files under the platform shm directory
//! - **CounterBlock**: the typed `1 + 2*N` slot layout workers and the
//!   coordinator share
//!
//! Regions are host-local. Nothing here survives past the block's
//! destruction and nothing is written to durable storage.

pub mod counter_block;
pub mod platform;
pub mod shm_region;

pub use counter_block::{
    BlockLayout, CounterBlock, ProgressSnapshot, ReadinessRule, MAX_WORKERS, TOTAL_UNSET,
};
pub use platform::*;
pub use shm_region::ShmRegion;
