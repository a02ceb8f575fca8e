//! Counter block: the fixed layout of `1 + 2*N` signed 64-bit slots
//!
//! ```text
//! [0]            n_workers (written once at creation)
//! [1 ..= N]      per-worker completed steps, start at 0
//! [N+1 ..= 2N]   per-worker declared totals, start at TOTAL_UNSET (-1)
//! ```
//!
//! Slots are native-endian, 8-byte aligned, and accessed as `AtomicI64`
//! with relaxed ordering. Each counter/total pair has exactly one writer
//! (the worker owning that id), so relaxed word-sized accesses are enough
//! for the coordinator to converge on the right sums once writers stop.
//! Aggregate reads are not a linearizable snapshot across slots.

use super::platform::generate_block_name;
use super::shm_region::ShmRegion;
use crate::error::{ProgressError, ProgressResult};
use serde::{Deserialize, Serialize};
use std::io;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI64, Ordering};

/// Sentinel stored in a total slot until the worker declares its workload
pub const TOTAL_UNSET: i64 = -1;

const SLOT_SIZE: usize = mem::size_of::<i64>();

/// Upper bound on workers per block, keeps the region small and the
/// stored count sane when attaching to foreign files
pub const MAX_WORKERS: usize = 1 << 20;

/// Offsets of every slot in a block of `n_workers`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    n_workers: usize,
}

impl BlockLayout {
    pub fn new(n_workers: usize) -> ProgressResult<Self> {
        if n_workers == 0 {
            return Err(ProgressError::InvalidWorkerCount(
                "a block needs at least one worker".to_string(),
            ));
        }
        if n_workers > MAX_WORKERS {
            return Err(ProgressError::InvalidWorkerCount(format!(
                "{} workers exceeds the maximum of {}",
                n_workers, MAX_WORKERS
            )));
        }
        Ok(Self { n_workers })
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    /// Number of i64 slots
    pub fn slot_count(&self) -> usize {
        1 + 2 * self.n_workers
    }

    pub fn byte_size(&self) -> usize {
        self.slot_count() * SLOT_SIZE
    }

    pub fn counter_offset(&self, worker_id: usize) -> usize {
        1 + worker_id
    }

    pub fn total_offset(&self, worker_id: usize) -> usize {
        1 + self.n_workers + worker_id
    }

    pub fn check_worker(&self, worker_id: usize) -> ProgressResult<()> {
        if worker_id < self.n_workers {
            Ok(())
        } else {
            Err(ProgressError::InvalidWorkerId {
                worker_id,
                n_workers: self.n_workers,
            })
        }
    }
}

/// When is a worker considered to have declared its workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessRule {
    /// Every total must be strictly positive
    #[default]
    Positive,
    /// A declared total of zero also counts as ready
    AllowZero,
}

impl ReadinessRule {
    pub fn is_ready(&self, total: i64) -> bool {
        match self {
            ReadinessRule::Positive => total > 0,
            ReadinessRule::AllowZero => total >= 0,
        }
    }
}

/// Point-in-time (per slot) view of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub name: String,
    pub n_workers: usize,
    pub cum_steps: i64,
    pub total_steps: i64,
    pub ready: bool,
    pub counters: Vec<i64>,
    pub totals: Vec<i64>,
}

/// Typed view over a mapped counter block.
///
/// The raw mapping never leaves this type; callers only see slot accessors.
#[derive(Debug)]
pub struct CounterBlock {
    region: ShmRegion,
    slots: NonNull<AtomicI64>,
    layout: BlockLayout,
}

// The mapping lives as long as the block and is only touched via atomics
unsafe impl Send for CounterBlock {}
unsafe impl Sync for CounterBlock {}

impl CounterBlock {
    /// Create a block under a freshly generated name
    pub fn create(n_workers: usize) -> ProgressResult<Self> {
        Self::create_named(&generate_block_name(), n_workers)
    }

    /// Create a block under a caller-chosen name
    pub fn create_named(name: &str, n_workers: usize) -> ProgressResult<Self> {
        let layout = BlockLayout::new(n_workers)?;
        let mut region = ShmRegion::create(name, layout.byte_size())?;
        let slots = match slot_ptr(&mut region) {
            Ok(ptr) => ptr,
            Err(e) => {
                let _ = ShmRegion::unlink(name);
                return Err(ProgressError::creation(name, e));
            }
        };

        let block = Self {
            region,
            slots,
            layout,
        };
        block.reset();

        log::info!(
            "SHMPROG: Created counter block '{}' for {} workers ({} bytes)",
            name,
            n_workers,
            layout.byte_size()
        );
        Ok(block)
    }

    /// Map an existing block by name, reading the worker count from slot 0
    pub fn attach(name: &str) -> ProgressResult<Self> {
        let mut region = ShmRegion::open(name)?;
        if region.size() < SLOT_SIZE {
            return Err(invalid_block(name, "region too small for a header"));
        }
        let slots = slot_ptr(&mut region).map_err(|e| ProgressError::attach(name, e))?;

        // Safe: the region holds at least one aligned slot
        let stored = unsafe { slots.as_ref() }.load(Ordering::Acquire);
        if stored <= 0 || stored as u64 > MAX_WORKERS as u64 {
            return Err(invalid_block(
                name,
                &format!("stored worker count {} is not valid", stored),
            ));
        }
        let layout = BlockLayout::new(stored as usize)?;
        if region.size() < layout.byte_size() {
            return Err(invalid_block(
                name,
                &format!(
                    "region is {} bytes, {} workers need {}",
                    region.size(),
                    stored,
                    layout.byte_size()
                ),
            ));
        }

        log::debug!(
            "SHMPROG: Attached to counter block '{}' ({} workers)",
            name,
            stored
        );
        Ok(Self {
            region,
            slots,
            layout,
        })
    }

    /// Write the worker count, zero every counter and mark every total unset.
    ///
    /// Must not race live workers; their progress is discarded.
    pub fn reset(&self) {
        let layout = self.layout;
        self.slot(0)
            .store(layout.n_workers() as i64, Ordering::Relaxed);
        for k in 0..layout.n_workers() {
            self.slot(layout.counter_offset(k)).store(0, Ordering::Relaxed);
            self.slot(layout.total_offset(k))
                .store(TOTAL_UNSET, Ordering::Release);
        }
    }

    /// Unmap this block and remove its name.
    ///
    /// Returns `false` if the name had already been removed.
    pub fn destroy(self) -> ProgressResult<bool> {
        let name = self.region.name().to_string();
        drop(self);
        Self::unlink(&name)
    }

    /// Remove a block name without holding a mapping. Idempotent.
    pub fn unlink(name: &str) -> ProgressResult<bool> {
        let removed = ShmRegion::unlink(name)?;
        if removed {
            log::info!("SHMPROG: Destroyed counter block '{}'", name);
        } else {
            log::debug!("SHMPROG: Counter block '{}' was already destroyed", name);
        }
        Ok(removed)
    }

    pub fn name(&self) -> &str {
        self.region.name()
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn n_workers(&self) -> usize {
        self.layout.n_workers()
    }

    /// Worker count as currently stored in slot 0.
    ///
    /// Fails if the header was overwritten with a count this mapping
    /// cannot address.
    pub fn read_n_workers(&self) -> ProgressResult<usize> {
        let stored = self.slot(0).load(Ordering::Relaxed);
        match usize::try_from(stored) {
            Ok(n) if n > 0 && n <= self.n_workers() => Ok(n),
            _ => Err(invalid_block(
                self.name(),
                &format!("stored worker count {} is not valid", stored),
            )),
        }
    }

    /// True when this mapping created the block
    pub fn is_owner(&self) -> bool {
        self.region.is_owner()
    }

    pub fn get_counter(&self, worker_id: usize) -> ProgressResult<i64> {
        self.layout.check_worker(worker_id)?;
        Ok(self
            .slot(self.layout.counter_offset(worker_id))
            .load(Ordering::Relaxed))
    }

    pub fn add_counter(&self, worker_id: usize, delta: i64) -> ProgressResult<()> {
        self.layout.check_worker(worker_id)?;
        self.slot(self.layout.counter_offset(worker_id))
            .fetch_add(delta, Ordering::Relaxed);
        Ok(())
    }

    pub fn get_total(&self, worker_id: usize) -> ProgressResult<i64> {
        self.layout.check_worker(worker_id)?;
        Ok(self
            .slot(self.layout.total_offset(worker_id))
            .load(Ordering::Acquire))
    }

    /// Last write wins; re-declaring a total is not an error
    pub fn set_total(&self, worker_id: usize, value: i64) -> ProgressResult<()> {
        self.layout.check_worker(worker_id)?;
        self.slot(self.layout.total_offset(worker_id))
            .store(value, Ordering::Release);
        Ok(())
    }

    /// Sum of all completed-step counters
    pub fn cum_steps(&self) -> i64 {
        (0..self.n_workers())
            .map(|k| {
                self.slot(self.layout.counter_offset(k))
                    .load(Ordering::Relaxed)
            })
            .fold(0, i64::wrapping_add)
    }

    /// Sum of all declared totals, sentinels included
    pub fn total_steps(&self) -> i64 {
        (0..self.n_workers())
            .map(|k| self.slot(self.layout.total_offset(k)).load(Ordering::Acquire))
            .fold(0, i64::wrapping_add)
    }

    pub fn are_workers_ready(&self, rule: ReadinessRule) -> bool {
        (0..self.n_workers())
            .all(|k| rule.is_ready(self.slot(self.layout.total_offset(k)).load(Ordering::Acquire)))
    }

    pub fn snapshot(&self, rule: ReadinessRule) -> ProgressSnapshot {
        let n = self.n_workers();
        let counters: Vec<i64> = (0..n)
            .map(|k| {
                self.slot(self.layout.counter_offset(k))
                    .load(Ordering::Relaxed)
            })
            .collect();
        let totals: Vec<i64> = (0..n)
            .map(|k| self.slot(self.layout.total_offset(k)).load(Ordering::Acquire))
            .collect();

        ProgressSnapshot {
            name: self.name().to_string(),
            n_workers: n,
            cum_steps: counters.iter().fold(0, |acc, v| acc.wrapping_add(*v)),
            total_steps: totals.iter().fold(0, |acc, v| acc.wrapping_add(*v)),
            ready: totals.iter().all(|t| rule.is_ready(*t)),
            counters,
            totals,
        }
    }

    fn slot(&self, index: usize) -> &AtomicI64 {
        debug_assert!(index < self.layout.slot_count());
        // Offsets come from the layout, which was checked against the region size
        unsafe { &*self.slots.as_ptr().add(index) }
    }
}

fn slot_ptr(region: &mut ShmRegion) -> io::Result<NonNull<AtomicI64>> {
    let ptr = region.as_mut_ptr() as *mut AtomicI64;
    if (ptr as usize) % mem::align_of::<AtomicI64>() != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "shared memory mapping is not 8-byte aligned",
        ));
    }
    NonNull::new(ptr)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "null shared memory mapping"))
}

fn invalid_block(name: &str, reason: &str) -> ProgressError {
    ProgressError::attach(name, io::Error::new(io::ErrorKind::InvalidData, reason.to_string()))
}
