//! Worker handle: one worker's attachment to a counter block

use crate::error::{ProgressError, ProgressResult};
use crate::memory::CounterBlock;

/// Exclusive writer of one counter/total slot pair.
///
/// Closing (or dropping) a handle only unmaps it locally; the block itself
/// belongs to the coordinator.
#[derive(Debug)]
pub struct WorkerHandle {
    block: Option<CounterBlock>,
    worker_id: usize,
    n_workers: usize,
    shm_name: String,
}

impl WorkerHandle {
    /// Attach to the block called `name` as worker `worker_id`
    pub fn attach(worker_id: usize, name: &str) -> ProgressResult<Self> {
        let block = CounterBlock::attach(name)?;
        block.layout().check_worker(worker_id)?;

        log::debug!(
            "SHMPROG: Worker {} attached to '{}' ({} workers)",
            worker_id,
            name,
            block.n_workers()
        );
        Ok(Self {
            worker_id,
            n_workers: block.n_workers(),
            shm_name: name.to_string(),
            block: Some(block),
        })
    }

    fn block(&self) -> ProgressResult<&CounterBlock> {
        self.block.as_ref().ok_or(ProgressError::Closed)
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Worker count read from the block at attach time
    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    pub fn shm_name(&self) -> &str {
        &self.shm_name
    }

    pub fn is_closed(&self) -> bool {
        self.block.is_none()
    }

    /// Record `delta` more completed steps
    pub fn update(&self, delta: i64) -> ProgressResult<()> {
        self.block()?.add_counter(self.worker_id, delta)
    }

    /// Record one completed step
    pub fn step(&self) -> ProgressResult<()> {
        self.update(1)
    }

    /// Declare this worker's workload. Re-declaring overwrites.
    pub fn set_total_steps(&self, n: i64) -> ProgressResult<()> {
        self.block()?.set_total(self.worker_id, n)
    }

    pub fn get_total_steps(&self) -> ProgressResult<i64> {
        self.block()?.get_total(self.worker_id)
    }

    /// Steps recorded so far by this worker
    pub fn get_steps(&self) -> ProgressResult<i64> {
        self.block()?.get_counter(self.worker_id)
    }

    /// Detach from the block. Idempotent; never destroys the block.
    pub fn close(&mut self) {
        if self.block.take().is_some() {
            log::debug!(
                "SHMPROG: Worker {} detached from '{}'",
                self.worker_id,
                self.shm_name
            );
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run `f` with an attached handle, detaching on every exit path.
///
/// Whatever `f` returns (or panics with) reaches the caller untouched, so a
/// worker's failure stays visible to its supervisor.
pub fn with_worker<T, E, F>(worker_id: usize, name: &str, f: F) -> Result<T, E>
where
    E: From<ProgressError>,
    F: FnOnce(&WorkerHandle) -> Result<T, E>,
{
    let mut handle = WorkerHandle::attach(worker_id, name)?;
    let result = f(&handle);
    handle.close();
    result
}
