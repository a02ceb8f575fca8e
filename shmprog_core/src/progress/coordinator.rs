//! Coordinator: owns a counter block, aggregates it, and runs the display loop

use super::display::{run_display_loop, DisplayOutcome};
use super::render::ProgressRenderer;
use crate::error::{ProgressError, ProgressResult};
use crate::memory::{CounterBlock, ProgressSnapshot, ReadinessRule};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Lifecycle of a [`Coordinator`]. There is no way back from `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Created,
    /// Display task running
    Started,
    /// Cancellation requested, waiting for the display task
    Stopping,
    /// Block released
    Closed,
}

/// The owning side of a counter block.
///
/// `close()` (also run on drop) stops the display task, joins it, and only
/// then destroys the block, so teardown never races a running display.
///
/// A worker that dies before declaring its total leaves its slot at the
/// sentinel forever and readiness never arrives. The display loop then
/// polls until the caller closes the coordinator; no timeout is applied
/// here.
pub struct Coordinator {
    block: Option<Arc<CounterBlock>>,
    shm_name: String,
    n_workers: usize,
    readiness: ReadinessRule,
    cancel: Arc<AtomicBool>,
    display: Option<JoinHandle<DisplayOutcome>>,
    outcome: Option<DisplayOutcome>,
    state: CoordinatorState,
}

impl Coordinator {
    /// Create a new block for `n_workers`, or re-join the block called `name`.
    ///
    /// Re-joining requires the stored worker count to match `n_workers` and
    /// then re-initializes every slot, so progress written before the
    /// re-join is discarded.
    pub fn create(n_workers: usize, name: Option<&str>) -> ProgressResult<Self> {
        let block = match name {
            None => CounterBlock::create(n_workers)?,
            Some(name) => {
                let block = CounterBlock::attach(name)?;
                if block.n_workers() != n_workers {
                    return Err(ProgressError::InvalidWorkerCount(format!(
                        "block '{}' holds {} workers, expected {}",
                        name,
                        block.n_workers(),
                        n_workers
                    )));
                }
                block.reset();
                log::debug!("SHMPROG: Re-joined counter block '{}', slots reset", name);
                block
            }
        };

        Ok(Self {
            shm_name: block.name().to_string(),
            n_workers,
            block: Some(Arc::new(block)),
            readiness: ReadinessRule::default(),
            cancel: Arc::new(AtomicBool::new(false)),
            display: None,
            outcome: None,
            state: CoordinatorState::Created,
        })
    }

    /// Create (or re-join) a block and start the display loop right away.
    ///
    /// The returned coordinator closes itself when dropped, including during
    /// unwinding.
    pub fn start<R>(
        n_workers: usize,
        name: Option<&str>,
        renderer: R,
        refresh: Duration,
    ) -> ProgressResult<Self>
    where
        R: ProgressRenderer + 'static,
    {
        let mut coordinator = Self::create(n_workers, name)?;
        coordinator.run_display_loop(renderer, refresh)?;
        Ok(coordinator)
    }

    pub fn with_readiness(mut self, rule: ReadinessRule) -> Self {
        self.readiness = rule;
        self
    }

    /// Name any process on this host can attach workers with
    pub fn shm_name(&self) -> &str {
        &self.shm_name
    }

    pub fn n_workers(&self) -> usize {
        self.n_workers
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn readiness(&self) -> ReadinessRule {
        self.readiness
    }

    fn block(&self) -> ProgressResult<&CounterBlock> {
        self.block.as_deref().ok_or(ProgressError::Closed)
    }

    /// Sum of every worker's completed steps
    pub fn get_cum_steps(&self) -> ProgressResult<i64> {
        Ok(self.block()?.cum_steps())
    }

    /// Sum of every declared total.
    ///
    /// Undeclared totals count as -1, so this is only a valid target once
    /// [`are_workers_ready`](Self::are_workers_ready) returns true.
    pub fn get_total_steps(&self) -> ProgressResult<i64> {
        Ok(self.block()?.total_steps())
    }

    pub fn are_workers_ready(&self) -> ProgressResult<bool> {
        Ok(self.block()?.are_workers_ready(self.readiness))
    }

    /// Pre-set a worker's total before it starts. Must not race the worker
    /// that owns the slot.
    pub fn set_total_steps(&self, n: i64, worker_id: usize) -> ProgressResult<()> {
        self.block()?.set_total(worker_id, n)
    }

    pub fn snapshot(&self) -> ProgressResult<ProgressSnapshot> {
        Ok(self.block()?.snapshot(self.readiness))
    }

    /// Spawn the single background display task
    pub fn run_display_loop<R>(&mut self, renderer: R, refresh: Duration) -> ProgressResult<()>
    where
        R: ProgressRenderer + 'static,
    {
        match self.state {
            CoordinatorState::Created => {}
            CoordinatorState::Started => return Err(ProgressError::DisplayAlreadyRunning),
            CoordinatorState::Stopping | CoordinatorState::Closed => {
                return Err(ProgressError::Closed)
            }
        }

        let block = Arc::clone(self.block.as_ref().ok_or(ProgressError::Closed)?);
        let cancel = Arc::clone(&self.cancel);
        let readiness = self.readiness;
        let mut renderer = renderer;

        let handle = thread::Builder::new()
            .name(format!("shmprog-display-{}", self.shm_name))
            .spawn(move || run_display_loop(&block, readiness, &cancel, &mut renderer, refresh))?;

        log::debug!(
            "SHMPROG: Display loop started for '{}' (refresh {:?})",
            self.shm_name,
            refresh
        );
        self.display = Some(handle);
        self.state = CoordinatorState::Started;
        Ok(())
    }

    /// True while the display task has not returned yet
    pub fn is_display_running(&self) -> bool {
        self.display
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// How the display loop ended, once it has been joined by `close()`
    pub fn display_outcome(&self) -> Option<DisplayOutcome> {
        self.outcome
    }

    /// Stop the display task, wait for it, then destroy the block.
    ///
    /// Idempotent. Teardown errors are logged, never returned.
    pub fn close(&mut self) {
        if self.state == CoordinatorState::Closed {
            return;
        }
        self.state = CoordinatorState::Stopping;
        self.cancel.store(true, Ordering::Release);

        if let Some(handle) = self.display.take() {
            match handle.join() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(_) => log::warn!("SHMPROG: Display loop for '{}' panicked", self.shm_name),
            }
        }

        // The display task held the only other reference
        drop(self.block.take());
        if let Err(e) = CounterBlock::unlink(&self.shm_name) {
            log::warn!(
                "SHMPROG: Failed to destroy counter block '{}': {}",
                self.shm_name,
                e
            );
        }
        self.state = CoordinatorState::Closed;
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("shm_name", &self.shm_name)
            .field("n_workers", &self.n_workers)
            .field("readiness", &self.readiness)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ShmRegion;
    use crate::progress::render::FnRenderer;

    #[test]
    fn test_state_machine() {
        let mut coordinator = Coordinator::create(1, None).unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Created);

        coordinator
            .run_display_loop(FnRenderer(|_, _| {}), Duration::from_millis(10))
            .unwrap();
        assert_eq!(coordinator.state(), CoordinatorState::Started);
        assert!(matches!(
            coordinator.run_display_loop(FnRenderer(|_, _| {}), Duration::from_millis(10)),
            Err(ProgressError::DisplayAlreadyRunning)
        ));

        coordinator.close();
        assert_eq!(coordinator.state(), CoordinatorState::Closed);
        assert!(matches!(
            coordinator.run_display_loop(FnRenderer(|_, _| {}), Duration::from_millis(10)),
            Err(ProgressError::Closed)
        ));
    }

    #[test]
    fn test_reads_after_close_fail() {
        let mut coordinator = Coordinator::create(2, None).unwrap();
        let name = coordinator.shm_name().to_string();
        coordinator.close();
        assert!(!ShmRegion::exists(&name));
        assert!(matches!(
            coordinator.get_cum_steps(),
            Err(ProgressError::Closed)
        ));
        assert!(coordinator.set_total_steps(3, 0).is_err());
    }

    #[test]
    fn test_rejoin_checks_worker_count() {
        let first = Coordinator::create(2, None).unwrap();
        let err = Coordinator::create(3, Some(first.shm_name())).unwrap_err();
        assert!(matches!(err, ProgressError::InvalidWorkerCount(_)));

        let second = Coordinator::create(2, Some(first.shm_name())).unwrap();
        assert_eq!(second.shm_name(), first.shm_name());
    }

    #[test]
    fn test_rejoin_resets_slots() {
        let first = Coordinator::create(2, None).unwrap();
        {
            let worker = crate::WorkerHandle::attach(0, first.shm_name()).unwrap();
            worker.set_total_steps(9).unwrap();
            worker.update(4).unwrap();
        }
        assert_eq!(first.get_cum_steps().unwrap(), 4);

        let second = Coordinator::create(2, Some(first.shm_name())).unwrap();
        assert_eq!(second.get_cum_steps().unwrap(), 0);
        assert_eq!(second.get_total_steps().unwrap(), -2);
        assert_eq!(first.get_total_steps().unwrap(), -2);
    }

    #[test]
    fn test_extreme_totals_do_not_panic() {
        let coordinator = Coordinator::create(2, None).unwrap();
        coordinator.set_total_steps(i64::MAX, 0).unwrap();
        coordinator.set_total_steps(1, 1).unwrap();
        assert_eq!(coordinator.get_total_steps().unwrap(), i64::MIN);
        assert!(coordinator.are_workers_ready().unwrap());
    }

    #[test]
    fn test_drop_releases_block() {
        let name = {
            let coordinator = Coordinator::create(1, None).unwrap();
            coordinator.shm_name().to_string()
        };
        assert!(!ShmRegion::exists(&name));
    }

    #[test]
    fn test_allow_zero_readiness() {
        let coordinator = Coordinator::create(2, None)
            .unwrap()
            .with_readiness(ReadinessRule::AllowZero);
        coordinator.set_total_steps(0, 0).unwrap();
        coordinator.set_total_steps(4, 1).unwrap();
        assert!(coordinator.are_workers_ready().unwrap());
    }
}
