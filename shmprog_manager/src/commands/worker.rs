use anyhow::{bail, Result};
use clap::ValueEnum;
use shmprog_core::with_worker;
use std::time::Duration;

/// Where a worker should fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiePoint {
    /// Before attaching; the slot's total is never declared
    Start,
    /// Halfway through its steps
    Middle,
    /// After finishing and detaching
    End,
}

/// What one worker should do
#[derive(Debug, Clone)]
pub struct WorkerTask {
    pub worker_id: usize,
    pub shm_name: String,
    pub steps: i64,
    pub step_delay: Duration,
    pub die: Option<DiePoint>,
}

/// Attach, declare the total, step through the work, detach.
///
/// Returns the number of steps performed. Failures are returned to the
/// caller, which decides how they reach the supervisor (exit status for
/// subprocesses, the join result for threads).
pub fn run_worker(task: &WorkerTask) -> Result<i64> {
    if task.die == Some(DiePoint::Start) {
        bail!("worker {} died at start", task.worker_id);
    }

    let steps = with_worker(task.worker_id, &task.shm_name, |worker| -> Result<i64> {
        worker.set_total_steps(task.steps)?;
        for step in 0..task.steps {
            if task.die == Some(DiePoint::Middle) && step == task.steps / 2 {
                bail!("worker {} died after {} steps", task.worker_id, step);
            }
            if !task.step_delay.is_zero() {
                std::thread::sleep(task.step_delay);
            }
            worker.step()?;
        }
        Ok(task.steps)
    })?;

    if task.die == Some(DiePoint::End) {
        bail!("worker {} died after finishing", task.worker_id);
    }
    tracing::debug!("worker {} finished {} steps", task.worker_id, steps);
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmprog_core::Coordinator;

    fn task(worker_id: usize, shm_name: &str, steps: i64, die: Option<DiePoint>) -> WorkerTask {
        WorkerTask {
            worker_id,
            shm_name: shm_name.to_string(),
            steps,
            step_delay: Duration::ZERO,
            die,
        }
    }

    #[test]
    fn test_worker_completes() {
        let coordinator = Coordinator::create(1, None).unwrap();
        let done = run_worker(&task(0, coordinator.shm_name(), 6, None)).unwrap();
        assert_eq!(done, 6);
        assert_eq!(coordinator.get_cum_steps().unwrap(), 6);
        assert!(coordinator.are_workers_ready().unwrap());
    }

    #[test]
    fn test_worker_dies_at_start_without_declaring() {
        let coordinator = Coordinator::create(1, None).unwrap();
        assert!(run_worker(&task(0, coordinator.shm_name(), 6, Some(DiePoint::Start))).is_err());
        assert_eq!(coordinator.get_total_steps().unwrap(), -1);
    }

    #[test]
    fn test_worker_dies_midway() {
        let coordinator = Coordinator::create(1, None).unwrap();
        assert!(run_worker(&task(0, coordinator.shm_name(), 10, Some(DiePoint::Middle))).is_err());
        assert_eq!(coordinator.get_cum_steps().unwrap(), 5);
        assert_eq!(coordinator.get_total_steps().unwrap(), 10);
    }

    #[test]
    fn test_worker_dies_at_end_after_progress() {
        let coordinator = Coordinator::create(1, None).unwrap();
        assert!(run_worker(&task(0, coordinator.shm_name(), 3, Some(DiePoint::End))).is_err());
        assert_eq!(coordinator.get_cum_steps().unwrap(), 3);
    }
}
