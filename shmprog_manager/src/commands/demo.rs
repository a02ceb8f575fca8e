use super::worker::{run_worker, DiePoint, WorkerTask};
use crate::progress::progress_renderer;
use crate::worker_env::WORKER_ID_ENV;
use anyhow::{bail, Context, Result};
use rand::Rng;
use shmprog_core::{Coordinator, DisplayConfig, DisplayOutcome, ReadinessRule};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// How the demo launches its workers
#[derive(Debug, Clone)]
pub enum Launcher {
    /// One subprocess per worker, running `<exe> worker ...`
    Processes { exe: PathBuf },
    /// One OS thread per worker in this process
    Threads,
}

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub workers: usize,
    pub min_steps: i64,
    pub max_steps: i64,
    pub step_delay: Duration,
    pub launcher: Launcher,
    pub fail_worker: Option<usize>,
    pub fail_at: DiePoint,
    pub readiness: ReadinessRule,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone)]
pub struct DemoReport {
    pub shm_name: String,
    pub expected_steps: i64,
    pub completed_steps: i64,
    pub failed_workers: Vec<usize>,
    pub outcome: Option<DisplayOutcome>,
}

impl DemoReport {
    pub fn succeeded(&self) -> bool {
        self.failed_workers.is_empty()
    }
}

/// Create a coordinator, run every worker to completion, and tear down.
///
/// Workers that never declare a total keep the display loop waiting; it is
/// cancelled once every worker has exited.
pub fn run_demo(opts: &DemoOptions) -> Result<DemoReport> {
    if opts.workers == 0 {
        bail!("at least one worker is required");
    }
    if opts.min_steps < 0 || opts.min_steps > opts.max_steps {
        bail!(
            "invalid step range {}..={}",
            opts.min_steps,
            opts.max_steps
        );
    }

    let mut coordinator = Coordinator::create(opts.workers, None)?.with_readiness(opts.readiness);
    coordinator.run_display_loop(
        progress_renderer(&opts.display)?,
        opts.display.refresh_interval(),
    )?;
    tracing::info!(
        "Counter block '{}' ready for {} workers",
        coordinator.shm_name(),
        opts.workers
    );

    let mut rng = rand::thread_rng();
    let tasks: Vec<WorkerTask> = (0..opts.workers)
        .map(|worker_id| WorkerTask {
            worker_id,
            shm_name: coordinator.shm_name().to_string(),
            steps: rng.gen_range(opts.min_steps..=opts.max_steps),
            step_delay: opts.step_delay,
            die: (opts.fail_worker == Some(worker_id)).then_some(opts.fail_at),
        })
        .collect();
    let expected_steps = tasks.iter().map(|t| t.steps).sum();

    let failed_workers = match &opts.launcher {
        Launcher::Processes { exe } => run_processes(exe, &tasks),
        Launcher::Threads => run_threads(&tasks),
    };

    let completed_steps = coordinator.get_cum_steps()?;
    let shm_name = coordinator.shm_name().to_string();
    coordinator.close();

    Ok(DemoReport {
        shm_name,
        expected_steps,
        completed_steps,
        failed_workers,
        outcome: coordinator.display_outcome(),
    })
}

fn die_arg(die: DiePoint) -> &'static str {
    match die {
        DiePoint::Start => "start",
        DiePoint::Middle => "middle",
        DiePoint::End => "end",
    }
}

fn worker_command(exe: &Path, task: &WorkerTask) -> Command {
    let mut cmd = Command::new(exe);
    cmd.arg("worker")
        .arg("--shm-name")
        .arg(&task.shm_name)
        .arg("--steps")
        .arg(task.steps.to_string())
        .arg("--step-ms")
        .arg(task.step_delay.as_millis().to_string())
        .env(WORKER_ID_ENV, task.worker_id.to_string())
        .stdin(Stdio::null());
    if let Some(die) = task.die {
        cmd.arg("--die").arg(die_arg(die));
    }
    cmd
}

/// Spawn every worker as a subprocess and wait for all of them.
/// Returns the ids of workers that failed to start or exited unsuccessfully.
fn run_processes(exe: &Path, tasks: &[WorkerTask]) -> Vec<usize> {
    let mut failed = Vec::new();
    let mut children = Vec::new();

    for task in tasks {
        match worker_command(exe, task)
            .spawn()
            .with_context(|| format!("failed to spawn worker {}", task.worker_id))
        {
            Ok(child) => children.push((task.worker_id, child)),
            Err(e) => {
                tracing::warn!("{:#}", e);
                failed.push(task.worker_id);
            }
        }
    }

    for (worker_id, mut child) in children {
        match child.wait() {
            Ok(status) if status.success() => {}
            Ok(status) => {
                tracing::warn!("worker {} exited with {}", worker_id, status);
                failed.push(worker_id);
            }
            Err(e) => {
                tracing::warn!("failed to wait for worker {}: {}", worker_id, e);
                failed.push(worker_id);
            }
        }
    }

    failed.sort_unstable();
    failed
}

/// Run every worker on its own thread and join all of them
fn run_threads(tasks: &[WorkerTask]) -> Vec<usize> {
    let mut failed = Vec::new();
    let mut handles = Vec::new();

    for task in tasks {
        let worker_id = task.worker_id;
        let task = task.clone();
        let spawned = thread::Builder::new()
            .name(format!("shmprog-worker-{}", worker_id))
            .spawn(move || run_worker(&task));
        match spawned {
            Ok(handle) => handles.push((worker_id, handle)),
            Err(e) => {
                tracing::warn!("failed to spawn worker {}: {}", worker_id, e);
                failed.push(worker_id);
            }
        }
    }

    for (worker_id, handle) in handles {
        match handle.join() {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!("worker {} failed: {:#}", worker_id, e);
                failed.push(worker_id);
            }
            Err(_) => {
                tracing::warn!("worker {} panicked", worker_id);
                failed.push(worker_id);
            }
        }
    }

    failed.sort_unstable();
    failed
}
