use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use shmprog_core::{DisplayConfig, ReadinessRule};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shmprog_manager::commands::demo::{run_demo, DemoOptions, Launcher};
use shmprog_manager::commands::status::{format_status, read_status};
use shmprog_manager::commands::worker::{run_worker, DiePoint, WorkerTask};
use shmprog_manager::{progress, worker_env};

#[derive(Parser)]
#[command(name = "shmprog")]
#[command(about = "Aggregate progress from independent workers through shared memory")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Suppress progress bars and status lines
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Readiness {
    /// Every worker must declare a positive total
    Positive,
    /// Zero-step workers also count as ready
    AllowZero,
}

impl From<Readiness> for ReadinessRule {
    fn from(value: Readiness) -> Self {
        match value {
            Readiness::Positive => ReadinessRule::Positive,
            Readiness::AllowZero => ReadinessRule::AllowZero,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a block, launch workers against it, and show aggregate progress
    Demo {
        /// Number of workers
        #[arg(short = 'n', long, default_value = "4")]
        workers: usize,
        /// Fewest steps a worker is given
        #[arg(long, default_value = "10")]
        min_steps: i64,
        /// Most steps a worker is given
        #[arg(long, default_value = "20")]
        max_steps: i64,
        /// Simulated work per step in milliseconds
        #[arg(long, default_value = "100")]
        step_ms: u64,
        /// Run workers as threads instead of subprocesses
        #[arg(long)]
        threads: bool,
        /// Make this worker fail on purpose
        #[arg(long, value_name = "ID")]
        fail_worker: Option<usize>,
        /// Where the failing worker dies
        #[arg(long, value_enum, default_value = "middle")]
        fail_at: DiePoint,
        #[arg(long, value_enum, default_value = "positive")]
        readiness: Readiness,
        /// TOML display configuration (defaults plus SHMPROG_* env otherwise)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run one worker against an existing block
    Worker {
        /// Block name (or SHMPROG_SHM_NAME)
        #[arg(long)]
        shm_name: Option<String>,
        /// Worker slot (or SHMPROG_WORKER_ID)
        #[arg(long)]
        worker_id: Option<usize>,
        /// Steps to perform
        #[arg(long)]
        steps: i64,
        /// Simulated work per step in milliseconds
        #[arg(long, default_value = "100")]
        step_ms: u64,
        /// Exit with failure at this point
        #[arg(long, value_enum)]
        die: Option<DiePoint>,
    },

    /// Print the state of a block without taking ownership of it
    Status {
        /// Block name
        shm_name: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        #[arg(long, value_enum, default_value = "positive")]
        readiness: Readiness,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    progress::set_quiet(cli.quiet);

    if let Err(e) = run_command(cli.command) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Demo {
            workers,
            min_steps,
            max_steps,
            step_ms,
            threads,
            fail_worker,
            fail_at,
            readiness,
            config,
        } => {
            let display = match config {
                Some(path) => DisplayConfig::from_toml_file(path)?.with_env_overrides()?,
                None => DisplayConfig::from_env()?,
            };
            let launcher = if threads {
                Launcher::Threads
            } else {
                Launcher::Processes {
                    exe: std::env::current_exe().context("cannot locate the shmprog binary")?,
                }
            };

            let report = run_demo(&DemoOptions {
                workers,
                min_steps,
                max_steps,
                step_delay: Duration::from_millis(step_ms),
                launcher,
                fail_worker,
                fail_at,
                readiness: readiness.into(),
                display,
            })?;

            let summary = format!(
                "{} / {} steps completed on '{}'",
                report.completed_steps, report.expected_steps, report.shm_name
            );
            if report.succeeded() {
                progress::finish_success(&summary);
                Ok(())
            } else {
                progress::finish_error(&summary);
                bail!(
                    "{} worker(s) failed: {:?}",
                    report.failed_workers.len(),
                    report.failed_workers
                )
            }
        }

        Commands::Worker {
            shm_name,
            worker_id,
            steps,
            step_ms,
            die,
        } => {
            let task = WorkerTask {
                worker_id: worker_env::resolve_worker_id(worker_id)?,
                shm_name: worker_env::resolve_shm_name(shm_name)?,
                steps,
                step_delay: Duration::from_millis(step_ms),
                die,
            };
            let done = run_worker(&task)?;
            tracing::info!("worker {} done ({} steps)", task.worker_id, done);
            Ok(())
        }

        Commands::Status {
            shm_name,
            json,
            readiness,
        } => {
            let snapshot = read_status(&shm_name, readiness.into())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", format_status(&snapshot));
            }
            Ok(())
        }
    }
}
