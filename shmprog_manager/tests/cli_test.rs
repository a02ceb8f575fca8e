// Test the shmprog binary across real process boundaries
use shmprog_core::Coordinator;
use shmprog_manager::worker_env::WORKER_ID_ENV;
use std::process::{Command, Output};

fn shmprog(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_shmprog"));
    cmd.arg("--quiet").args(args).env("SHMPROG_HIDDEN", "1");
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run shmprog")
}

#[test]
fn test_worker_process_writes_its_slot() {
    let coordinator = Coordinator::create(2, None).unwrap();

    let output = run(shmprog(&[
        "worker",
        "--shm-name",
        coordinator.shm_name(),
        "--steps",
        "5",
        "--step-ms",
        "0",
    ])
    .env(WORKER_ID_ENV, "1"));
    assert!(output.status.success(), "{:?}", output);

    let snapshot = coordinator.snapshot().unwrap();
    assert_eq!(snapshot.counters, vec![0, 5]);
    assert_eq!(snapshot.totals, vec![-1, 5]);
}

#[test]
fn test_worker_process_rejects_bad_id() {
    let coordinator = Coordinator::create(3, None).unwrap();

    let output = run(&mut shmprog(&[
        "worker",
        "--shm-name",
        coordinator.shm_name(),
        "--steps",
        "1",
        "--worker-id",
        "5",
    ]));
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(coordinator.get_total_steps().unwrap(), -3);
}

#[test]
fn test_worker_process_failure_is_exit_status() {
    let coordinator = Coordinator::create(1, None).unwrap();

    let output = run(shmprog(&[
        "worker",
        "--shm-name",
        coordinator.shm_name(),
        "--steps",
        "4",
        "--step-ms",
        "0",
        "--die",
        "end",
    ])
    .env(WORKER_ID_ENV, "0"));
    assert_eq!(output.status.code(), Some(1));
    // Progress made before failing is still counted
    assert_eq!(coordinator.get_cum_steps().unwrap(), 4);
}

#[test]
fn test_attach_to_destroyed_block_fails() {
    let mut coordinator = Coordinator::create(1, None).unwrap();
    let name = coordinator.shm_name().to_string();
    coordinator.close();

    let output = run(shmprog(&["worker", "--shm-name", &name, "--steps", "1"])
        .env(WORKER_ID_ENV, "0"));
    assert!(!output.status.success());
}

#[test]
fn test_demo_with_subprocesses() {
    let output = run(&mut shmprog(&[
        "demo",
        "-n",
        "3",
        "--min-steps",
        "2",
        "--max-steps",
        "4",
        "--step-ms",
        "1",
    ]));
    assert!(output.status.success(), "{:?}", output);
}

#[test]
fn test_demo_reports_dead_worker() {
    let output = run(&mut shmprog(&[
        "demo",
        "-n",
        "3",
        "--min-steps",
        "2",
        "--max-steps",
        "4",
        "--step-ms",
        "1",
        "--fail-worker",
        "1",
        "--fail-at",
        "start",
    ]));
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("worker(s) failed"));
}

#[test]
fn test_status_json() {
    let coordinator = Coordinator::create(2, None).unwrap();
    coordinator.set_total_steps(3, 0).unwrap();

    let output = run(&mut shmprog(&["status", coordinator.shm_name(), "--json"]));
    assert!(output.status.success(), "{:?}", output);

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["n_workers"], 2);
    assert_eq!(json["total_steps"], 2);
    assert_eq!(json["ready"], false);
    // Status reads never destroy the block
    assert!(coordinator.get_cum_steps().is_ok());
    assert!(shmprog_core::memory::ShmRegion::exists(coordinator.shm_name()));
}
