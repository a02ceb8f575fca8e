//! SHMPROG Manager Library
//!
//! Launch harness and inspection commands for the `shmprog` binary.

pub mod commands;
pub mod progress;
pub mod worker_env;
