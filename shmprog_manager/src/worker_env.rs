//! Worker id delivery convention
//!
//! Launched workers learn their slot from `SHMPROG_WORKER_ID` and the block
//! from `SHMPROG_SHM_NAME`, unless given explicitly on the command line.

use anyhow::{anyhow, Context, Result};

pub const WORKER_ID_ENV: &str = "SHMPROG_WORKER_ID";
pub const SHM_NAME_ENV: &str = "SHMPROG_SHM_NAME";

/// Resolve the worker id from an explicit value or the environment
pub fn resolve_worker_id(explicit: Option<usize>) -> Result<usize> {
    if let Some(id) = explicit {
        return Ok(id);
    }
    let raw = std::env::var(WORKER_ID_ENV)
        .with_context(|| format!("no --worker-id given and {} is not set", WORKER_ID_ENV))?;
    parse_worker_id(&raw)
}

/// Resolve the block name from an explicit value or the environment
pub fn resolve_shm_name(explicit: Option<String>) -> Result<String> {
    match explicit {
        Some(name) => Ok(name),
        None => std::env::var(SHM_NAME_ENV)
            .with_context(|| format!("no --shm-name given and {} is not set", SHM_NAME_ENV)),
    }
}

pub fn parse_worker_id(raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a non-negative integer, got '{}'", WORKER_ID_ENV, raw))
}
