use anyhow::Result;
use colored::*;
use shmprog_core::{CounterBlock, ProgressSnapshot, ReadinessRule, TOTAL_UNSET};

/// Read a block through a non-owning attachment; the block is left in place
pub fn read_status(shm_name: &str, readiness: ReadinessRule) -> Result<ProgressSnapshot> {
    let block = CounterBlock::attach(shm_name)?;
    Ok(block.snapshot(readiness))
}

pub fn format_status(snapshot: &ProgressSnapshot) -> String {
    let mut out = String::new();
    let ready = if snapshot.ready {
        "ready".green()
    } else {
        "waiting".yellow()
    };
    out.push_str(&format!(
        "{} {} ({} workers, {})\n",
        "Block".bold(),
        snapshot.name.cyan(),
        snapshot.n_workers,
        ready
    ));

    for (id, (steps, total)) in snapshot
        .counters
        .iter()
        .zip(snapshot.totals.iter())
        .enumerate()
    {
        let total = if *total == TOTAL_UNSET {
            "?".dimmed().to_string()
        } else {
            total.to_string()
        };
        out.push_str(&format!("  worker {:>3}: {:>10} / {}\n", id, steps, total));
    }

    if snapshot.ready {
        out.push_str(&format!(
            "  {}: {} / {}\n",
            "total".bold(),
            snapshot.cum_steps,
            snapshot.total_steps
        ));
    } else {
        out.push_str(&format!(
            "  {}: {} (total pending)\n",
            "total".bold(),
            snapshot.cum_steps
        ));
    }
    out
}
