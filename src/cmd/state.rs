//! Breaker status and explicit reset commands.

use anyhow::Result;
use gauntlet::breaker::store::StreakStore;
use gauntlet::config::GateConfig;
use gauntlet::journal::RunJournal;
use gauntlet::ui;
use std::path::Path;

pub fn cmd_status(project_root: &Path, task_key: Option<&str>, limit: usize) -> Result<()> {
    let config = GateConfig::load(project_root)?;
    let state_dir = config.state_dir(project_root);
    let store = StreakStore::new(&state_dir, config.gate.failure_threshold);
    let journal = RunJournal::new(&state_dir);

    let streaks = match task_key {
        Some(key) => vec![store.get(key)?],
        None => store.all()?,
    };
    let mut recent = journal.recent(limit)?;
    if let Some(key) = task_key {
        recent.retain(|entry| entry.task_key == key);
    }

    println!(
        "{}",
        ui::render_status(&streaks, config.gate.failure_threshold, &recent)
    );
    Ok(())
}

/// Explicit user override: clear the streak and any breaker trip.
pub fn cmd_reset(project_root: &Path, task_key: &str) -> Result<()> {
    let config = GateConfig::load(project_root)?;
    let store = StreakStore::new(
        config.state_dir(project_root),
        config.gate.failure_threshold,
    );
    let streak = store.reset(task_key)?;
    println!(
        "Breaker reset for task '{}' (consecutive failures: {}).",
        streak.task_key, streak.consecutive_failures
    );
    Ok(())
}
