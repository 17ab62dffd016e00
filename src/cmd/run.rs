//! The `run` command: execute one gate run and emit its report.
//!
//! The JSON report goes to stdout for the calling workflow; the optional
//! human summary goes to stderr. The process exit code mirrors the report:
//! `0` pass/warned, `1` blocked, `2` halted by escalation.

use anyhow::Result;
use gauntlet::config::GateConfig;
use gauntlet::orchestrator::{GateOrchestrator, GateRunRequest};
use gauntlet::ui;
use std::path::Path;

pub const EXIT_PASS: i32 = 0;
pub const EXIT_BLOCKED: i32 = 1;
pub const EXIT_HALTED: i32 = 2;

pub async fn cmd_run(
    project_root: &Path,
    task_key: &str,
    changed_files: Vec<String>,
    blast_radius: u32,
    human: bool,
) -> Result<i32> {
    let config = GateConfig::load(project_root)?;
    let orchestrator = GateOrchestrator::from_config(project_root, &config)?;

    let request = GateRunRequest::new(task_key)
        .with_changed_files(changed_files)
        .with_blast_radius(blast_radius);
    let report = orchestrator.run_gate(request).await?;

    println!("{}", report.to_json()?);
    if human {
        ui::print_report(&report);
    }

    let exit_code = if report.escalation.is_halt() {
        EXIT_HALTED
    } else if report.decision.is_blocked() {
        EXIT_BLOCKED
    } else {
        EXIT_PASS
    };
    Ok(exit_code)
}
