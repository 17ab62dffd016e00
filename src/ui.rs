//! Terminal rendering for gate reports and registry listings.
//!
//! Everything here writes to stderr; stdout is reserved for the
//! machine-readable JSON report.

use crate::breaker::FailureStreak;
use crate::escalation::EscalationAction;
use crate::executor::{CheckOutcome, CheckResult};
use crate::journal::JournalEntry;
use crate::policy::GateStatus;
use crate::registry::CheckRegistry;
use crate::report::GateReport;
use console::style;

/// Render the boxed human summary for one gate run.
pub fn render_report(report: &GateReport) -> String {
    let mut lines = Vec::new();
    lines.push(format!("QUALITY GATE - task {}", report.task_key));
    lines.push(String::new());

    for result in &report.results {
        lines.push(format!(
            "  {:<14} {:<8} {:>6} ms  {}",
            result.check_id,
            outcome_label(result),
            result.duration_ms,
            result.summary
        ));
    }
    if report.results.is_empty() {
        lines.push("  (no checks executed)".to_string());
    }

    lines.push(String::new());
    lines.push(format!("  Gate:       {}", status_label(report.status())));
    lines.push(format!(
        "  Breaker:    {} ({} consecutive failures)",
        report.breaker.state, report.breaker.consecutive_failures
    ));
    let escalation = match report.escalation.action {
        EscalationAction::Proceed => format!("{}", style("proceed").green()),
        EscalationAction::ConfirmRequired => {
            format!("{} - {}", style("confirm required").yellow(), report.escalation.reason)
        }
        EscalationAction::Halt => {
            format!("{} - {}", style("HALT").red().bold(), report.escalation.reason)
        }
    };
    lines.push(format!("  Escalation: {}", escalation));

    for advisory in &report.decision.advisories {
        lines.push(format!("  {} {}", style("advisory:").dim(), advisory));
    }
    for result in &report.decision.blocking_failures {
        for finding in &result.findings {
            lines.push(format!("    {}", finding));
        }
    }

    lines.join("\n")
}

pub fn print_report(report: &GateReport) {
    eprintln!("{}", render_report(report));
}

fn outcome_label(result: &CheckResult) -> String {
    match result.outcome {
        CheckOutcome::Pass => style("pass").green().to_string(),
        CheckOutcome::Fail => style("FAIL").red().bold().to_string(),
        CheckOutcome::Error => style("error").yellow().to_string(),
        CheckOutcome::Skipped => style("skip").dim().to_string(),
    }
}

fn status_label(status: GateStatus) -> String {
    match status {
        GateStatus::Pass => style("PASS").green().bold().to_string(),
        GateStatus::Blocked => style("BLOCKED").red().bold().to_string(),
        GateStatus::Warned => style("WARNED").yellow().bold().to_string(),
    }
}

/// Render the effective registry as a table.
pub fn render_registry(registry: &CheckRegistry) -> String {
    if registry.is_empty() {
        return "No checks configured (registry is empty).".to_string();
    }
    let mut lines = Vec::new();
    lines.push(format!(
        "{:<14} {:<9} {:<9} {:>8}  Command",
        "Check", "Priority", "Class", "Timeout"
    ));
    for check in registry.checks() {
        lines.push(format!(
            "{:<14} {:<9} {:<9} {:>7}s  {}",
            check.id,
            check.priority,
            check.blocking.to_string(),
            check.timeout_secs,
            check.command.display_command()
        ));
    }
    lines.join("\n")
}

/// Render breaker streaks and recent journal entries for `status`.
pub fn render_status(streaks: &[FailureStreak], threshold: u32, recent: &[JournalEntry]) -> String {
    let mut lines = Vec::new();
    if streaks.is_empty() {
        lines.push("No failure streaks recorded.".to_string());
    } else {
        lines.push(format!(
            "{:<20} {:<9} Consecutive failures",
            "Task", "Breaker"
        ));
        for streak in streaks {
            lines.push(format!(
                "{:<20} {:<9} {}",
                streak.task_key,
                streak.state(threshold).to_string(),
                streak.consecutive_failures
            ));
        }
    }

    if !recent.is_empty() {
        lines.push(String::new());
        lines.push("Recent gate runs:".to_string());
        for entry in recent {
            lines.push(format!(
                "  {}  {:<20} {:<8} {} blocking / {} warnings ({} ms)",
                entry.finished_at.format("%Y-%m-%d %H:%M:%S"),
                entry.task_key,
                entry.status.to_string(),
                entry.blocking_failures,
                entry.warnings,
                entry.duration_ms
            ));
        }
    }
    lines.join("\n")
}
