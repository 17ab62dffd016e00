//! The gate report: everything one run produced, in one structure.
//!
//! This is what the core hands back to the calling workflow. The caller is
//! the sole owner of what happens next: prompting a human on
//! `confirm_required`, refusing completion on `blocked`, reducing scope on
//! `halt`. The core never blocks on interactive input itself.

use crate::breaker::BreakerSnapshot;
use crate::escalation::{EscalationVerdict, ScopeClassification};
use crate::executor::CheckResult;
use crate::policy::{GateDecision, GateStatus};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Aggregate output of one gate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    pub run_id: Uuid,
    pub task_key: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Scope the escalation rules were evaluated against.
    pub scope: ScopeClassification,
    pub decision: GateDecision,
    /// All check results in registry priority order. Empty when the run was
    /// halted before execution.
    #[serde(default)]
    pub results: Vec<CheckResult>,
    pub breaker: BreakerSnapshot,
    pub escalation: EscalationVerdict,
}

impl GateReport {
    pub fn status(&self) -> GateStatus {
        self.decision.status
    }

    /// True when the caller must stop: the gate blocked or escalation halted.
    pub fn is_hard_stop(&self) -> bool {
        self.decision.is_blocked() || self.escalation.is_halt()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize gate report")
    }
}

impl fmt::Display for GateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "gate {} [{}]: {} ({} checks, {} ms)",
            self.run_id,
            self.task_key,
            self.status(),
            self.results.len(),
            self.duration_ms
        )?;
        for result in &self.results {
            writeln!(f, "  {}", result)?;
        }
        writeln!(
            f,
            "  breaker: {} ({} consecutive failures)",
            self.breaker.state, self.breaker.consecutive_failures
        )?;
        write!(f, "  escalation: {}", self.escalation.action)?;
        if !self.escalation.reason.is_empty() {
            write!(f, " ({})", self.escalation.reason)?;
        }
        for advisory in &self.decision.advisories {
            write!(f, "\n  advisory: {}", advisory)?;
        }
        Ok(())
    }
}
