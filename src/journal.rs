//! Append-only journal of gate-run summaries.
//!
//! One JSON line per run under the state directory. Enough history for the
//! periodic trend-snapshot caller event; full reports are not persisted.

use crate::escalation::EscalationAction;
use crate::policy::GateStatus;
use crate::report::GateReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

const JOURNAL_FILE: &str = "journal.jsonl";

/// One summarized gate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub run_id: Uuid,
    pub task_key: String,
    pub finished_at: DateTime<Utc>,
    pub status: GateStatus,
    pub blocking_failures: usize,
    pub warnings: usize,
    pub consecutive_failures: u32,
    pub escalation: EscalationAction,
    pub duration_ms: u64,
}

impl From<&GateReport> for JournalEntry {
    fn from(report: &GateReport) -> Self {
        Self {
            run_id: report.run_id,
            task_key: report.task_key.clone(),
            finished_at: Utc::now(),
            status: report.status(),
            blocking_failures: report.decision.blocking_failures.len(),
            warnings: report.decision.warnings.len(),
            consecutive_failures: report.breaker.consecutive_failures,
            escalation: report.escalation.action,
            duration_ms: report.duration_ms,
        }
    }
}

pub struct RunJournal {
    journal_file: PathBuf,
}

impl RunJournal {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            journal_file: state_dir.into().join(JOURNAL_FILE),
        }
    }

    pub fn append(&self, report: &GateReport) -> Result<()> {
        if let Some(parent) = self.journal_file.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let entry = JournalEntry::from(report);
        let line = serde_json::to_string(&entry).context("Failed to serialize journal entry")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_file)
            .context("Failed to open run journal")?;
        writeln!(file, "{}", line).context("Failed to append journal entry")?;
        Ok(())
    }

    /// Most recent entries, oldest first. Unparseable lines are skipped.
    pub fn recent(&self, limit: usize) -> Result<Vec<JournalEntry>> {
        if !self.journal_file.exists() {
            return Ok(Vec::new());
        }
        let content =
            fs::read_to_string(&self.journal_file).context("Failed to read run journal")?;
        let entries: Vec<JournalEntry> = content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerSnapshot, BreakerState};
    use crate::escalation::{EscalationVerdict, ScopeClassification};
    use crate::policy::GateDecision;
    use tempfile::tempdir;

    fn report(task_key: &str, status: GateStatus) -> GateReport {
        GateReport {
            run_id: Uuid::new_v4(),
            task_key: task_key.to_string(),
            started_at: Utc::now(),
            duration_ms: 10,
            scope: ScopeClassification::classify(1, 0),
            decision: GateDecision {
                status,
                ..GateDecision::pass()
            },
            results: vec![],
            breaker: BreakerSnapshot {
                state: BreakerState::Normal,
                consecutive_failures: 0,
            },
            escalation: EscalationVerdict::proceed(),
        }
    }

    #[test]
    fn test_append_and_recent_roundtrip() {
        let dir = tempdir().unwrap();
        let journal = RunJournal::new(dir.path().join("state"));

        journal.append(&report("T1", GateStatus::Pass)).unwrap();
        journal.append(&report("T1", GateStatus::Blocked)).unwrap();

        let entries = journal.recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, GateStatus::Pass);
        assert_eq!(entries[1].status, GateStatus::Blocked);
    }

    #[test]
    fn test_recent_returns_tail() {
        let dir = tempdir().unwrap();
        let journal = RunJournal::new(dir.path().join("state"));
        for _ in 0..5 {
            journal.append(&report("T1", GateStatus::Pass)).unwrap();
        }
        journal.append(&report("T1", GateStatus::Blocked)).unwrap();

        let entries = journal.recent(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].status, GateStatus::Blocked);
    }

    #[test]
    fn test_recent_on_missing_file() {
        let dir = tempdir().unwrap();
        let journal = RunJournal::new(dir.path().join("state"));
        assert!(journal.recent(10).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let journal = RunJournal::new(&state_dir);
        journal.append(&report("T1", GateStatus::Pass)).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(state_dir.join(JOURNAL_FILE))
            .unwrap();
        writeln!(file, "not json").unwrap();

        let entries = journal.recent(10).unwrap();
        assert_eq!(entries.len(), 1);
    }
}
