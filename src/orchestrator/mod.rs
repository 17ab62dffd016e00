//! Gate orchestration: one complete registry pass per run.
//!
//! Flow for a single run:
//! 1. classify scope from the changed-file set and blast radius
//! 2. read the task key's failure streak
//! 3. pre-escalation: a `Halt` verdict ends the run with zero executor
//!    invocations and no breaker update
//! 4. execute every configured check, in parallel up to the worker limit;
//!    completed results are buffered and re-sorted so the report always
//!    reflects registry priority, not completion order
//! 5. evaluate the policy into a decision
//! 6. durably record the decision against the streak
//! 7. post-escalation with the updated breaker, so a trip caused by this
//!    very run is visible in its own report
//!
//! Only one gate run may be active per task key; a second request for an
//! in-flight key is rejected, never interleaved, because the streak counter
//! is a read-modify-write record. Runs for distinct keys are independent.

use crate::breaker::store::StreakStore;
use crate::config::GateConfig;
use crate::errors::GateError;
use crate::escalation::{self, ScopeClassification};
use crate::executor::{CheckExecutor, CheckResult};
use crate::journal::RunJournal;
use crate::policy::{self, GateDecision};
use crate::registry::CheckRegistry;
use crate::report::GateReport;
use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

/// Advisory attached to the decision of a run halted before execution.
pub const HALTED_ADVISORY: &str =
    "checks were not executed: escalation halted this gate run before execution";

/// Caller-supplied description of one gate run.
#[derive(Debug, Clone)]
pub struct GateRunRequest {
    pub task_key: String,
    /// Files touched by the current change; drives scope classification and
    /// the optional per-check scope filter.
    pub changed_files: Vec<String>,
    /// Estimated dependent-file count, produced by an external collaborator.
    pub blast_radius: u32,
}

impl GateRunRequest {
    pub fn new(task_key: impl Into<String>) -> Self {
        Self {
            task_key: task_key.into(),
            changed_files: Vec::new(),
            blast_radius: 0,
        }
    }

    pub fn with_changed_files(mut self, changed_files: Vec<String>) -> Self {
        self.changed_files = changed_files;
        self
    }

    pub fn with_blast_radius(mut self, blast_radius: u32) -> Self {
        self.blast_radius = blast_radius;
        self
    }
}

/// Drives gate runs against one project.
pub struct GateOrchestrator {
    project_root: PathBuf,
    registry: CheckRegistry,
    store: StreakStore,
    journal: RunJournal,
    worker_limit: usize,
    in_flight: Mutex<HashSet<String>>,
}

impl GateOrchestrator {
    pub fn new(
        project_root: impl Into<PathBuf>,
        registry: CheckRegistry,
        store: StreakStore,
        journal: RunJournal,
        worker_limit: usize,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            registry,
            store,
            journal,
            worker_limit: worker_limit.max(1),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Assemble an orchestrator from loaded configuration.
    pub fn from_config(project_root: impl Into<PathBuf>, config: &GateConfig) -> Result<Self> {
        let project_root = project_root.into();
        let registry = config.registry(&project_root)?;
        let state_dir = config.state_dir(&project_root);
        Ok(Self::new(
            project_root,
            registry,
            StreakStore::new(&state_dir, config.gate.failure_threshold),
            RunJournal::new(&state_dir),
            config.gate.worker_limit,
        ))
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    /// Execute one complete gate run and produce its report.
    pub async fn run_gate(&self, request: GateRunRequest) -> Result<GateReport, GateError> {
        let _guard = self.claim_key(&request.task_key)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let threshold = self.store.threshold();

        let scope =
            ScopeClassification::classify(request.changed_files.len(), request.blast_radius);
        let streak = self.store.get(&request.task_key)?;
        let pre_verdict = escalation::evaluate(&scope, streak.state(threshold));

        if pre_verdict.is_halt() {
            warn!(
                task_key = %request.task_key,
                blast_radius = scope.blast_radius,
                "gate run halted before execution"
            );
            let report = GateReport {
                run_id,
                task_key: request.task_key.clone(),
                started_at,
                duration_ms: start.elapsed().as_millis() as u64,
                scope,
                decision: GateDecision::pass().with_advisory(HALTED_ADVISORY),
                results: Vec::new(),
                breaker: streak.snapshot(threshold),
                escalation: pre_verdict,
            };
            self.journal_best_effort(&report);
            return Ok(report);
        }

        let results = self.execute_pass(&request).await;
        let decision = policy::evaluate(&self.registry, &results)?;
        debug!(
            task_key = %request.task_key,
            status = %decision.status,
            blocking = decision.blocking_failures.len(),
            warnings = decision.warnings.len(),
            "registry pass evaluated"
        );

        let streak = self
            .store
            .record_decision(&request.task_key, decision.status)?;
        let post_verdict = escalation::evaluate(&scope, streak.state(threshold));

        let report = GateReport {
            run_id,
            task_key: request.task_key.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            scope,
            decision,
            results,
            breaker: streak.snapshot(threshold),
            escalation: post_verdict,
        };
        self.journal_best_effort(&report);
        Ok(report)
    }

    /// Run every check in the registry, bounded by the worker limit, and
    /// return results in registry priority order.
    async fn execute_pass(&self, request: &GateRunRequest) -> Vec<CheckResult> {
        let executor = CheckExecutor::new(&self.project_root)
            .with_changed_files(request.changed_files.clone());
        let semaphore = Arc::new(Semaphore::new(self.worker_limit));

        let futures = self.registry.checks().iter().map(|descriptor| {
            let semaphore = Arc::clone(&semaphore);
            let executor = &executor;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("check semaphore is never closed");
                executor.execute(descriptor).await
            }
        });

        let mut results = join_all(futures).await;
        results.sort_by_key(|result| {
            self.registry
                .get(&result.check_id)
                .map(|d| d.priority)
                .unwrap_or(u32::MAX)
        });
        results
    }

    fn claim_key(&self, task_key: &str) -> Result<KeyGuard<'_>, GateError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| GateError::Other(anyhow::anyhow!("in-flight key set poisoned")))?;
        if !in_flight.insert(task_key.to_string()) {
            return Err(GateError::RunInFlight {
                task_key: task_key.to_string(),
            });
        }
        Ok(KeyGuard {
            in_flight: &self.in_flight,
            task_key: task_key.to_string(),
        })
    }

    fn journal_best_effort(&self, report: &GateReport) {
        if let Err(e) = self.journal.append(report) {
            warn!(error = %e, "failed to append run journal entry");
        }
    }
}

/// Releases the task key when the run finishes, however it finishes.
struct KeyGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    task_key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.task_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerState, DEFAULT_FAILURE_THRESHOLD};
    use crate::escalation::EscalationAction;
    use crate::executor::CheckOutcome;
    use crate::policy::{GateStatus, ZERO_COVERAGE_ADVISORY};
    use crate::registry::{BlockingClass, CheckDescriptor};
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn sh(id: &str, priority: u32, script: &str) -> CheckDescriptor {
        CheckDescriptor::new(
            id,
            priority,
            BlockingClass::Blocking,
            vec!["sh".into(), "-c".into(), script.into()],
        )
    }

    fn orchestrator(dir: &TempDir, checks: Vec<CheckDescriptor>) -> GateOrchestrator {
        orchestrator_with_workers(dir, checks, 4)
    }

    fn orchestrator_with_workers(
        dir: &TempDir,
        checks: Vec<CheckDescriptor>,
        worker_limit: usize,
    ) -> GateOrchestrator {
        let state_dir = dir.path().join(".gauntlet/state");
        GateOrchestrator::new(
            dir.path(),
            CheckRegistry::new(checks).unwrap(),
            StreakStore::new(&state_dir, DEFAULT_FAILURE_THRESHOLD),
            RunJournal::new(&state_dir),
            worker_limit,
        )
    }

    #[tokio::test]
    async fn test_all_pass_run() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(&dir, vec![sh("lint", 10, "exit 0"), sh("test", 20, "exit 0")]);

        let report = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        assert_eq!(report.status(), GateStatus::Pass);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.escalation.action, EscalationAction::Proceed);
        assert_eq!(report.breaker.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_results_follow_registry_priority_not_completion_order() {
        let dir = tempdir().unwrap();
        // The higher-priority check finishes last.
        let orch = orchestrator(
            &dir,
            vec![
                sh("slow-first", 10, "sleep 0.4; exit 0"),
                sh("fast-second", 20, "exit 1"),
            ],
        );

        let report = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        let ids: Vec<&str> = report.results.iter().map(|r| r.check_id.as_str()).collect();
        assert_eq!(ids, vec!["slow-first", "fast-second"]);
    }

    #[tokio::test]
    async fn test_blocked_run_increments_breaker() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(&dir, vec![sh("test", 10, "exit 1")]);

        let report = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        assert_eq!(report.status(), GateStatus::Blocked);
        assert_eq!(report.breaker.consecutive_failures, 1);
        assert_eq!(report.breaker.state, BreakerState::Normal);
    }

    #[tokio::test]
    async fn test_three_blocked_runs_trip_breaker_in_own_report() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(&dir, vec![sh("test", 10, "exit 1")]);

        for _ in 0..2 {
            orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        }
        let third = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();

        // The post-execution escalation sees the trip this run caused.
        assert_eq!(third.breaker.state, BreakerState::Tripped);
        assert_eq!(third.breaker.consecutive_failures, 3);
        assert_eq!(third.escalation.action, EscalationAction::ConfirmRequired);
        assert!(third.escalation.reason.contains("circuit breaker tripped"));
    }

    #[tokio::test]
    async fn test_pass_resets_breaker() {
        let dir = tempdir().unwrap();
        let flag = dir.path().join("fixed");
        let script = format!("test -f {} && exit 0 || exit 1", flag.display());
        let orch = orchestrator(&dir, vec![sh("test", 10, &script)]);

        for _ in 0..3 {
            orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        }
        std::fs::write(&flag, "").unwrap();
        let report = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();

        assert_eq!(report.status(), GateStatus::Pass);
        assert_eq!(report.breaker.consecutive_failures, 0);
        assert_eq!(report.breaker.state, BreakerState::Normal);
        assert_eq!(report.escalation.action, EscalationAction::Proceed);
    }

    #[tokio::test]
    async fn test_epic_scope_halts_without_executing_checks() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("executed");
        let script = format!("touch {}; exit 0", marker.display());
        let orch = orchestrator(&dir, vec![sh("lint", 10, &script)]);

        let request = GateRunRequest::new("T1")
            .with_changed_files(vec!["a.rs".into()])
            .with_blast_radius(22);
        let report = orch.run_gate(request).await.unwrap();

        assert_eq!(report.escalation.action, EscalationAction::Halt);
        assert!(report.results.is_empty());
        assert!(report.decision.advisories.iter().any(|a| a == HALTED_ADVISORY));
        // Halt is authoritative: the check never ran.
        assert!(!marker.exists());
        // And the breaker was not touched.
        assert_eq!(report.breaker.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_large_scope_still_executes_but_requires_confirmation() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(&dir, vec![sh("lint", 10, "exit 0")]);

        let files: Vec<String> = (0..12).map(|i| format!("src/f{}.rs", i)).collect();
        let request = GateRunRequest::new("T1").with_changed_files(files);
        let report = orch.run_gate(request).await.unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.status(), GateStatus::Pass);
        assert_eq!(report.escalation.action, EscalationAction::ConfirmRequired);
        assert!(report.escalation.reason.contains("approved plan"));
    }

    #[tokio::test]
    async fn test_empty_registry_passes_with_zero_coverage_advisory() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(&dir, vec![]);

        let report = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        assert_eq!(report.status(), GateStatus::Pass);
        assert!(
            report
                .decision
                .advisories
                .iter()
                .any(|a| a == ZERO_COVERAGE_ADVISORY)
        );
    }

    #[tokio::test]
    async fn test_second_run_for_same_key_is_rejected() {
        let dir = tempdir().unwrap();
        let orch = Arc::new(orchestrator(&dir, vec![sh("slow", 10, "sleep 1; exit 0")]));

        let background = {
            let orch = Arc::clone(&orch);
            tokio::spawn(async move { orch.run_gate(GateRunRequest::new("T1")).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;

        let err = orch.run_gate(GateRunRequest::new("T1")).await.unwrap_err();
        assert!(matches!(err, GateError::RunInFlight { ref task_key } if task_key == "T1"));

        let first = background.await.unwrap().unwrap();
        assert_eq!(first.status(), GateStatus::Pass);

        // The key is released once the first run finishes.
        let again = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        assert_eq!(again.status(), GateStatus::Pass);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_concurrently() {
        let dir = tempdir().unwrap();
        let orch = Arc::new(orchestrator(&dir, vec![sh("slow", 10, "sleep 0.5; exit 0")]));

        let start = Instant::now();
        let (a, b) = tokio::join!(
            {
                let orch = Arc::clone(&orch);
                async move { orch.run_gate(GateRunRequest::new("T1")).await }
            },
            {
                let orch = Arc::clone(&orch);
                async move { orch.run_gate(GateRunRequest::new("T2")).await }
            }
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
        // Both half-second runs overlapped.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_worker_limit_serializes_checks() {
        let dir = tempdir().unwrap();
        let orch = orchestrator_with_workers(
            &dir,
            vec![
                sh("a", 10, "sleep 0.3; exit 0"),
                sh("b", 20, "sleep 0.3; exit 0"),
            ],
            1,
        );

        let start = Instant::now();
        orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_tooling_error_warns_but_never_blocks() {
        let dir = tempdir().unwrap();
        let orch = orchestrator(&dir, vec![sh("scan", 10, "exit 7")]);

        let report = orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        assert_eq!(report.status(), GateStatus::Warned);
        assert_eq!(report.results[0].outcome, CheckOutcome::Error);
        // Warned runs do not grow the streak.
        assert_eq!(report.breaker.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_journal_records_each_run() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join(".gauntlet/state");
        let orch = orchestrator(&dir, vec![sh("lint", 10, "exit 0")]);

        orch.run_gate(GateRunRequest::new("T1")).await.unwrap();
        orch.run_gate(GateRunRequest::new("T1")).await.unwrap();

        let entries = RunJournal::new(&state_dir).recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].task_key, "T1");
    }

    #[tokio::test]
    async fn test_from_config_wires_detection() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/x\n").unwrap();

        let config = GateConfig::default();
        let orch = GateOrchestrator::from_config(dir.path(), &config).unwrap();
        assert_eq!(orch.registry().ids(), vec!["test"]);
    }
}
