//! Check execution: spawn one external command per descriptor and map what
//! happened to exactly one [`CheckResult`].
//!
//! Exit-code contract:
//! - `0`: the check ran clean (`pass`)
//! - `1`: the check ran and found a real violation (`fail`)
//! - `>=2`, command not found, signal death, or timeout: the check could not
//!   run (`error`); the policy evaluator never lets these block
//!
//! A check whose project markers are absent is recorded as `skipped` without
//! spawning anything. The executor never mutates project files.

mod output;

use crate::findings::Finding;
use crate::registry::CheckDescriptor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Backoff before the single permitted retry of a tooling error.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Cap on captured raw output carried in a result.
const MAX_RAW_OUTPUT_CHARS: usize = 16_384;

/// Outcome classification for one check execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    /// Exit 0: the check ran and found nothing.
    Pass,
    /// Exit 1: the check ran and found a real violation.
    Fail,
    /// The check could not run: tool/environment problem, not a finding.
    Error,
    /// The tool is not configured for this project; nothing was spawned.
    Skipped,
}

impl CheckOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail)
    }

    /// True when the check produced no evidence either way.
    pub fn is_inconclusive(&self) -> bool {
        matches!(self, Self::Error | Self::Skipped)
    }
}

impl fmt::Display for CheckOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
            Self::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Result of executing one check. Created once per execution and never
/// mutated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Descriptor id this result belongs to.
    pub check_id: String,
    /// Raw exit code; `None` for timeout, spawn failure, or signal death.
    pub exit_code: Option<i32>,
    /// Wall-clock execution time.
    pub duration_ms: u64,
    /// Outcome classification.
    pub outcome: CheckOutcome,
    /// Findings parsed from the check's machine-readable output.
    #[serde(default)]
    pub findings: Vec<Finding>,
    /// One-line summary for reports.
    #[serde(default)]
    pub summary: String,
    /// Captured raw output (stdout then stderr), truncated.
    #[serde(default)]
    pub raw_output: String,
    /// When the execution finished.
    pub finished_at: DateTime<Utc>,
}

impl CheckResult {
    pub fn new(check_id: impl Into<String>, outcome: CheckOutcome) -> Self {
        Self {
            check_id: check_id.into(),
            exit_code: None,
            duration_ms: 0,
            outcome,
            findings: Vec::new(),
            summary: String::new(),
            raw_output: String::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = Some(exit_code);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_raw_output(mut self, raw_output: impl Into<String>) -> Self {
        self.raw_output = truncate_chars(&raw_output.into(), MAX_RAW_OUTPUT_CHARS);
        self
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.check_id, self.outcome)?;
        if !self.summary.is_empty() {
            write!(f, " ({})", self.summary)?;
        }
        Ok(())
    }
}

/// Runs external checks for one gate run.
#[derive(Debug, Clone)]
pub struct CheckExecutor {
    project_root: PathBuf,
    changed_files: Vec<String>,
}

impl CheckExecutor {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            changed_files: Vec::new(),
        }
    }

    /// Attach the run's changed-file scope filter. Passed to checks whose
    /// contract opts in via `pass_changed_files`.
    pub fn with_changed_files(mut self, changed_files: Vec<String>) -> Self {
        self.changed_files = changed_files;
        self
    }

    /// Execute one check and produce exactly one result.
    ///
    /// Tooling errors are retried at most once, with backoff, when the
    /// descriptor opts in. Findings and failures are never auto-retried.
    pub async fn execute(&self, descriptor: &CheckDescriptor) -> CheckResult {
        if let Some(skipped) = self.detection_miss(descriptor) {
            return skipped;
        }

        let first = self.run_once(descriptor).await;
        if first.outcome == CheckOutcome::Error && descriptor.retry_on_error {
            warn!(
                check = %descriptor.id,
                summary = %first.summary,
                "tooling error, retrying once after backoff"
            );
            tokio::time::sleep(RETRY_BACKOFF).await;
            return self.run_once(descriptor).await;
        }
        first
    }

    /// `skipped` result when the descriptor's project markers are absent.
    fn detection_miss(&self, descriptor: &CheckDescriptor) -> Option<CheckResult> {
        if descriptor.detect_files.is_empty() {
            return None;
        }
        let found = descriptor
            .detect_files
            .iter()
            .any(|marker| self.project_root.join(marker).exists());
        if found {
            return None;
        }
        debug!(check = %descriptor.id, "project markers absent, skipping");
        Some(
            CheckResult::new(&descriptor.id, CheckOutcome::Skipped).with_summary(format!(
                "not configured for this project (none of: {})",
                descriptor.detect_files.join(", ")
            )),
        )
    }

    async fn run_once(&self, descriptor: &CheckDescriptor) -> CheckResult {
        let start = Instant::now();
        let argv = self.build_argv(descriptor);
        debug!(check = %descriptor.id, command = %argv.join(" "), "spawning check");

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(&self.project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CheckResult::new(&descriptor.id, CheckOutcome::Error)
                    .with_duration_ms(start.elapsed().as_millis() as u64)
                    .with_summary(format!("failed to spawn '{}': {}", argv[0], e));
            }
        };

        let (Some(mut stdout_pipe), Some(mut stderr_pipe)) =
            (child.stdout.take(), child.stderr.take())
        else {
            let _ = child.kill().await;
            return CheckResult::new(&descriptor.id, CheckOutcome::Error)
                .with_summary("child process pipes unavailable");
        };

        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let deadline = Duration::from_secs(descriptor.timeout_secs);

        let waited = tokio::time::timeout(deadline, async {
            let (_, _, status) = tokio::join!(
                stdout_pipe.read_to_end(&mut out_buf),
                stderr_pipe.read_to_end(&mut err_buf),
                child.wait(),
            );
            status
        })
        .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&out_buf).to_string();
        let stderr = String::from_utf8_lossy(&err_buf).to_string();

        let status = match waited {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return self.finish(
                    descriptor,
                    CheckOutcome::Error,
                    None,
                    duration_ms,
                    &stdout,
                    &stderr,
                    Some(format!("failed waiting for check process: {}", e)),
                );
            }
            Err(_) => {
                // Deadline expired: terminate the child so the slot is never
                // left pending.
                let _ = child.kill().await;
                warn!(check = %descriptor.id, timeout_secs = descriptor.timeout_secs, "check timed out");
                return self.finish(
                    descriptor,
                    CheckOutcome::Error,
                    None,
                    duration_ms,
                    &stdout,
                    &stderr,
                    Some(format!("timed out after {}s", descriptor.timeout_secs)),
                );
            }
        };

        let (outcome, note) = match status.code() {
            Some(0) => (CheckOutcome::Pass, None),
            Some(1) => (CheckOutcome::Fail, None),
            Some(code) => (
                CheckOutcome::Error,
                Some(format!("exit code {} (tool/config issue)", code)),
            ),
            None => (
                CheckOutcome::Error,
                Some("terminated by signal".to_string()),
            ),
        };

        self.finish(
            descriptor,
            outcome,
            status.code(),
            duration_ms,
            &stdout,
            &stderr,
            note,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        descriptor: &CheckDescriptor,
        outcome: CheckOutcome,
        exit_code: Option<i32>,
        duration_ms: u64,
        stdout: &str,
        stderr: &str,
        note: Option<String>,
    ) -> CheckResult {
        let parsed = output::parse_payload(stdout);
        let summary = note
            .or(parsed.summary)
            .unwrap_or_else(|| output::summarize_output(stdout, stderr));

        let mut result = CheckResult::new(&descriptor.id, outcome)
            .with_duration_ms(duration_ms)
            .with_findings(parsed.findings)
            .with_summary(summary)
            .with_raw_output(combine_output(stdout, stderr));
        result.exit_code = exit_code;
        result
    }

    fn build_argv(&self, descriptor: &CheckDescriptor) -> Vec<String> {
        let mut argv = descriptor.command.argv.clone();
        if descriptor.command.pass_changed_files && !self.changed_files.is_empty() {
            argv.extend(self.changed_files.iter().cloned());
        }
        argv
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}

fn combine_output(stdout: &str, stderr: &str) -> String {
    if stderr.trim().is_empty() {
        stdout.to_string()
    } else {
        format!("{}\n--- stderr ---\n{}", stdout, stderr)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
