//! Static check descriptor registry.
//!
//! The registry is the configuration-time description of one gate: which
//! external checks run, in which priority order, and whether a failing
//! outcome blocks completion or only warns. Descriptors are immutable and
//! one registry is shared read-only across gate runs.

pub mod detect;

use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default timeout for fast checks (lint, format, scan).
pub const DEFAULT_FAST_TIMEOUT_SECS: u64 = 120;

/// Default timeout for test suites.
pub const DEFAULT_SUITE_TIMEOUT_SECS: u64 = 300;

/// Whether a failing check can block completion or only warn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockingClass {
    /// A `fail` outcome blocks the gate.
    #[default]
    Blocking,
    /// A `fail` outcome is reported but never blocks.
    Warning,
}

impl fmt::Display for BlockingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// How the external check command is invoked.
///
/// The command always runs with the project root as its working directory.
/// When `pass_changed_files` is set and the gate run carries a changed-file
/// scope filter, the file list is appended to `argv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContract {
    /// Program and arguments, e.g. `["npx", "eslint", "."]`.
    pub argv: Vec<String>,
    /// Append the run's changed-file list to the invocation.
    #[serde(default)]
    pub pass_changed_files: bool,
}

impl CommandContract {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            pass_changed_files: false,
        }
    }

    /// Human-readable command line for logs and reports.
    pub fn display_command(&self) -> String {
        self.argv.join(" ")
    }
}

/// Static metadata for one external check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDescriptor {
    /// Stable identifier, unique within the registry.
    pub id: String,
    /// Position in the total priority order; lower runs and reports first.
    pub priority: u32,
    /// Blocking classification for `fail` outcomes.
    pub blocking: BlockingClass,
    /// Per-check timeout.
    pub timeout_secs: u64,
    /// External command invocation contract.
    pub command: CommandContract,
    /// Project marker files; when non-empty and none exist under the project
    /// root, the check is recorded as `skipped` without spawning.
    #[serde(default)]
    pub detect_files: Vec<String>,
    /// Retry once with backoff on a tooling error. Only safe for checks whose
    /// re-invocation is idempotent.
    #[serde(default)]
    pub retry_on_error: bool,
}

impl CheckDescriptor {
    /// Create a descriptor with the fast-check default timeout.
    pub fn new(
        id: impl Into<String>,
        priority: u32,
        blocking: BlockingClass,
        argv: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            blocking,
            timeout_secs: DEFAULT_FAST_TIMEOUT_SECS,
            command: CommandContract::new(argv),
            detect_files: Vec::new(),
            retry_on_error: false,
        }
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_detect_files(mut self, detect_files: Vec<String>) -> Self {
        self.detect_files = detect_files;
        self
    }

    pub fn with_pass_changed_files(mut self, pass: bool) -> Self {
        self.command.pass_changed_files = pass;
        self
    }

    pub fn with_retry_on_error(mut self, retry: bool) -> Self {
        self.retry_on_error = retry;
        self
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking == BlockingClass::Blocking
    }
}

/// Validated, priority-ordered collection of check descriptors.
///
/// Construction fails on duplicate ids, duplicate priorities, or an empty
/// command. Iteration order is always ascending priority.
#[derive(Debug, Clone, Default)]
pub struct CheckRegistry {
    checks: Vec<CheckDescriptor>,
}

impl CheckRegistry {
    /// Build a registry from descriptors, sorting by priority.
    pub fn new(mut checks: Vec<CheckDescriptor>) -> Result<Self, GateError> {
        for check in &checks {
            if check.id.trim().is_empty() {
                return Err(GateError::InvalidRegistry {
                    message: "check id must not be empty".to_string(),
                });
            }
            if check.command.argv.is_empty() {
                return Err(GateError::InvalidRegistry {
                    message: format!("check '{}' has an empty command", check.id),
                });
            }
        }

        checks.sort_by_key(|c| c.priority);

        for pair in checks.windows(2) {
            if pair[0].priority == pair[1].priority {
                return Err(GateError::InvalidRegistry {
                    message: format!(
                        "checks '{}' and '{}' share priority {}",
                        pair[0].id, pair[1].id, pair[0].priority
                    ),
                });
            }
        }

        // Ids are not adjacent after the priority sort.
        let mut ids: Vec<&str> = checks.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        for pair in ids.windows(2) {
            if pair[0] == pair[1] {
                return Err(GateError::InvalidRegistry {
                    message: format!("duplicate check id '{}'", pair[0]),
                });
            }
        }

        Ok(Self { checks })
    }

    /// Registry with no checks configured. A gate run over it passes with a
    /// zero-coverage advisory.
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// Descriptors in ascending priority order.
    pub fn checks(&self) -> &[CheckDescriptor] {
        &self.checks
    }

    pub fn get(&self, id: &str) -> Option<&CheckDescriptor> {
        self.checks.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Check ids in priority order.
    pub fn ids(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lint() -> CheckDescriptor {
        CheckDescriptor::new(
            "lint",
            10,
            BlockingClass::Blocking,
            vec!["npx".into(), "eslint".into(), ".".into()],
        )
    }

    fn test_suite() -> CheckDescriptor {
        CheckDescriptor::new(
            "test",
            20,
            BlockingClass::Blocking,
            vec!["npm".into(), "test".into()],
        )
        .with_timeout_secs(DEFAULT_SUITE_TIMEOUT_SECS)
    }

    #[test]
    fn test_descriptor_defaults() {
        let check = lint();
        assert_eq!(check.timeout_secs, DEFAULT_FAST_TIMEOUT_SECS);
        assert!(!check.command.pass_changed_files);
        assert!(!check.retry_on_error);
        assert!(check.detect_files.is_empty());
        assert!(check.is_blocking());
    }

    #[test]
    fn test_descriptor_builder() {
        let check = lint()
            .with_timeout_secs(60)
            .with_detect_files(vec!["package.json".into()])
            .with_pass_changed_files(true)
            .with_retry_on_error(true);

        assert_eq!(check.timeout_secs, 60);
        assert_eq!(check.detect_files, vec!["package.json".to_string()]);
        assert!(check.command.pass_changed_files);
        assert!(check.retry_on_error);
    }

    #[test]
    fn test_registry_orders_by_priority() {
        let registry = CheckRegistry::new(vec![test_suite(), lint()]).unwrap();
        assert_eq!(registry.ids(), vec!["lint", "test"]);
    }

    #[test]
    fn test_registry_rejects_duplicate_id() {
        let mut other = lint();
        other.priority = 30;
        let err = CheckRegistry::new(vec![lint(), other]).unwrap_err();
        assert!(err.to_string().contains("duplicate check id 'lint'"));
    }

    #[test]
    fn test_registry_rejects_duplicate_priority() {
        let mut other = test_suite();
        other.priority = 10;
        let err = CheckRegistry::new(vec![lint(), other]).unwrap_err();
        assert!(err.to_string().contains("share priority 10"));
    }

    #[test]
    fn test_registry_rejects_empty_command() {
        let check = CheckDescriptor::new("broken", 1, BlockingClass::Warning, vec![]);
        let err = CheckRegistry::new(vec![check]).unwrap_err();
        assert!(err.to_string().contains("empty command"));
    }

    #[test]
    fn test_registry_rejects_blank_id() {
        let check = CheckDescriptor::new("  ", 1, BlockingClass::Warning, vec!["true".into()]);
        assert!(CheckRegistry::new(vec![check]).is_err());
    }

    #[test]
    fn test_empty_registry() {
        let registry = CheckRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_registry_get() {
        let registry = CheckRegistry::new(vec![lint(), test_suite()]).unwrap();
        assert!(registry.get("lint").is_some());
        assert!(registry.get("coverage").is_none());
    }

    #[test]
    fn test_blocking_class_serialization() {
        assert_eq!(
            serde_json::to_string(&BlockingClass::Blocking).unwrap(),
            "\"blocking\""
        );
        let warning: BlockingClass = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(warning, BlockingClass::Warning);
    }

    #[test]
    fn test_display_command() {
        assert_eq!(lint().command.display_command(), "npx eslint .");
    }
}
