//! Policy evaluation: one complete registry pass in, one gate decision out.
//!
//! The evaluator is a pure function. It never short-circuits: every check
//! configured for the run has already executed by the time it is consulted,
//! so the caller sees the complete picture in one pass. Priority order
//! governs reporting order only.
//!
//! The central asymmetry lives here: a `fail` outcome from a blocking check
//! blocks the gate, but `error` and `skipped` outcomes are always downgraded
//! to warnings regardless of the descriptor's blocking class. A check that
//! could not run has produced no evidence, and absence of evidence must not
//! be conflated with failing evidence.

use crate::errors::GateError;
use crate::executor::{CheckOutcome, CheckResult};
use crate::registry::CheckRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Advisory attached to a pass over an empty registry.
pub const ZERO_COVERAGE_ADVISORY: &str =
    "no checks configured; gate coverage is zero";

/// Overall gate status for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    /// Every check passed.
    #[default]
    Pass,
    /// At least one blocking check failed; completion is a hard stop.
    Blocked,
    /// Non-blocking failures or inconclusive checks; completion may proceed.
    Warned,
}

impl GateStatus {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }

    /// Whether the calling workflow may declare the task complete.
    pub fn allows_completion(&self) -> bool {
        !self.is_blocked()
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pass => "pass",
            Self::Blocked => "blocked",
            Self::Warned => "warned",
        };
        write!(f, "{}", s)
    }
}

/// Derived decision for one gate run. Recomputed each run, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub status: GateStatus,
    /// Results whose `fail` outcome blocks completion, in priority order.
    #[serde(default)]
    pub blocking_failures: Vec<CheckResult>,
    /// Non-blocking failures and inconclusive results, in priority order.
    #[serde(default)]
    pub warnings: Vec<CheckResult>,
    /// Free-form notes for the caller (zero coverage, halted run).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<String>,
}

impl GateDecision {
    /// Clean pass with no results attached.
    pub fn pass() -> Self {
        Self::default()
    }

    pub fn with_advisory(mut self, advisory: impl Into<String>) -> Self {
        self.advisories.push(advisory.into());
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.status.is_blocked()
    }

    /// Ids of the checks that block completion, in priority order.
    pub fn blocking_check_ids(&self) -> Vec<&str> {
        self.blocking_failures
            .iter()
            .map(|r| r.check_id.as_str())
            .collect()
    }
}

/// Evaluate one complete registry pass into a decision.
///
/// The result set must correspond to the registry exactly: one result per
/// descriptor, no extras. Partial aggregation across mismatched runs is a
/// typed error, never a silent decision. Results may arrive in completion
/// order; evaluation re-sorts them to registry priority.
pub fn evaluate(
    registry: &CheckRegistry,
    results: &[CheckResult],
) -> Result<GateDecision, GateError> {
    if registry.is_empty() && results.is_empty() {
        return Ok(GateDecision::pass().with_advisory(ZERO_COVERAGE_ADVISORY));
    }

    let mut by_id: HashMap<&str, &CheckResult> = HashMap::new();
    for result in results {
        if by_id.insert(result.check_id.as_str(), result).is_some() {
            return Err(GateError::IncompleteRegistryPass {
                message: format!("duplicate result for check '{}'", result.check_id),
            });
        }
    }

    for result in results {
        if registry.get(&result.check_id).is_none() {
            return Err(GateError::IncompleteRegistryPass {
                message: format!("result for unknown check '{}'", result.check_id),
            });
        }
    }

    let mut decision = GateDecision::pass();

    for descriptor in registry.checks() {
        let result = by_id.remove(descriptor.id.as_str()).ok_or_else(|| {
            GateError::IncompleteRegistryPass {
                message: format!("missing result for check '{}'", descriptor.id),
            }
        })?;

        match result.outcome {
            CheckOutcome::Pass => {}
            CheckOutcome::Fail if descriptor.is_blocking() => {
                decision.blocking_failures.push(result.clone());
            }
            // Warning-class failures, and inconclusive outcomes regardless
            // of class.
            CheckOutcome::Fail | CheckOutcome::Error | CheckOutcome::Skipped => {
                decision.warnings.push(result.clone());
            }
        }
    }

    decision.status = if !decision.blocking_failures.is_empty() {
        GateStatus::Blocked
    } else if !decision.warnings.is_empty() {
        GateStatus::Warned
    } else {
        GateStatus::Pass
    };

    Ok(decision)
}
