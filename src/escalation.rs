//! Scope classification and escalation rules.
//!
//! Consulted twice per gate run: before execution (a `Halt` verdict means no
//! check is ever spawned) and again after the breaker update, so the report
//! reflects a trip caused by the run itself. Scope is recomputed from the
//! current changed-file set on every run, never cached. Blast radius is an
//! input produced by an external collaborator; this module does not compute
//! reference graphs.

use crate::breaker::BreakerState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dependent-file count above which a change is epic scope.
pub const EPIC_BLAST_RADIUS: u32 = 20;
/// File-count ceiling for a small change.
pub const SMALL_MAX_FILES: usize = 3;
/// File-count ceiling for a medium change.
pub const MEDIUM_MAX_FILES: usize = 10;

const EPIC_SCOPE_REASON: &str = "epic scope — decompose into isolated units with independent acceptance criteria and bounded blast radius (≤15 files each) before any implementation";
const LARGE_SCOPE_REASON: &str = "large-scope change requires an approved plan before implementation";
const BREAKER_TRIPPED_REASON: &str =
    "circuit breaker tripped — require explicit direction before further attempts";

/// Size tier of the current change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeTier {
    Small,
    Medium,
    Large,
    Epic,
}

impl fmt::Display for ScopeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Epic => "epic",
        };
        write!(f, "{}", s)
    }
}

/// Scope of the current change, recomputed from the touched-file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeClassification {
    pub file_count: usize,
    pub blast_radius: u32,
    pub tier: ScopeTier,
}

impl ScopeClassification {
    /// Classify a change from its size signals.
    ///
    /// Tier boundaries: small ≤3 files, medium ≤10, large >10; blast radius
    /// above [`EPIC_BLAST_RADIUS`] dependents is epic regardless of file
    /// count.
    pub fn classify(file_count: usize, blast_radius: u32) -> Self {
        let tier = if blast_radius > EPIC_BLAST_RADIUS {
            ScopeTier::Epic
        } else if file_count > MEDIUM_MAX_FILES {
            ScopeTier::Large
        } else if file_count > SMALL_MAX_FILES {
            ScopeTier::Medium
        } else {
            ScopeTier::Small
        };
        Self {
            file_count,
            blast_radius,
            tier,
        }
    }
}

/// What the calling workflow must do before proceeding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationAction {
    /// No escalation condition applies.
    Proceed,
    /// Suspend automatic progress until the caller obtains explicit
    /// direction. The core never prompts; that is the caller's job.
    ConfirmRequired,
    /// Authoritative stop: no check executes until the scope is reduced and
    /// the change reclassified.
    Halt,
}

impl fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Proceed => "proceed",
            Self::ConfirmRequired => "confirm_required",
            Self::Halt => "halt",
        };
        write!(f, "{}", s)
    }
}

/// Escalation decision with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationVerdict {
    pub action: EscalationAction,
    pub reason: String,
}

impl EscalationVerdict {
    pub fn proceed() -> Self {
        Self {
            action: EscalationAction::Proceed,
            reason: String::new(),
        }
    }

    pub fn is_halt(&self) -> bool {
        self.action == EscalationAction::Halt
    }

    pub fn requires_confirmation(&self) -> bool {
        self.action == EscalationAction::ConfirmRequired
    }
}

/// Apply the escalation rules in order; first match wins.
///
/// 1. blast radius above the epic bound → halt
/// 2. large tier → confirmation required
/// 3. tripped breaker → confirmation required
/// 4. otherwise proceed
pub fn evaluate(scope: &ScopeClassification, breaker: BreakerState) -> EscalationVerdict {
    if scope.blast_radius > EPIC_BLAST_RADIUS {
        return EscalationVerdict {
            action: EscalationAction::Halt,
            reason: EPIC_SCOPE_REASON.to_string(),
        };
    }
    if scope.tier == ScopeTier::Large {
        return EscalationVerdict {
            action: EscalationAction::ConfirmRequired,
            reason: LARGE_SCOPE_REASON.to_string(),
        };
    }
    if breaker.is_tripped() {
        return EscalationVerdict {
            action: EscalationAction::ConfirmRequired,
            reason: BREAKER_TRIPPED_REASON.to_string(),
        };
    }
    EscalationVerdict::proceed()
}
