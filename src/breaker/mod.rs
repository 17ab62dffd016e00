//! Failure streak tracking: the circuit breaker.
//!
//! One integer counter per task key. Repeated automated fix attempts without
//! new information are evidence of an invalid approach, not a flaky check:
//! once the counter reaches the threshold the breaker trips, and the
//! orchestrator refuses further automatic remediation for that key until the
//! caller either produces a passing run or explicitly resets.
//!
//! Transitions:
//! - blocked decision → counter += 1 (capped at the threshold)
//! - pass decision → counter = 0, always
//! - warned decision → counter = 0 from `normal`; a tripped breaker is NOT
//!   cleared by a warned run; only a pass or an explicit reset clears it
//! - explicit reset (user override) → counter = 0

pub mod store;

use crate::policy::GateStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default consecutive-failure threshold before the breaker trips.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Breaker state derived from the counter and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Normal,
    Tripped,
}

impl BreakerState {
    pub fn is_tripped(&self) -> bool {
        matches!(self, Self::Tripped)
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Tripped => write!(f, "tripped"),
        }
    }
}

/// Consecutive-failure record for one task key.
///
/// The counter never decreases except via a reset (pass decision or explicit
/// user override).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureStreak {
    pub task_key: String,
    pub consecutive_failures: u32,
    pub last_updated: DateTime<Utc>,
}

impl FailureStreak {
    pub fn new(task_key: impl Into<String>) -> Self {
        Self {
            task_key: task_key.into(),
            consecutive_failures: 0,
            last_updated: Utc::now(),
        }
    }

    pub fn state(&self, threshold: u32) -> BreakerState {
        if self.consecutive_failures >= threshold {
            BreakerState::Tripped
        } else {
            BreakerState::Normal
        }
    }

    /// Apply one gate decision to the streak.
    pub fn apply(&mut self, status: GateStatus, threshold: u32) {
        match (self.state(threshold), status) {
            (_, GateStatus::Blocked) => {
                self.consecutive_failures = (self.consecutive_failures + 1).min(threshold);
            }
            (BreakerState::Normal, GateStatus::Pass | GateStatus::Warned)
            | (BreakerState::Tripped, GateStatus::Pass) => {
                self.consecutive_failures = 0;
            }
            // A warned run is not new evidence that the approach works;
            // the trip stands.
            (BreakerState::Tripped, GateStatus::Warned) => {}
        }
        self.last_updated = Utc::now();
    }

    /// Explicit user override.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.last_updated = Utc::now();
    }

    pub fn snapshot(&self, threshold: u32) -> BreakerSnapshot {
        BreakerSnapshot {
            state: self.state(threshold),
            consecutive_failures: self.consecutive_failures,
        }
    }
}

/// Breaker view carried in the gate report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
}
