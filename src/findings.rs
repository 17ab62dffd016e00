//! Finding types emitted by external checks.
//!
//! Every check reports zero or more findings through the machine-readable
//! output contract. A [`Finding`] is a single defect or observation with a
//! severity and an optional source location.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for a single check finding.
///
/// Severities are ordered from most to least critical.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    /// Must be fixed before the change can ship.
    Critical,
    /// Serious defect, almost always blocking.
    High,
    /// Should be addressed but rarely blocks on its own.
    #[default]
    Medium,
    /// Minor issue or style concern.
    Low,
    /// Observation with no required action.
    Info,
}

impl FindingSeverity {
    /// Check if this severity indicates a defect that demands action.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Critical | Self::High | Self::Medium)
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        };
        write!(f, "{}", s)
    }
}

/// A single finding reported by a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity of this finding.
    pub severity: FindingSeverity,
    /// Description of the defect or observation.
    pub message: String,
    /// File path the finding refers to (relative to the project root).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line number (1-based).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Finding {
    /// Create a new finding without location information.
    pub fn new(severity: FindingSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            file: None,
            line: None,
        }
    }

    /// Attach the file this finding refers to.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Attach the line number (1-based).
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Formatted location string: `file:line`, `file`, or empty.
    pub fn location(&self) -> String {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => format!("{}:{}", file, line),
            (Some(file), None) => file.clone(),
            _ => String::new(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.severity)?;
        let location = self.location();
        if !location.is_empty() {
            write!(f, " {}", location)?;
        }
        write!(f, ": {}", self.message)
    }
}
