//! Typed error hierarchy for the gate orchestrator.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from gate orchestration and policy evaluation.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("a gate run is already in flight for task key '{task_key}'")]
    RunInFlight { task_key: String },

    #[error("invalid check registry: {message}")]
    InvalidRegistry { message: String },

    #[error("result set does not match the registry pass: {message}")]
    IncompleteRegistryPass { message: String },

    #[error("streak store at {path}: {source}")]
    StreakStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
