//! Configuration for the gate orchestrator, read from `gauntlet.toml` at the
//! project root.
//!
//! # Configuration File Format
//!
//! ```toml
//! [gate]
//! worker_limit = 4
//! failure_threshold = 3
//! state_dir = ".gauntlet/state"
//!
//! [[check]]
//! id = "lint"
//! priority = 10
//! blocking = "blocking"
//! timeout_secs = 120
//! command = ["npx", "eslint", ".", "--format", "json"]
//! pass_changed_files = true
//! detect_files = ["package.json"]
//!
//! [[check]]
//! id = "test"
//! priority = 20
//! blocking = "blocking"
//! timeout_secs = 300
//! command = ["npm", "test"]
//!
//! [[check]]
//! id = "bundle-check"
//! priority = 30
//! blocking = "warning"
//! command = ["npm", "run", "bundle-check"]
//! retry_on_error = true
//! ```
//!
//! When no `[[check]]` tables are present the registry is auto-detected from
//! the project's tooling (see [`crate::registry::detect`]). A missing config
//! file yields the defaults.

use crate::breaker::DEFAULT_FAILURE_THRESHOLD;
use crate::registry::{
    BlockingClass, CheckDescriptor, CheckRegistry, DEFAULT_FAST_TIMEOUT_SECS, detect,
};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file name looked up at the project root.
pub const CONFIG_FILE: &str = "gauntlet.toml";

const DEFAULT_STATE_DIR: &str = ".gauntlet/state";
const DEFAULT_WORKER_LIMIT: usize = 4;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub gate: GateSettings,
    #[serde(default, rename = "check")]
    pub checks: Vec<CheckEntry>,
}

/// `[gate]` section settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSettings {
    /// Maximum checks running concurrently within one registry pass.
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,
    /// Consecutive blocked decisions before the breaker trips.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// State directory, resolved against the project root when relative.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            worker_limit: default_worker_limit(),
            failure_threshold: default_failure_threshold(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_worker_limit() -> usize {
    DEFAULT_WORKER_LIMIT
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

/// One `[[check]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEntry {
    pub id: String,
    pub priority: u32,
    #[serde(default)]
    pub blocking: BlockingClass,
    /// Defaults to the fast-check timeout when omitted.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    pub command: Vec<String>,
    #[serde(default)]
    pub pass_changed_files: bool,
    #[serde(default)]
    pub detect_files: Vec<String>,
    #[serde(default)]
    pub retry_on_error: bool,
}

impl CheckEntry {
    fn into_descriptor(self) -> CheckDescriptor {
        CheckDescriptor::new(self.id, self.priority, self.blocking, self.command)
            .with_timeout_secs(self.timeout_secs.unwrap_or(DEFAULT_FAST_TIMEOUT_SECS))
            .with_detect_files(self.detect_files)
            .with_pass_changed_files(self.pass_changed_files)
            .with_retry_on_error(self.retry_on_error)
    }
}

impl GateConfig {
    /// Load configuration from the project root, falling back to defaults
    /// when no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = project_root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gate.worker_limit == 0 {
            bail!("gate.worker_limit must be at least 1");
        }
        if self.gate.failure_threshold == 0 {
            bail!("gate.failure_threshold must be at least 1");
        }
        Ok(())
    }

    /// Build the check registry: configured `[[check]]` tables, or tooling
    /// auto-detection when none are configured.
    pub fn registry(&self, project_root: &Path) -> Result<CheckRegistry> {
        if self.checks.is_empty() {
            return detect::detect_registry(project_root);
        }
        let descriptors = self
            .checks
            .iter()
            .cloned()
            .map(CheckEntry::into_descriptor)
            .collect();
        Ok(CheckRegistry::new(descriptors)?)
    }

    /// State directory resolved against the project root.
    pub fn state_dir(&self, project_root: &Path) -> PathBuf {
        if self.gate.state_dir.is_absolute() {
            self.gate.state_dir.clone()
        } else {
            project_root.join(&self.gate.state_dir)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_config_file() {
        let dir = tempdir().unwrap();
        let config = GateConfig::load(dir.path()).unwrap();
        assert_eq!(config.gate.worker_limit, DEFAULT_WORKER_LIMIT);
        assert_eq!(config.gate.failure_threshold, DEFAULT_FAILURE_THRESHOLD);
        assert!(config.checks.is_empty());
        assert_eq!(
            config.state_dir(dir.path()),
            dir.path().join(DEFAULT_STATE_DIR)
        );
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[gate]
worker_limit = 2
failure_threshold = 5

[[check]]
id = "lint"
priority = 10
blocking = "blocking"
command = ["npx", "eslint", "."]
pass_changed_files = true

[[check]]
id = "bundle-check"
priority = 20
blocking = "warning"
timeout_secs = 60
command = ["npm", "run", "bundle-check"]
retry_on_error = true
"#,
        )
        .unwrap();

        let config = GateConfig::load(dir.path()).unwrap();
        assert_eq!(config.gate.worker_limit, 2);
        assert_eq!(config.gate.failure_threshold, 5);

        let registry = config.registry(dir.path()).unwrap();
        assert_eq!(registry.ids(), vec!["lint", "bundle-check"]);

        let lint = registry.get("lint").unwrap();
        assert!(lint.is_blocking());
        assert_eq!(lint.timeout_secs, DEFAULT_FAST_TIMEOUT_SECS);
        assert!(lint.command.pass_changed_files);

        let bundle = registry.get("bundle-check").unwrap();
        assert_eq!(bundle.blocking, BlockingClass::Warning);
        assert_eq!(bundle.timeout_secs, 60);
        assert!(bundle.retry_on_error);
    }

    #[test]
    fn test_invalid_worker_limit_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[gate]\nworker_limit = 0\n").unwrap();
        assert!(GateConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "[gate]\nfailure_threshold = 0\n",
        )
        .unwrap();
        assert!(GateConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "[gate\nworker_limit = ").unwrap();
        assert!(GateConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_empty_checks_fall_back_to_detection() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example.com/x\n").unwrap();

        let config = GateConfig::default();
        let registry = config.registry(dir.path()).unwrap();
        assert!(registry.get("test").is_some());
    }

    #[test]
    fn test_absolute_state_dir_kept() {
        let dir = tempdir().unwrap();
        let mut config = GateConfig::default();
        config.gate.state_dir = PathBuf::from("/var/lib/gauntlet");
        assert_eq!(
            config.state_dir(dir.path()),
            PathBuf::from("/var/lib/gauntlet")
        );
    }
}
