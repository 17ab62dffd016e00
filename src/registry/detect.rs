//! Check auto-detection for projects with no configured registry.
//!
//! Probes the project root for common lint and test tooling and synthesizes
//! descriptors for whatever is found: npm scripts, eslint/biome configs,
//! ruff/flake8/pytest markers, Cargo and Go modules. Detection only decides
//! which commands to run; it never interprets their findings.

use crate::registry::{
    BlockingClass, CheckDescriptor, CheckRegistry, DEFAULT_SUITE_TIMEOUT_SECS,
};
use anyhow::Result;
use glob::Pattern;
use serde_json::Value;
use std::fs;
use std::path::Path;

const LINT_PRIORITY: u32 = 10;
const TEST_PRIORITY: u32 = 20;

/// Build a registry from whatever lint/test tooling the project carries.
///
/// Returns an empty registry when nothing is detected; the policy evaluator
/// turns that into a pass with a zero-coverage advisory.
pub fn detect_registry(project_root: &Path) -> Result<CheckRegistry> {
    let mut checks = Vec::new();
    let package = load_package_json(project_root);

    if let Some(argv) = detect_lint_command(project_root, &package) {
        checks.push(CheckDescriptor::new(
            "lint",
            LINT_PRIORITY,
            BlockingClass::Blocking,
            argv,
        ));
    }

    if let Some(argv) = detect_test_command(project_root, &package) {
        checks.push(
            CheckDescriptor::new("test", TEST_PRIORITY, BlockingClass::Blocking, argv)
                .with_timeout_secs(DEFAULT_SUITE_TIMEOUT_SECS),
        );
    }

    Ok(CheckRegistry::new(checks)?)
}

fn detect_lint_command(project_root: &Path, package: &Value) -> Option<Vec<String>> {
    if script_defined(package, "lint") {
        return Some(argv(&["npm", "run", "lint"]));
    }

    if has_any(project_root, &[".eslintrc", ".eslintrc.*", "eslint.config.*"]) {
        return Some(argv(&["npx", "eslint", "."]));
    }

    if project_root.join("biome.json").exists() {
        return Some(argv(&["npx", "biome", "check", "."]));
    }

    if pyproject_has_section(project_root, "[tool.ruff]") {
        return Some(argv(&["ruff", "check", "."]));
    }

    if pyproject_has_section(project_root, "[tool.flake8]")
        || project_root.join(".flake8").exists()
    {
        return Some(argv(&["flake8", "."]));
    }

    if project_root.join(".golangci.yml").exists() {
        return Some(argv(&["golangci-lint", "run"]));
    }

    None
}

fn detect_test_command(project_root: &Path, package: &Value) -> Option<Vec<String>> {
    if let Some(script) = package
        .get("scripts")
        .and_then(|s| s.get("test"))
        .and_then(|v| v.as_str())
    {
        if !script.trim().is_empty() && !is_placeholder_npm_test(script) {
            return Some(argv(&["npm", "test"]));
        }
    }

    if has_any(project_root, &["jest.config.*"]) {
        return Some(argv(&["npx", "jest", "--passWithNoTests"]));
    }

    if has_any(project_root, &["vitest.config.*"]) {
        return Some(argv(&["npx", "vitest", "run"]));
    }

    if pyproject_has_section(project_root, "[tool.pytest]")
        || project_root.join("pytest.ini").exists()
        || project_root.join("conftest.py").exists()
    {
        return Some(argv(&["pytest"]));
    }

    if project_root.join("Cargo.toml").exists() {
        return Some(argv(&["cargo", "test"]));
    }

    if project_root.join("go.mod").exists() {
        return Some(argv(&["go", "test", "./..."]));
    }

    None
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn load_package_json(project_root: &Path) -> Value {
    fs::read_to_string(project_root.join("package.json"))
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or(Value::Null)
}

fn script_defined(package: &Value, name: &str) -> bool {
    package
        .get("scripts")
        .and_then(|s| s.get(name))
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty())
}

/// The `npm init` placeholder test script fails unconditionally; treating it
/// as a real test runner would block every gate run.
fn is_placeholder_npm_test(script: &str) -> bool {
    let lowered = script.to_lowercase();
    lowered.contains("no test specified") && lowered.contains("exit 1")
}

fn pyproject_has_section(project_root: &Path, section: &str) -> bool {
    fs::read_to_string(project_root.join("pyproject.toml"))
        .map(|text| text.contains(section))
        .unwrap_or(false)
}

/// Match top-level entries of the project root against glob patterns.
fn has_any(project_root: &Path, patterns: &[&str]) -> bool {
    let compiled: Vec<Pattern> = patterns.iter().filter_map(|p| Pattern::new(p).ok()).collect();
    let Ok(entries) = fs::read_dir(project_root) else {
        return false;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if compiled.iter().any(|p| p.matches(name)) {
            return true;
        }
    }
    false
}
