//! Parsing of the machine-readable payload checks emit on stdout.
//!
//! The check contract asks for a single JSON object:
//!
//! ```json
//! {
//!   "status": "fail",
//!   "summary": "2 rules violated",
//!   "findings": [
//!     {"severity": "high", "message": "no-eval", "file": "src/a.js", "line": 3}
//!   ]
//! }
//! ```
//!
//! Checks that print surrounding noise (progress lines, markdown fences) are
//! tolerated; the object is extracted by brace matching. Non-JSON output
//! degrades to a summary built from the first output lines; the exit code
//! stays authoritative either way.

use crate::findings::{Finding, FindingSeverity};
use serde::Deserialize;

const MAX_SUMMARY_CHARS: usize = 400;

#[derive(Debug, Default, Deserialize)]
struct WirePayload {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    findings: Vec<WireFinding>,
}

#[derive(Debug, Deserialize)]
struct WireFinding {
    #[serde(default)]
    severity: Option<String>,
    message: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<u32>,
}

/// Parsed machine-readable check output.
#[derive(Debug, Default)]
pub(crate) struct ParsedOutput {
    pub summary: Option<String>,
    pub findings: Vec<Finding>,
}

/// Parse the check's stdout payload. Returns an empty parse when no JSON
/// object is present or it does not match the contract.
pub(crate) fn parse_payload(stdout: &str) -> ParsedOutput {
    let Some(json) = extract_json(stdout) else {
        return ParsedOutput::default();
    };
    let Ok(payload) = serde_json::from_str::<WirePayload>(&json) else {
        return ParsedOutput::default();
    };

    let findings = payload
        .findings
        .into_iter()
        .map(|wire| {
            let mut finding = Finding::new(parse_severity(wire.severity.as_deref()), wire.message);
            if let Some(file) = wire.file {
                finding = finding.with_file(file);
            }
            if let Some(line) = wire.line {
                finding = finding.with_line(line);
            }
            finding
        })
        .collect();

    ParsedOutput {
        summary: payload.summary,
        findings,
    }
}

/// Unknown severities degrade to medium rather than dropping the finding.
fn parse_severity(raw: Option<&str>) -> FindingSeverity {
    match raw.map(|s| s.to_lowercase()).as_deref() {
        Some("critical") => FindingSeverity::Critical,
        Some("high") => FindingSeverity::High,
        Some("low") => FindingSeverity::Low,
        Some("info") => FindingSeverity::Info,
        _ => FindingSeverity::Medium,
    }
}

/// Fallback summary: first three non-empty lines, stderr preferred, capped.
pub(crate) fn summarize_output(stdout: &str, stderr: &str) -> String {
    let content = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        format!("{}\n{}", stderr.trim(), stdout.trim())
    };
    if content.is_empty() {
        return String::new();
    }
    let summary = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join(" | ");
    summary.chars().take(MAX_SUMMARY_CHARS).collect()
}

/// Extract a JSON object from output that may contain other text.
fn extract_json(output: &str) -> Option<String> {
    // Fenced code block first.
    if let Some(start) = output.find("```json") {
        let after_marker = &output[start + 7..];
        if let Some(end) = after_marker.find("```") {
            return Some(after_marker[..end].trim().to_string());
        }
    }

    // Raw object via brace matching.
    let start = output.find('{')?;
    let mut depth = 0usize;
    for (i, c) in output[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(output[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_payload() {
        let stdout = r#"{"status": "fail", "summary": "2 rules violated", "findings": [
            {"severity": "high", "message": "no-eval", "file": "src/a.js", "line": 3},
            {"severity": "low", "message": "unused var", "file": "src/b.js"}
        ]}"#;

        let parsed = parse_payload(stdout);
        assert_eq!(parsed.summary.as_deref(), Some("2 rules violated"));
        assert_eq!(parsed.findings.len(), 2);
        assert_eq!(parsed.findings[0].severity, FindingSeverity::High);
        assert_eq!(parsed.findings[0].location(), "src/a.js:3");
        assert_eq!(parsed.findings[1].line, None);
    }

    #[test]
    fn test_parse_payload_in_code_fence() {
        let stdout = "tool banner\n```json\n{\"findings\": [{\"message\": \"x\"}]}\n```\n";
        let parsed = parse_payload(stdout);
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.findings[0].severity, FindingSeverity::Medium);
    }

    #[test]
    fn test_parse_payload_with_surrounding_noise() {
        let stdout = "running...\n{\"summary\": \"clean\", \"findings\": []}\ndone\n";
        let parsed = parse_payload(stdout);
        assert_eq!(parsed.summary.as_deref(), Some("clean"));
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_parse_non_json_output() {
        let parsed = parse_payload("14 tests passed, 0 failed");
        assert!(parsed.summary.is_none());
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn test_unknown_severity_degrades_to_medium() {
        let stdout = r#"{"findings": [{"severity": "catastrophic", "message": "x"}]}"#;
        let parsed = parse_payload(stdout);
        assert_eq!(parsed.findings[0].severity, FindingSeverity::Medium);
    }

    #[test]
    fn test_summarize_prefers_stderr() {
        let summary = summarize_output("stdout line", "error: bad config\nsecond line");
        assert!(summary.starts_with("error: bad config"));
        assert!(summary.contains(" | "));
    }

    #[test]
    fn test_summarize_takes_first_three_lines() {
        let summary = summarize_output("one\ntwo\nthree\nfour", "");
        assert_eq!(summary, "one | two | three");
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize_output("", "  \n "), "");
    }

    #[test]
    fn test_summarize_caps_length() {
        let long = "x".repeat(1000);
        assert_eq!(summarize_output(&long, "").len(), 400);
    }
}
