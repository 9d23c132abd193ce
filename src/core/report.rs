//! Test run classification from the runner's structured output.
//!
//! Jest is invoked with `--json` and prints a single JSON object to stdout.
//! That object is the primary success oracle. When no JSON object can be
//! found in the captured output (older runner, crashed reporter), the
//! baseline lexical check for the failure marker is used as a fallback.

use serde::{Deserialize, Serialize};

/// The literal substring used by the fallback classification.
pub const FAILURE_MARKER: &str = "failed";

/// Structured per-run report parsed from jest `--json` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: u32,
    pub failed: u32,
    pub total: u32,
    /// Per-suite failure diagnostics, empty on success.
    pub failures: Vec<String>,
}

impl TestReport {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.total > 0
    }
}

#[derive(Debug, Deserialize)]
struct JestJson {
    #[serde(rename = "numPassedTests")]
    num_passed_tests: u32,
    #[serde(rename = "numFailedTests")]
    num_failed_tests: u32,
    #[serde(rename = "numTotalTests")]
    num_total_tests: u32,
    #[serde(rename = "testResults", default)]
    test_results: Vec<JestSuiteResult>,
}

#[derive(Debug, Deserialize)]
struct JestSuiteResult {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Parse a structured report out of captured test output, if present.
///
/// The runner's JSON object is embedded in free text (npm banner lines,
/// warnings), so this scans for the first line-leading `{` and takes the
/// longest parseable object from there.
pub fn parse_report(output: &str) -> Option<TestReport> {
    let start = find_json_start(output)?;
    let candidate = &output[start..];
    let end = matching_brace(candidate)?;
    let parsed: JestJson = serde_json::from_str(&candidate[..=end]).ok()?;

    let failures = parsed
        .test_results
        .iter()
        .filter(|suite| suite.status != "passed" && !suite.message.trim().is_empty())
        .map(|suite| suite.message.trim().to_string())
        .collect();

    Some(TestReport {
        passed: parsed.num_passed_tests,
        failed: parsed.num_failed_tests,
        total: parsed.num_total_tests,
        failures,
    })
}

/// Classify a test run: structured report when available, otherwise the
/// baseline failure-marker substring check.
pub fn classify(output: &str) -> (Option<TestReport>, bool) {
    if let Some(report) = parse_report(output) {
        let passed = report.success();
        return (Some(report), passed);
    }
    (None, !output.contains(FAILURE_MARKER))
}

fn find_json_start(output: &str) -> Option<usize> {
    let mut offset = 0;
    for line in output.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('{') {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len() + 1;
    }
    None
}

/// Index of the brace closing the object that starts at `text[0]`.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
