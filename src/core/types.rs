//! Session data model: artifacts, test outcomes, iteration history.

use serde::{Deserialize, Serialize};

use crate::core::report::TestReport;

/// Which of the two per-session files an artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Implementation,
    Test,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Implementation => "implementation",
            ArtifactKind::Test => "test",
        }
    }
}

/// A generated source file. Overwritten in place on each regeneration;
/// git history is the only versioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeArtifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub source: String,
}

impl CodeArtifact {
    pub fn implementation(function_name: &str, source: String) -> Self {
        Self {
            kind: ArtifactKind::Implementation,
            file_name: format!("{function_name}.ts"),
            source,
        }
    }

    pub fn test(function_name: &str, source: String) -> Self {
        Self {
            kind: ArtifactKind::Test,
            file_name: format!("{function_name}.test.ts"),
            source,
        }
    }
}

/// Result of one test run: the raw transcript plus its classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    /// Combined stdout+stderr of the test command.
    pub output: String,
    /// Structured report when the runner emitted one.
    pub report: Option<TestReport>,
    pub passed: bool,
}

/// One entry of the in-memory session history, printed on terminal FAIL.
#[derive(Debug, Clone)]
pub struct IterationRecord {
    /// 1-indexed iteration number.
    pub iter: u32,
    /// Implementation source as of this iteration.
    pub implementation: String,
    pub outcome: TestOutcome,
}

/// Terminal state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_file_names_derive_from_function_name() {
        let imp = CodeArtifact::implementation("add", "export default add;".to_string());
        let test = CodeArtifact::test("add", "import add from './add';".to_string());
        assert_eq!(imp.file_name, "add.ts");
        assert_eq!(test.file_name, "add.test.ts");
        assert_eq!(imp.kind, ArtifactKind::Implementation);
        assert_eq!(test.kind, ArtifactKind::Test);
    }
}
