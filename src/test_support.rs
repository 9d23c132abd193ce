//! Test-only scripted implementations of the session's trait seams.

use std::cell::RefCell;
use std::path::Path;
use std::process::Command;

use anyhow::{Result, anyhow};

use crate::core::types::TestOutcome;
use crate::io::chat::{ChatRequest, ChatResponse, ChatService, ServiceOverload};
use crate::io::git::Git;
use crate::io::npm::{PackageInstaller, TestHarness};
use crate::io::scaffold::{ScaffoldPaths, Scaffolder};

/// Chat service that replays a script of responses or overload signals,
/// recording every request for assertions.
pub struct ScriptedChat {
    script: RefCell<Vec<Result<String, ServiceOverload>>>,
    calls: RefCell<u32>,
    pub requests: RefCell<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<Result<String, ServiceOverload>>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: RefCell::new(script),
            calls: RefCell::new(0),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.borrow()
    }
}

impl ChatService for ScriptedChat {
    fn complete(&self, request: &ChatRequest) -> Result<ChatResponse> {
        *self.calls.borrow_mut() += 1;
        self.requests.borrow_mut().push(request.clone());
        let next = self
            .script
            .borrow_mut()
            .pop()
            .ok_or_else(|| anyhow!("scripted chat exhausted"))?;
        let calls = *self.calls.borrow();
        match next {
            Ok(content) => Ok(ChatResponse {
                content,
                completion_id: format!("cmpl-{calls}"),
            }),
            Err(overload) => Err(overload.into()),
        }
    }
}

/// Installer that records every install and fails for configured packages.
#[derive(Default)]
pub struct ScriptedInstaller {
    pub installed: RefCell<Vec<String>>,
    pub fail_on: Vec<String>,
}

impl PackageInstaller for ScriptedInstaller {
    fn install(&self, package: &str) -> Result<()> {
        self.installed.borrow_mut().push(package.to_string());
        if self.fail_on.iter().any(|p| p == package) {
            return Err(anyhow!("registry unavailable for {package}"));
        }
        Ok(())
    }
}

/// Harness that replays a script of test outcomes (or harness crashes).
pub struct ScriptedHarness {
    script: RefCell<Vec<Result<TestOutcome, anyhow::Error>>>,
    pub runs: RefCell<Vec<String>>,
}

impl ScriptedHarness {
    pub fn new(script: Vec<Result<TestOutcome, anyhow::Error>>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: RefCell::new(script),
            runs: RefCell::new(Vec::new()),
        }
    }

    pub fn passing(output: &str) -> Result<TestOutcome, anyhow::Error> {
        Ok(TestOutcome {
            output: output.to_string(),
            report: None,
            passed: true,
        })
    }

    pub fn failing(output: &str) -> Result<TestOutcome, anyhow::Error> {
        Ok(TestOutcome {
            output: output.to_string(),
            report: None,
            passed: false,
        })
    }
}

impl TestHarness for ScriptedHarness {
    fn run_test(&self, test_file: &str) -> Result<TestOutcome> {
        self.runs.borrow_mut().push(test_file.to_string());
        self.script
            .borrow_mut()
            .pop()
            .ok_or_else(|| anyhow!("scripted harness exhausted"))?
    }
}

/// Scaffolder that provisions a bare git workspace without npm.
pub struct ScriptedScaffolder<'a> {
    root: &'a Path,
}

impl<'a> ScriptedScaffolder<'a> {
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }
}

impl Scaffolder for ScriptedScaffolder<'_> {
    fn scaffold(&self, function_name: &str) -> Result<ScaffoldPaths> {
        std::fs::create_dir_all(self.root)?;
        let paths = ScaffoldPaths::new(self.root);
        std::fs::write(
            &paths.package_json,
            format!(r#"{{"name":"test","scripts":{{"test":"jest {function_name}.test.ts"}}}}"#),
        )?;
        init_git_identity(self.root)?;
        let git = Git::new(self.root);
        git.add(&["package.json"])?;
        git.commit_staged("Initial scaffolding")?;
        Ok(paths)
    }
}

/// Create a temp directory with an initialized git repository and a test
/// identity configured.
pub fn git_workspace() -> (tempfile::TempDir, Git) {
    let temp = tempfile::tempdir().expect("tempdir");
    init_git_identity(temp.path()).expect("init git");
    let git = Git::new(temp.path());
    (temp, git)
}

fn init_git_identity(root: &Path) -> Result<()> {
    let git = Git::new(root);
    git.init()?;
    for (key, value) in [("user.email", "test@example.com"), ("user.name", "Test")] {
        let status = Command::new("git")
            .args(["config", key, value])
            .current_dir(root)
            .status()?;
        if !status.success() {
            return Err(anyhow!("git config {key} failed"));
        }
    }
    Ok(())
}
