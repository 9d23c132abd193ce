//! npm adapter: project init, package installation, and the test harness.
//!
//! The [`PackageInstaller`] and [`TestHarness`] traits decouple the session
//! from the real package manager so tests can use scripted implementations
//! without spawning processes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::report::classify;
use crate::core::types::TestOutcome;
use crate::io::process::run_command_with_timeout;

/// Installs a single package into the project.
pub trait PackageInstaller {
    fn install(&self, package: &str) -> Result<()>;
}

/// Runs the project's test command against a specific test file.
pub trait TestHarness {
    fn run_test(&self, test_file: &str) -> Result<TestOutcome>;
}

/// One or more package installs failed. Every package is still attempted;
/// the failures are reported together.
#[derive(Debug, Clone, Error)]
#[error("failed to install packages: {}", failed.join(", "))]
pub struct InstallError {
    pub failed: Vec<String>,
}

/// The test harness itself crashed or timed out. Distinct from a test run
/// that completed with failures.
#[derive(Debug, Clone, Error)]
pub enum HarnessError {
    #[error("test command could not be run: {0}")]
    Spawn(String),
    #[error("test command timed out after {0} seconds")]
    TimedOut(u64),
}

/// Wrapper for executing npm commands in a project directory.
#[derive(Debug, Clone)]
pub struct Npm {
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl Npm {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
            output_limit_bytes,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// `npm init -y`: create a default package manifest.
    #[instrument(skip_all)]
    pub fn init_project(&self) -> Result<()> {
        self.run_checked(&["init", "-y"])?;
        Ok(())
    }

    /// Install a development dependency.
    #[instrument(skip_all, fields(package))]
    pub fn install_dev(&self, package: &str) -> Result<()> {
        self.run_checked(&["install", "--save-dev", package])?;
        Ok(())
    }

    fn run_checked(&self, args: &[&str]) -> Result<()> {
        let mut cmd = std::process::Command::new("npm");
        cmd.args(args).current_dir(&self.workdir);
        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("spawn npm {}", args.join(" ")))?;
        if output.timed_out {
            return Err(anyhow!(
                "npm {} timed out after {}s",
                args.join(" "),
                self.timeout.as_secs()
            ));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "npm {} failed: {}",
                args.join(" "),
                stderr.trim()
            ));
        }
        Ok(())
    }
}

impl PackageInstaller for Npm {
    fn install(&self, package: &str) -> Result<()> {
        info!(package, "installing dependency");
        self.run_checked(&["install", package])
    }
}

impl TestHarness for Npm {
    /// `npm test -- <file> --json`: run jest against the named file with
    /// structured output. Non-zero exit is expected for failing tests and
    /// is not an error; classification happens on the captured output.
    #[instrument(skip_all, fields(test_file))]
    fn run_test(&self, test_file: &str) -> Result<TestOutcome> {
        let mut cmd = std::process::Command::new("npm");
        cmd.args(["test", "--", test_file, "--json"])
            .current_dir(&self.workdir);

        let output = run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes)
            .map_err(|err| anyhow!(HarnessError::Spawn(format!("{err:#}"))))?;
        if output.timed_out {
            return Err(HarnessError::TimedOut(self.timeout.as_secs()).into());
        }

        let text = output.combined_text();
        let (report, passed) = classify(&text);
        debug!(passed, structured = report.is_some(), "test run classified");
        Ok(TestOutcome {
            output: text,
            report,
            passed,
        })
    }
}

/// Install every package in `packages`, attempting all of them even after
/// a failure, and surface the failures together as an [`InstallError`].
pub fn install_dependencies(packages: &[String], installer: &dyn PackageInstaller) -> Result<()> {
    let mut failed = Vec::new();
    for package in packages {
        if let Err(err) = installer.install(package) {
            warn!(package = %package, err = %err, "package install failed");
            failed.push(package.clone());
        }
    }
    if failed.is_empty() {
        return Ok(());
    }
    Err(InstallError { failed }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingInstaller {
        installed: RefCell<Vec<String>>,
        fail_on: Vec<String>,
    }

    impl PackageInstaller for RecordingInstaller {
        fn install(&self, package: &str) -> Result<()> {
            self.installed.borrow_mut().push(package.to_string());
            if self.fail_on.iter().any(|p| p == package) {
                return Err(anyhow!("registry unavailable"));
            }
            Ok(())
        }
    }

    #[test]
    fn installs_every_package_once() {
        let installer = RecordingInstaller {
            installed: RefCell::new(Vec::new()),
            fail_on: Vec::new(),
        };
        let packages = vec!["axios".to_string(), "lodash".to_string()];

        install_dependencies(&packages, &installer).expect("install");
        assert_eq!(*installer.installed.borrow(), packages);
    }

    #[test]
    fn empty_set_issues_zero_installs() {
        let installer = RecordingInstaller {
            installed: RefCell::new(Vec::new()),
            fail_on: Vec::new(),
        };

        install_dependencies(&[], &installer).expect("install");
        assert!(installer.installed.borrow().is_empty());
    }

    #[test]
    fn one_failure_does_not_block_the_rest_but_is_reported() {
        let installer = RecordingInstaller {
            installed: RefCell::new(Vec::new()),
            fail_on: vec!["axios".to_string()],
        };
        let packages = vec![
            "axios".to_string(),
            "lodash".to_string(),
            "zod".to_string(),
        ];

        let err = install_dependencies(&packages, &installer).unwrap_err();
        // All three were attempted.
        assert_eq!(installer.installed.borrow().len(), 3);
        let install_err = err.downcast_ref::<InstallError>().expect("typed error");
        assert_eq!(install_err.failed, vec!["axios".to_string()]);
    }
}
