//! Orchestration of one generate → scaffold → verify → repair session.
//!
//! The controller walks a fixed state machine: scaffold the workspace,
//! generate the implementation, generate the test (referencing, not
//! duplicating, the implementation), resolve dependencies, run the test,
//! and on failure regenerate the implementation with the failure transcript
//! appended, until the test passes, the continuation policy declines, or
//! the iteration cap is reached.
//!
//! Retry regenerates only the implementation: the test encodes the
//! acceptance criteria and is re-run unchanged against each new attempt.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::decision::ContinuePolicy;
use crate::core::imports::scan_imports;
use crate::core::types::{CodeArtifact, IterationRecord, Verdict};
use crate::io::artifact::persist_artifact;
use crate::io::chat::{ChatService, GenerationClient};
use crate::io::config::SessionConfig;
use crate::io::git::Git;
use crate::io::npm::{PackageInstaller, TestHarness, install_dependencies};
use crate::io::scaffold::Scaffolder;
use crate::io::transcript::write_iteration;

/// Operator-supplied session inputs.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    /// Name of the function to generate; also names both artifacts.
    pub function_name: String,
    /// Natural-language description of what the function should do.
    pub task: String,
}

/// Reason why a session reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStop {
    /// The test run passed.
    Passed,
    /// The continuation policy (operator or fixed-retry budget) declined.
    Declined,
    /// The configured iteration cap was reached with the test still failing.
    MaxIterationsExceeded { max_iterations: u32 },
}

/// Terminal result of a session, with the full in-memory history.
#[derive(Debug)]
pub struct SessionOutcome {
    pub stop: SessionStop,
    /// Number of test-run iterations executed.
    pub iterations: u32,
    pub history: Vec<IterationRecord>,
}

impl SessionOutcome {
    pub fn verdict(&self) -> Verdict {
        match self.stop {
            SessionStop::Passed => Verdict::Pass,
            SessionStop::Declined | SessionStop::MaxIterationsExceeded { .. } => Verdict::Fail,
        }
    }
}

/// One session's collaborators, injected at construction so the loop runs
/// against scripted fakes in tests.
pub struct Session<'a, S, F, I, H>
where
    S: ChatService,
    F: Scaffolder,
    I: PackageInstaller,
    H: TestHarness,
{
    root: &'a Path,
    config: &'a SessionConfig,
    service: &'a S,
    scaffolder: &'a F,
    installer: &'a I,
    harness: &'a H,
}

impl<'a, S, F, I, H> Session<'a, S, F, I, H>
where
    S: ChatService,
    F: Scaffolder,
    I: PackageInstaller,
    H: TestHarness,
{
    pub fn new(
        root: &'a Path,
        config: &'a SessionConfig,
        service: &'a S,
        scaffolder: &'a F,
        installer: &'a I,
        harness: &'a H,
    ) -> Self {
        Self {
            root,
            config,
            service,
            scaffolder,
            installer,
            harness,
        }
    }

    /// Run the session to a terminal PASS or FAIL.
    ///
    /// Infrastructure failures (scaffold, install, malformed output past its
    /// retry budget, harness crash) return `Err` and are distinct from a
    /// FAIL verdict, which means the test ran and kept failing.
    #[instrument(skip_all, fields(function_name = %request.function_name))]
    pub fn run<P: ContinuePolicy>(
        &self,
        request: &SessionRequest,
        policy: &mut P,
    ) -> Result<SessionOutcome> {
        let function_name = &request.function_name;
        self.scaffolder
            .scaffold(function_name)
            .context("scaffold workspace")?;
        let git = Git::new(self.root);
        let client = GenerationClient::new(self.service, self.config);

        info!("generating implementation");
        let mut impl_source =
            client.generate_implementation(function_name, &request.task, None)?;
        let impl_artifact = CodeArtifact::implementation(function_name, impl_source.clone());
        persist_artifact(self.root, &impl_artifact, &git)?;

        info!("generating test");
        let test_source =
            client.generate_test(function_name, &impl_artifact.file_name, &impl_source)?;
        let test_artifact = CodeArtifact::test(function_name, test_source.clone());
        persist_artifact(self.root, &test_artifact, &git)?;

        let mut history: Vec<IterationRecord> = Vec::new();
        let mut iter = 1u32;
        loop {
            // Dependencies are resolved once per generation cycle per
            // artifact: the test's imports only on the first cycle (it is
            // never regenerated), the implementation's on every cycle.
            let mut packages = scan_imports(&impl_source);
            if iter == 1 {
                for package in scan_imports(&test_source) {
                    if !packages.contains(&package) {
                        packages.push(package);
                    }
                }
            }
            install_dependencies(&packages, self.installer)?;

            info!(iter, "running test");
            let started = Instant::now();
            let outcome = self
                .harness
                .run_test(&test_artifact.file_name)
                .with_context(|| format!("run test iteration {iter}"))?;
            let record = IterationRecord {
                iter,
                implementation: impl_source.clone(),
                outcome,
            };
            write_iteration(
                self.root,
                &record,
                Some(started.elapsed().as_millis() as u64),
            )?;
            if record.outcome.passed {
                info!(iter, "test passed");
                history.push(record);
                return Ok(SessionOutcome {
                    stop: SessionStop::Passed,
                    iterations: iter,
                    history,
                });
            }

            if iter >= self.config.max_iterations {
                warn!(
                    max_iterations = self.config.max_iterations,
                    "iteration cap reached with test still failing"
                );
                history.push(record);
                return Ok(SessionOutcome {
                    stop: SessionStop::MaxIterationsExceeded {
                        max_iterations: self.config.max_iterations,
                    },
                    iterations: iter,
                    history,
                });
            }

            if !policy.should_continue(iter, &record.outcome)? {
                info!(iter, "continuation declined");
                history.push(record);
                return Ok(SessionOutcome {
                    stop: SessionStop::Declined,
                    iterations: iter,
                    history,
                });
            }

            let failure_output = record.outcome.output.clone();
            history.push(record);

            info!(iter, "test failed, regenerating implementation");
            impl_source = client.generate_implementation(
                function_name,
                &request.task,
                Some(&failure_output),
            )?;
            let regenerated = CodeArtifact::implementation(function_name, impl_source.clone());
            persist_artifact(self.root, &regenerated, &git)?;
            iter += 1;
        }
    }
}

/// Render the session history for audit on terminal FAIL: every
/// implementation attempt followed by the final test transcript.
pub fn render_history(outcome: &SessionOutcome) -> String {
    let mut buf = String::new();
    for record in &outcome.history {
        let _ = writeln!(buf, "=== Attempt {} ===", record.iter);
        let _ = writeln!(buf, "{}", record.implementation.trim_end());
        buf.push('\n');
    }
    if let Some(last) = outcome.history.last() {
        let _ = writeln!(buf, "=== Final test output ===");
        let _ = writeln!(buf, "{}", last.outcome.output.trim_end());
    }
    buf
}
