//! Continuation policy for failing iterations.
//!
//! The controller never reads the terminal directly; it asks a
//! [`ContinuePolicy`] whether to keep iterating after a failed test run.
//! The interactive implementation lives in `io::operator`; the policies
//! here are deterministic and keep the loop testable without an operator.

use anyhow::Result;

use crate::core::types::TestOutcome;

/// Decides whether the loop continues after a failing iteration.
///
/// `iter` is the 1-indexed iteration that just failed.
pub trait ContinuePolicy {
    fn should_continue(&mut self, iter: u32, outcome: &TestOutcome) -> Result<bool>;
}

/// Continue for a fixed number of failing iterations, then stop.
#[derive(Debug, Clone)]
pub struct FixedRetries {
    remaining: u32,
}

impl FixedRetries {
    pub fn new(retries: u32) -> Self {
        Self {
            remaining: retries,
        }
    }
}

impl ContinuePolicy for FixedRetries {
    fn should_continue(&mut self, _iter: u32, _outcome: &TestOutcome) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        Ok(true)
    }
}

/// Always continue; the loop is bounded only by `max_iterations`.
#[derive(Debug, Clone, Copy)]
pub struct AlwaysContinue;

impl ContinuePolicy for AlwaysContinue {
    fn should_continue(&mut self, _iter: u32, _outcome: &TestOutcome) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_outcome() -> TestOutcome {
        TestOutcome {
            output: "1 failed".to_string(),
            report: None,
            passed: false,
        }
    }

    #[test]
    fn fixed_retries_exhausts() {
        let mut policy = FixedRetries::new(2);
        assert!(policy.should_continue(1, &failing_outcome()).expect("decide"));
        assert!(policy.should_continue(2, &failing_outcome()).expect("decide"));
        assert!(!policy.should_continue(3, &failing_outcome()).expect("decide"));
    }

    #[test]
    fn zero_retries_stops_immediately() {
        let mut policy = FixedRetries::new(0);
        assert!(!policy.should_continue(1, &failing_outcome()).expect("decide"));
    }

    #[test]
    fn always_continue_never_stops() {
        let mut policy = AlwaysContinue;
        for iter in 1..50 {
            assert!(policy.should_continue(iter, &failing_outcome()).expect("decide"));
        }
    }
}
