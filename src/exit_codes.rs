//! Stable exit codes for tsforge CLI commands.

/// Session reached terminal PASS (or a non-session command succeeded).
pub const OK: i32 = 0;
/// Invalid config/workspace or an infrastructure failure (scaffold, install,
/// harness crash, malformed service output past its retry budget).
pub const INVALID: i32 = 1;
/// Session reached terminal FAIL: operator declined to continue or the
/// iteration cap was hit with the test still failing.
pub const TESTS_FAILED: i32 = 2;
