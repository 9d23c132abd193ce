//! Iterative generate → scaffold → verify → repair loop.
//!
//! This crate drives an external chat-completion service to produce a
//! TypeScript implementation and a matching jest test, provisions a minimal
//! npm project around them, runs the test, and regenerates the
//! implementation with the failure transcript appended until the suite
//! passes or the continuation policy stops the loop. The architecture
//! enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (fence extraction, import
//!   scanning, report classification, continuation decisions). No I/O,
//!   fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, npm, the chat
//!   service, the operator terminal). Isolated behind traits to enable
//!   scripted fakes in tests.
//!
//! [`session`] coordinates core logic with I/O to implement the loop.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
