//! Side-effecting operations: filesystem, child processes, git, npm, the
//! chat service, and the operator terminal.

pub mod artifact;
pub mod chat;
pub mod config;
pub mod git;
pub mod npm;
pub mod operator;
pub mod process;
pub mod prompt;
pub mod scaffold;
pub mod transcript;
