//! Pure, deterministic logic with no I/O.

pub mod decision;
pub mod fence;
pub mod imports;
pub mod report;
pub mod types;
