//! Iteration transcript helpers for `.tsforge/iterations/`.
//!
//! Product artifacts written every iteration regardless of `RUST_LOG`: the
//! implementation snapshot, the captured test output, and a small metadata
//! file. The authoritative session history stays in memory; these files
//! exist for post-hoc audit.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::report::TestReport;
use crate::core::types::IterationRecord;

#[derive(Debug, Clone, Serialize)]
pub struct IterationMeta {
    pub iter: u32,
    pub passed: bool,
    pub report: Option<TestReport>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub implementation_path: PathBuf,
    pub test_output_path: PathBuf,
}

impl IterationPaths {
    pub fn new(root: &Path, iter: u32) -> Self {
        let dir = root
            .join(".tsforge")
            .join("iterations")
            .join(iter.to_string());
        Self {
            dir: dir.clone(),
            meta_path: dir.join("meta.json"),
            implementation_path: dir.join("implementation.ts"),
            test_output_path: dir.join("test_output.txt"),
        }
    }
}

pub fn write_iteration(
    root: &Path,
    record: &IterationRecord,
    duration_ms: Option<u64>,
) -> Result<IterationPaths> {
    let paths = IterationPaths::new(root, record.iter);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create iteration dir {}", paths.dir.display()))?;

    // Write in deterministic order to keep transcripts stable.
    write_json(
        &paths.meta_path,
        &IterationMeta {
            iter: record.iter,
            passed: record.outcome.passed,
            report: record.outcome.report.clone(),
            duration_ms,
        },
    )?;
    write_text(&paths.implementation_path, &record.implementation)?;
    write_text(&paths.test_output_path, &record.outcome.output)?;

    Ok(paths)
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    write_text(path, &buf)
}
