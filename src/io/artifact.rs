//! Artifact persistence: write a generated source file and checkpoint it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::CodeArtifact;
use crate::io::git::Git;

/// Write `artifact` into the workspace and commit it.
///
/// Each write is its own commit, including on every regeneration. A rewrite
/// that produced identical source stages nothing and the commit is skipped.
#[instrument(skip_all, fields(file = %artifact.file_name, kind = artifact.kind.as_str()))]
pub fn persist_artifact(root: &Path, artifact: &CodeArtifact, git: &Git) -> Result<PathBuf> {
    let path = root.join(&artifact.file_name);
    let mut contents = artifact.source.clone();
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;

    git.add(&[&artifact.file_name])?;
    let committed = git.commit_staged(&format!("Add {}", artifact.file_name))?;
    debug!(committed, "artifact persisted");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::CodeArtifact;
    use crate::test_support::git_workspace;

    #[test]
    fn persists_and_commits_artifact() {
        let (temp, git) = git_workspace();
        let artifact = CodeArtifact::implementation("add", "export default 1;".to_string());

        let path = persist_artifact(temp.path(), &artifact, &git).expect("persist");

        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "export default 1;\n"
        );
        assert!(!git.has_staged_changes().expect("staged"));
    }

    #[test]
    fn rewriting_identical_source_skips_commit() {
        let (temp, git) = git_workspace();
        let artifact = CodeArtifact::implementation("add", "export default 1;".to_string());

        persist_artifact(temp.path(), &artifact, &git).expect("first");
        // Second write is byte-identical; must not fail on an empty commit.
        persist_artifact(temp.path(), &artifact, &git).expect("second");
    }

    #[test]
    fn regeneration_overwrites_in_place() {
        let (temp, git) = git_workspace();
        let first = CodeArtifact::implementation("add", "export default 1;".to_string());
        let second = CodeArtifact::implementation("add", "export default 2;".to_string());

        persist_artifact(temp.path(), &first, &git).expect("first");
        let path = persist_artifact(temp.path(), &second, &git).expect("second");

        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "export default 2;\n"
        );
    }
}
