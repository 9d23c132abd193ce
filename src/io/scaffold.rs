//! Workspace provisioning: package manifest, test-runner and type-checker
//! configuration, and the version-control repository.
//!
//! The [`Scaffolder`] trait decouples the session from npm/git so tests can
//! provision a bare workspace without spawning package-manager processes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, instrument};

use crate::io::git::Git;
use crate::io::npm::Npm;

const DEV_DEPENDENCIES: &[&str] = &["jest", "ts-jest", "@types/jest", "@types/node", "typescript"];

const JEST_CONFIG: &str = "module.exports = {\n  preset: 'ts-jest',\n  testEnvironment: 'node',\n};\n";

const GITIGNORE: &str = "node_modules/\n.tsforge/\n";

/// A scaffolding step failed. Process exit statuses are checked on every
/// step; proceeding on a broken workspace is never silent.
#[derive(Debug, Error)]
#[error("scaffold step '{step}' failed: {message}")]
pub struct ScaffoldError {
    pub step: &'static str,
    pub message: String,
}

/// Canonical paths of the provisioned workspace.
#[derive(Debug, Clone)]
pub struct ScaffoldPaths {
    pub root: PathBuf,
    pub package_json: PathBuf,
    pub jest_config: PathBuf,
    pub tsconfig: PathBuf,
    pub gitignore: PathBuf,
}

impl ScaffoldPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            package_json: root.join("package.json"),
            jest_config: root.join("jest.config.js"),
            tsconfig: root.join("tsconfig.json"),
            gitignore: root.join(".gitignore"),
            root,
        }
    }
}

/// Provisions the workspace before generation begins.
pub trait Scaffolder {
    fn scaffold(&self, function_name: &str) -> Result<ScaffoldPaths>;
}

/// Real scaffolder backed by npm and git.
pub struct NpmScaffolder<'a> {
    npm: &'a Npm,
    git: &'a Git,
}

impl<'a> NpmScaffolder<'a> {
    pub fn new(npm: &'a Npm, git: &'a Git) -> Self {
        Self { npm, git }
    }
}

impl Scaffolder for NpmScaffolder<'_> {
    /// Provision the workspace. Idempotent: an existing directory is reused,
    /// config files are rewritten deliberately, `git init` on an existing
    /// repository is a no-op, and the initial commit is skipped when nothing
    /// is staged.
    #[instrument(skip_all, fields(function_name))]
    fn scaffold(&self, function_name: &str) -> Result<ScaffoldPaths> {
        let paths = ScaffoldPaths::new(self.npm.workdir());
        fs::create_dir_all(&paths.root)
            .with_context(|| format!("create project directory {}", paths.root.display()))?;

        step("npm init", self.npm.init_project())?;
        patch_manifest(&paths.package_json, function_name)?;

        for package in DEV_DEPENDENCIES {
            step("install dev dependency", self.npm.install_dev(package))?;
        }

        fs::write(&paths.jest_config, JEST_CONFIG)
            .with_context(|| format!("write {}", paths.jest_config.display()))?;
        fs::write(&paths.tsconfig, tsconfig_contents()?)
            .with_context(|| format!("write {}", paths.tsconfig.display()))?;
        fs::write(&paths.gitignore, GITIGNORE)
            .with_context(|| format!("write {}", paths.gitignore.display()))?;

        step("git init", self.git.init())?;
        step(
            "git add",
            self.git.add(&[
                "package.json",
                "jest.config.js",
                "tsconfig.json",
                ".gitignore",
            ]),
        )?;
        let committed = step(
            "git commit",
            self.git.commit_staged("Initial scaffolding"),
        )?;
        if committed {
            info!(root = %paths.root.display(), "workspace scaffolded");
        } else {
            info!(root = %paths.root.display(), "workspace already scaffolded, nothing to commit");
        }

        Ok(paths)
    }
}

fn step<T>(name: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|err| {
        anyhow!(ScaffoldError {
            step: name,
            message: format!("{err:#}"),
        })
    })
}

/// Set `main` and the standard scripts in an existing package manifest.
///
/// `scripts.test` is scoped to the function's test file.
pub fn patch_manifest(path: &Path, function_name: &str) -> Result<()> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut manifest: Value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;

    manifest["main"] = json!(format!("{function_name}.ts"));
    if !manifest["scripts"].is_object() {
        manifest["scripts"] = Value::Object(serde_json::Map::new());
    }
    if let Some(scripts) = manifest["scripts"].as_object_mut() {
        scripts.insert("install".to_string(), json!("npm install"));
        scripts.insert("build".to_string(), json!("tsc"));
        scripts.insert(
            "test".to_string(),
            json!(format!("jest {function_name}.test.ts")),
        );
    }

    let mut buf = serde_json::to_string_pretty(&manifest).context("serialize package.json")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Type-checker configuration: strict mode, ES5 target, CommonJS output,
/// jest and node type declarations.
fn tsconfig_contents() -> Result<String> {
    let tsconfig = json!({
        "compilerOptions": {
            "target": "es5",
            "module": "commonjs",
            "strict": true,
            "noImplicitAny": true,
            "strictNullChecks": true,
            "esModuleInterop": true,
            "types": ["jest", "node"],
        }
    });
    let mut buf = serde_json::to_string_pretty(&tsconfig).context("serialize tsconfig")?;
    buf.push('\n');
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_manifest_sets_main_and_scripts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("package.json");
        fs::write(&path, r#"{"name":"demo","version":"1.0.0","scripts":{"start":"node ."}}"#)
            .expect("write");

        patch_manifest(&path, "add").expect("patch");

        let manifest: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(manifest["main"], "add.ts");
        assert_eq!(manifest["scripts"]["install"], "npm install");
        assert_eq!(manifest["scripts"]["build"], "tsc");
        assert_eq!(manifest["scripts"]["test"], "jest add.test.ts");
        // Pre-existing scripts survive.
        assert_eq!(manifest["scripts"]["start"], "node .");
    }

    #[test]
    fn patch_manifest_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("package.json");
        fs::write(&path, r#"{"name":"demo"}"#).expect("write");

        patch_manifest(&path, "add").expect("first patch");
        let first = fs::read_to_string(&path).expect("read");
        patch_manifest(&path, "add").expect("second patch");
        let second = fs::read_to_string(&path).expect("read");
        assert_eq!(first, second);
    }

    #[test]
    fn tsconfig_enables_strict_flags_and_test_types() {
        let contents = tsconfig_contents().expect("tsconfig");
        let parsed: Value = serde_json::from_str(&contents).expect("parse");
        let opts = &parsed["compilerOptions"];
        assert_eq!(opts["target"], "es5");
        assert_eq!(opts["module"], "commonjs");
        assert_eq!(opts["strict"], true);
        assert_eq!(opts["noImplicitAny"], true);
        assert_eq!(opts["strictNullChecks"], true);
        assert!(opts["types"].as_array().expect("types").contains(&json!("jest")));
    }

    #[test]
    fn scaffold_error_names_the_failed_step() {
        let err = step::<()>("npm init", Err(anyhow!("exit status 1"))).unwrap_err();
        let scaffold_err = err.downcast_ref::<ScaffoldError>().expect("typed");
        assert_eq!(scaffold_err.step, "npm init");
        assert!(scaffold_err.message.contains("exit status 1"));
    }
}
