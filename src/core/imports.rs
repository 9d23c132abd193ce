//! Static import scanning and dependency inference for generated source.
//!
//! Extracts module specifiers from `import … from '<module>'` statements,
//! normalizes them to installable package names, and excludes Node built-in
//! modules and relative paths. Also rewrites the import path a generated
//! test invents for the function under test to the correct relative path.

use std::sync::LazyLock;

use regex::Regex;

/// Node built-in modules excluded from dependency installation.
const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    // `import defaultExport from 'mod'`, `import { a, b } from 'mod'`,
    // `import * as ns from 'mod'`, bare `import 'mod'`.
    Regex::new(r#"(?m)^\s*import\s+(?:[^'"]+?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap()
});

/// External module specifiers found in a source text, in first-seen order,
/// deduplicated, with built-ins and relative paths excluded.
pub fn scan_imports(source: &str) -> Vec<String> {
    let mut packages = Vec::new();
    for caps in IMPORT_RE.captures_iter(source) {
        let specifier = &caps[1];
        let Some(package) = package_name(specifier) else {
            continue;
        };
        if is_builtin(&package) {
            continue;
        }
        if !packages.contains(&package) {
            packages.push(package);
        }
    }
    packages
}

/// Reduce a module specifier to its installable package name.
///
/// Strips the `node:` scheme, drops subpaths (`lodash/get` → `lodash`),
/// keeps scoped names whole (`@aws-sdk/client-s3`). Relative and absolute
/// paths yield `None`.
fn package_name(specifier: &str) -> Option<String> {
    if specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }
    let specifier = specifier.strip_prefix("node:").unwrap_or(specifier);
    let mut segments = specifier.split('/');
    let first = segments.next()?;
    if first.is_empty() {
        return None;
    }
    if first.starts_with('@') {
        let second = segments.next()?;
        if second.is_empty() {
            return None;
        }
        return Some(format!("{first}/{second}"));
    }
    Some(first.to_string())
}

fn is_builtin(package: &str) -> bool {
    NODE_BUILTINS.contains(&package)
}

/// Rewrite the import path a generated test uses for the function under
/// test to `./<function_name>`, regardless of what path the model invented.
///
/// Only import statements whose binding clause mentions the function name
/// are rewritten; unrelated imports are left untouched.
pub fn rewrite_function_import(test_source: &str, function_name: &str) -> String {
    static LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?m)^(\s*import\s+[^'"]+?\s+from\s+)['"][^'"]+['"]"#).unwrap()
    });

    LINE_RE
        .replace_all(test_source, |caps: &regex::Captures<'_>| {
            let clause = &caps[1];
            if clause.contains(function_name) {
                format!("{clause}'./{function_name}'")
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_without_imports_yields_no_packages() {
        let source = "export default function add(a: number, b: number) { return a + b; }";
        assert!(scan_imports(source).is_empty());
    }

    #[test]
    fn builtins_are_never_reported() {
        let source = "import * as fs from 'fs';\nimport { spawn } from 'child_process';\nimport path from 'node:path';\n";
        assert!(scan_imports(source).is_empty());
    }

    #[test]
    fn external_packages_reported_once_regardless_of_import_count() {
        let source = "import axios from 'axios';\nimport { get } from 'axios';\nimport _ from 'lodash/get';\n";
        assert_eq!(scan_imports(source), vec!["axios", "lodash"]);
    }

    #[test]
    fn scoped_packages_keep_scope_and_name() {
        let source = "import { S3 } from '@aws-sdk/client-s3/commands';\n";
        assert_eq!(scan_imports(source), vec!["@aws-sdk/client-s3"]);
    }

    #[test]
    fn relative_imports_are_not_dependencies() {
        let source = "import add from './add';\nimport helper from '../lib/helper';\n";
        assert!(scan_imports(source).is_empty());
    }

    #[test]
    fn bare_side_effect_imports_are_scanned() {
        let source = "import 'reflect-metadata';\n";
        assert_eq!(scan_imports(source), vec!["reflect-metadata"]);
    }

    #[test]
    fn rewrites_invented_import_path_for_function_under_test() {
        let source = "import { encodeVideoFFmpeg } from 'src/encodeVideo';\nimport { spawn } from 'child_process';\n";
        let rewritten = rewrite_function_import(source, "encodeVideoFFmpeg");
        assert!(rewritten.contains("from './encodeVideoFFmpeg'"));
        assert!(rewritten.contains("from 'child_process'"));
    }

    #[test]
    fn rewrites_default_import() {
        let source = "import add from 'some/made/up/path';\n";
        let rewritten = rewrite_function_import(source, "add");
        assert_eq!(rewritten, "import add from './add';\n");
    }

    #[test]
    fn leaves_correct_path_semantically_identical() {
        let source = "import add from './add';\n";
        let rewritten = rewrite_function_import(source, "add");
        assert_eq!(rewritten, "import add from './add';\n");
    }
}
