// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ExUnit test file discovery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use walkdir::WalkDir;

use crate::error::ToolError;
use crate::workspace::{WorkspaceFolder, WorkspaceTracker};

use super::tree::ModuleEntry;

/// Test files, relative to the project directory. Umbrella apps keep
/// theirs under `apps/*/test`.
pub const TEST_FILE_GLOB: &str = "**/test/**/*_test.exs";

/// Directories never searched for tests.
const SKIPPED_DIRS: &[&str] = &["deps", "_build", ".elixir_ls", "node_modules"];

fn test_file_matcher() -> Result<GlobMatcher, ToolError> {
    Glob::new(TEST_FILE_GLOB)
        .map(|g| g.compile_matcher())
        .map_err(|e| ToolError::ExecutionFailed(format!("invalid test glob: {}", e)))
}

/// All ExUnit test files under `project_dir`, sorted.
pub fn find_test_files(project_dir: &Path) -> Result<Vec<PathBuf>, ToolError> {
    let matcher = test_file_matcher()?;
    let mut files = Vec::new();

    let walker = WalkDir::new(project_dir).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !(entry.file_type().is_dir()
                && SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref()))
    });
    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(project_dir) else {
            continue;
        };
        if matcher.is_match(relative) {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Distinct outermost folders with their project directories, keyed by
/// routing key.
///
/// Nested folders served by an enclosing project collapse onto it.
pub fn project_folders(tracker: &WorkspaceTracker) -> Vec<(WorkspaceFolder, PathBuf)> {
    let mut distinct: BTreeMap<String, (WorkspaceFolder, PathBuf)> = BTreeMap::new();
    for folder in tracker.workspace().folders() {
        let Ok(outermost) = tracker.outermost_folder(&folder) else {
            continue;
        };
        if distinct.contains_key(&outermost.key()) {
            continue;
        }
        let Ok(project_dir) = tracker.project_dir_for_folder(&outermost) else {
            continue;
        };
        distinct.insert(outermost.key(), (outermost, project_dir));
    }

    let mut folders: Vec<_> = distinct.into_values().collect();
    folders.sort_by_key(|(folder, _)| folder.index);
    folders
}

/// Parse a `getExUnitTestsInFile` response.
pub fn parse_tests_response(value: serde_json::Value) -> Result<Vec<ModuleEntry>, ToolError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    if let Some(error) = value.get("error") {
        return Err(ToolError::ExecutionFailed(match error {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }));
    }
    serde_json::from_value(value)
        .map_err(|e| ToolError::ExecutionFailed(format!("unexpected test list: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::Workspace;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_find_test_files_skips_deps_and_build() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(root, "test/a_test.exs");
        touch(root, "test/nested/b_test.exs");
        touch(root, "test/test_helper.exs");
        touch(root, "lib/c_test.exs");
        touch(root, "deps/dep/test/d_test.exs");
        touch(root, "_build/test/e_test.exs");
        touch(root, "apps/child/test/f_test.exs");

        let files = find_test_files(root).unwrap();
        let rel: Vec<String> = files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().display().to_string())
            .collect();
        assert_eq!(
            rel,
            vec!["apps/child/test/f_test.exs", "test/a_test.exs", "test/nested/b_test.exs"]
        );
    }

    #[test]
    fn test_project_folders_collapse_nested() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("umbrella");
        touch(&root, "mix.exs");
        touch(&root, "apps/child1/mix.exs");

        let workspace = Arc::new(Workspace::new());
        workspace.add_folder_path(&root).unwrap();
        workspace.add_folder_path(&root.join("apps/child1")).unwrap();
        let tracker = WorkspaceTracker::new(workspace);

        let folders = project_folders(&tracker);
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].1, root);
    }

    #[test]
    fn test_parse_tests_response() {
        let value = serde_json::json!([
            {"module": "ATest", "line": 1, "describes": [
                {"describe": null, "line": null, "tests": [{"name": "works", "line": 4, "type": "test"}]}
            ]}
        ]);
        let modules = parse_tests_response(value).unwrap();
        assert_eq!(modules[0].module, "ATest");
        assert_eq!(modules[0].describes[0].tests[0].line, 4);

        assert!(parse_tests_response(serde_json::Value::Null).unwrap().is_empty());
        assert!(matches!(
            parse_tests_response(serde_json::json!({"error": "not compiled"})),
            Err(ToolError::ExecutionFailed(msg)) if msg == "not compiled"
        ));
    }
}
