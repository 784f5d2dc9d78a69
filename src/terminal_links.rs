// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Links to Elixir source locations in terminal output.
//!
//! Compiler warnings, stack traces and test failures print locations like
//! `lib/app/worker.ex:42`. Paths are resolved against the project directory
//! of the folder that produced the output; only existing files are reported.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::workspace::{WorkspaceFolder, WorkspaceTracker};

static LOCATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(\[{'\x22])((?:[A-Za-z]:)?[\w@.+/\\-]*[\w-]\.(?:ex|exs|eex|heex)):(\d+)").ok()
});

/// A source location found in a line of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalLink {
    /// Byte offset of the link in the line.
    pub start: usize,
    /// Length of the link text in bytes (`path:line`).
    pub length: usize,
    /// Resolved absolute file path.
    pub path: PathBuf,
    /// 1-based line number.
    pub line: u32,
}

/// Find the links in `text`, resolving relative paths against `project_dir`.
pub fn find_links(text: &str, project_dir: &Path) -> Vec<TerminalLink> {
    let Some(re) = LOCATION.as_ref() else {
        return Vec::new();
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let file = caps.get(1)?;
            let line: u32 = caps.get(2)?.as_str().parse().ok()?;
            if line == 0 {
                return None;
            }
            let path = resolve_path(file.as_str(), project_dir)?;
            let end = caps.get(2)?.end();
            Some(TerminalLink {
                start: file.start(),
                length: end - file.start(),
                path,
                line,
            })
        })
        .collect()
}

fn resolve_path(file: &str, project_dir: &Path) -> Option<PathBuf> {
    let candidate = Path::new(file);
    let path = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        project_dir.join(candidate)
    };
    path.is_file().then_some(path)
}

/// Resolves links for output produced in a workspace folder.
pub struct TerminalLinkResolver<'a> {
    tracker: &'a WorkspaceTracker,
}

impl<'a> TerminalLinkResolver<'a> {
    pub fn new(tracker: &'a WorkspaceTracker) -> Self {
        Self { tracker }
    }

    /// Links in `text` printed by a task running in `folder` (the first
    /// workspace folder when `None`).
    pub fn links(&self, text: &str, folder: Option<&WorkspaceFolder>) -> Vec<TerminalLink> {
        let folder = match folder {
            Some(folder) => folder.clone(),
            None => match self.tracker.workspace().first_folder() {
                Some(folder) => folder,
                None => return Vec::new(),
            },
        };
        let Ok(outermost) = self.tracker.outermost_folder(&folder) else {
            return Vec::new();
        };
        match self.tracker.project_dir_for_folder(&outermost) {
            Ok(dir) => find_links(text, &dir),
            Err(_) => Vec::new(),
        }
    }
}
