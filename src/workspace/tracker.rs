// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Workspace classification and outermost folder resolution.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, instrument};
use url::Url;

use crate::error::WorkspaceError;

use super::folder::{Workspace, WorkspaceFolder, WorkspaceMode};
use super::PROJECT_MARKER;

/// Resolves which workspace folder owns a language server.
///
/// Nested folders (e.g. `apps/child1` of an umbrella project opened next to
/// the umbrella root) share the server of their outermost project folder.
pub struct WorkspaceTracker {
    workspace: Arc<Workspace>,
    /// Folder URIs with a trailing `/`, shortest first.
    sorted_folders: Mutex<Option<Arc<Vec<String>>>>,
    rebuilds: AtomicU64,
}

impl WorkspaceTracker {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            workspace,
            sorted_folders: Mutex::new(None),
            rebuilds: AtomicU64::new(0),
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Classify the workspace.
    pub fn mode(&self) -> WorkspaceMode {
        if self.workspace.workspace_file().is_some() {
            WorkspaceMode::MultiRoot
        } else if !self.workspace.is_empty() {
            WorkspaceMode::SingleFolder
        } else {
            WorkspaceMode::NoWorkspace
        }
    }

    /// Drop the memoised folder list. Must be called after every folder
    /// add or remove.
    pub fn handle_did_change_workspace_folders(&self) {
        if let Ok(mut cache) = self.sorted_folders.lock() {
            *cache = None;
        }
    }

    /// Number of times the sorted folder list was rebuilt.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Relaxed)
    }

    fn sorted_folders(&self) -> Arc<Vec<String>> {
        let mut cache = match self.sorted_folders.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(list) = cache.as_ref() {
            return Arc::clone(list);
        }

        let mut list: Vec<String> = self
            .workspace
            .folders()
            .iter()
            .map(|f| normalize_uri(&f.uri))
            .collect();
        list.sort_by_key(|uri| uri.len());

        let list = Arc::new(list);
        *cache = Some(Arc::clone(&list));
        self.rebuilds.fetch_add(1, Ordering::Relaxed);
        list
    }

    /// Resolve the folder whose server owns `folder`.
    ///
    /// Candidates are scanned shortest URI first; the first prefix folder
    /// with a project marker wins, otherwise the first prefix folder.
    #[instrument(skip(self, folder), fields(folder = %folder.name))]
    pub fn outermost_folder(
        &self,
        folder: &WorkspaceFolder,
    ) -> Result<WorkspaceFolder, WorkspaceError> {
        if let Some(found) = self.find_outermost(folder) {
            return Ok(found);
        }

        debug!("Folder not in cached folder list, rebuilding");
        self.handle_did_change_workspace_folders();

        self.find_outermost(folder).ok_or_else(|| {
            error!(uri = %folder.uri, "Outermost folder requested for a folder outside the workspace");
            WorkspaceError::FolderNotInWorkspace(folder.uri.to_string())
        })
    }

    fn find_outermost(&self, folder: &WorkspaceFolder) -> Option<WorkspaceFolder> {
        let target = normalize_uri(&folder.uri);
        let candidates = if self.workspace.settings_for(folder).uses_current_root_folder() {
            Arc::new(vec![target.clone()])
        } else {
            self.sorted_folders()
        };

        let mut fallback = None;
        for candidate in candidates.iter() {
            if !target.starts_with(candidate.as_str()) {
                continue;
            }
            let Some(found) = self.workspace.folder_by_uri(candidate) else {
                continue;
            };
            if self.has_project_marker(&found) {
                return Some(found);
            }
            if fallback.is_none() {
                fallback = Some(found);
            }
        }
        fallback
    }

    fn has_project_marker(&self, folder: &WorkspaceFolder) -> bool {
        self.project_dir_for_folder(folder)
            .map(|dir| dir.join(PROJECT_MARKER).is_file())
            .unwrap_or(false)
    }

    /// Project directory of a folder: its path, joined with the
    /// `projectDir` setting when set.
    pub fn project_dir_for_folder(
        &self,
        folder: &WorkspaceFolder,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = folder.path()?;
        Ok(match self.workspace.settings_for(folder).project_dir {
            Some(sub) => path.join(sub),
            None => path,
        })
    }

    /// Project directory serving `uri`, if the URI belongs to a folder.
    pub fn project_dir_for_uri(&self, uri: &Url) -> Result<Option<PathBuf>, WorkspaceError> {
        let Some(folder) = self.workspace.folder_for_uri(uri) else {
            return Ok(None);
        };
        let outermost = self.outermost_folder(&folder)?;
        self.project_dir_for_folder(&outermost).map(Some)
    }
}

/// Folder URI as a string ending in `/`.
fn normalize_uri(uri: &Url) -> String {
    let s = uri.as_str();
    if s.ends_with('/') {
        s.to_string()
    } else {
        format!("{}/", s)
    }
}
