// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Workspace folders and the host workspace state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::FolderSettings;
use crate::error::WorkspaceError;

/// A folder opened in the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceFolder {
    pub uri: Url,
    pub name: String,
    /// Position in the workspace folder list.
    pub index: usize,
}

impl WorkspaceFolder {
    /// Routing key string of this folder.
    pub fn key(&self) -> String {
        trim_slash(self.uri.as_str()).to_string()
    }

    /// Local filesystem path of the folder.
    pub fn path(&self) -> Result<PathBuf, WorkspaceError> {
        self.uri
            .to_file_path()
            .map_err(|_| WorkspaceError::NotAFilePath(self.uri.to_string()))
    }
}

/// Shape of the current workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceMode {
    NoWorkspace,
    SingleFolder,
    MultiRoot,
}

impl std::fmt::Display for WorkspaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoWorkspace => write!(f, "no workspace"),
            Self::SingleFolder => write!(f, "single folder"),
            Self::MultiRoot => write!(f, "multi-root"),
        }
    }
}

#[derive(Debug, Default)]
struct WorkspaceState {
    folders: Vec<WorkspaceFolder>,
    workspace_file: Option<PathBuf>,
    /// Keyed by [`WorkspaceFolder::key`].
    settings: HashMap<String, FolderSettings>,
    defaults: FolderSettings,
}

/// Host workspace state: the ordered folder list, the persisted workspace
/// file (if any), and per-folder settings.
#[derive(Debug, Default)]
pub struct Workspace {
    state: RwLock<WorkspaceState>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a workspace whose folders inherit `defaults`.
    pub fn with_defaults(defaults: FolderSettings) -> Self {
        let workspace = Self::default();
        workspace.write(|state| state.defaults = defaults);
        workspace
    }

    fn read<T>(&self, f: impl FnOnce(&WorkspaceState) -> T) -> T {
        match self.state.read() {
            Ok(guard) => f(&guard),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write<T>(&self, f: impl FnOnce(&mut WorkspaceState) -> T) -> T {
        match self.state.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Append a folder. Adding a folder that is already open returns the
    /// existing entry.
    pub fn add_folder(&self, uri: Url, name: impl Into<String>) -> WorkspaceFolder {
        let name = name.into();
        self.write(|state| {
            let key = trim_slash(uri.as_str()).to_string();
            if let Some(existing) = state.folders.iter().find(|f| f.key() == key) {
                return existing.clone();
            }
            let folder = WorkspaceFolder {
                uri,
                name,
                index: state.folders.len(),
            };
            state.folders.push(folder.clone());
            folder
        })
    }

    /// Append a folder from a local directory, named after its last component.
    pub fn add_folder_path(&self, path: &Path) -> Result<WorkspaceFolder, WorkspaceError> {
        let uri = Url::from_file_path(path)
            .map_err(|_| WorkspaceError::NotAFilePath(path.display().to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.add_folder(uri, name))
    }

    /// Remove a folder and reindex the remaining ones.
    pub fn remove_folder(&self, uri: &Url) -> Option<WorkspaceFolder> {
        let key = trim_slash(uri.as_str()).to_string();
        self.write(|state| {
            let pos = state.folders.iter().position(|f| f.key() == key)?;
            let removed = state.folders.remove(pos);
            for (index, folder) in state.folders.iter_mut().enumerate() {
                folder.index = index;
            }
            state.settings.remove(&key);
            Some(removed)
        })
    }

    /// Snapshot of the open folders, in order.
    pub fn folders(&self) -> Vec<WorkspaceFolder> {
        self.read(|state| state.folders.clone())
    }

    pub fn first_folder(&self) -> Option<WorkspaceFolder> {
        self.read(|state| state.folders.first().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.read(|state| state.folders.is_empty())
    }

    /// Exact lookup by folder URI. A trailing `/` is ignored.
    pub fn folder_by_uri(&self, uri: &str) -> Option<WorkspaceFolder> {
        let key = trim_slash(uri);
        self.read(|state| state.folders.iter().find(|f| f.key() == key).cloned())
    }

    /// Innermost folder containing `uri`. Documents outside the `file`
    /// scheme (e.g. `untitled:`) belong to no folder.
    pub fn folder_for_uri(&self, uri: &Url) -> Option<WorkspaceFolder> {
        if uri.scheme() != "file" {
            return None;
        }
        let target = uri.as_str();
        self.read(|state| {
            state
                .folders
                .iter()
                .filter(|f| {
                    let key = f.key();
                    target == key
                        || target
                            .strip_prefix(key.as_str())
                            .is_some_and(|rest| rest.starts_with('/'))
                })
                .max_by_key(|f| f.key().len())
                .cloned()
        })
    }

    /// Effective settings of a folder: its own settings over the defaults.
    pub fn settings_for(&self, folder: &WorkspaceFolder) -> FolderSettings {
        self.read(|state| match state.settings.get(&folder.key()) {
            Some(own) => state.defaults.merged_with(own),
            None => state.defaults.clone(),
        })
    }

    /// Settings used for sessions that have no folder.
    pub fn default_settings(&self) -> FolderSettings {
        self.read(|state| state.defaults.clone())
    }

    pub fn set_folder_settings(&self, uri: &Url, settings: FolderSettings) {
        let key = trim_slash(uri.as_str()).to_string();
        self.write(|state| {
            state.settings.insert(key, settings);
        });
    }

    /// Set or clear the persisted multi-root workspace file.
    pub fn set_workspace_file(&self, path: Option<PathBuf>) {
        self.write(|state| state.workspace_file = path);
    }

    pub fn workspace_file(&self) -> Option<PathBuf> {
        self.read(|state| state.workspace_file.clone())
    }
}

pub(crate) fn trim_slash(uri: &str) -> &str {
    uri.strip_suffix('/').unwrap_or(uri)
}
