// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Workspace model and folder classification.
//!
//! [`Workspace`] holds what the host editor knows: the ordered folder list,
//! the persisted multi-root workspace file and per-folder settings.
//! [`WorkspaceTracker`] answers which folder owns a language server for any
//! folder or URI.

mod folder;
mod tracker;

pub use folder::{Workspace, WorkspaceFolder, WorkspaceMode};
pub use tracker::WorkspaceTracker;

/// File whose presence marks a directory as a Mix project root.
pub const PROJECT_MARKER: &str = "mix.exs";
