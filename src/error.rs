// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the ElixirLS client.
//!
//! This module provides strongly-typed errors for the workspace tracker, the
//! client registry, the tool layer and configuration loading, using
//! `thiserror` for the definitions and `anyhow` for propagation at the edges.

use thiserror::Error;

use crate::lsp::LspError;

/// Errors raised while classifying workspace folders.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceError {
    /// Resolution was requested for a folder that is not part of the
    /// current folder set, even after rebuilding the folder cache.
    #[error("Workspace folder not found in current folder set: {0}")]
    FolderNotInWorkspace(String),

    #[error("Workspace folder URI is not a file path: {0}")]
    NotAFilePath(String),
}

/// Errors raised by the client registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No session is registered for the resolved routing key.
    #[error("No language client registered for {key}")]
    ClientNotFound { key: String },

    /// The session's language server failed to start or restart.
    #[error("Language client for {key} failed to start: {message}")]
    StartupFailed { key: String, message: String },

    /// The session was torn down while a caller was waiting on it.
    #[error("Language client for {0} was disposed")]
    Disposed(String),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl RegistryError {
    /// Whether this error signals a routing contract violation by the caller.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ClientNotFound { .. } | Self::Workspace(_))
    }
}

/// Errors that can occur while running a custom command tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("No language client available: {0}")]
    NoClient(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Lsp(#[from] LspError),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_contract_violation() {
        let err = RegistryError::ClientNotFound {
            key: "file:///app/".to_string(),
        };
        assert!(err.is_contract_violation());

        let err = RegistryError::StartupFailed {
            key: "default".to_string(),
            message: "spawn failed".to_string(),
        };
        assert!(!err.is_contract_violation());

        let err: RegistryError =
            WorkspaceError::FolderNotInWorkspace("file:///gone/".to_string()).into();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let config_err: ConfigError = result.unwrap_err().into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RegistryError::StartupFailed {
            key: "file:///umbrella/".to_string(),
            message: "exited with status 1".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("file:///umbrella/"));
        assert!(display.contains("exited with status 1"));
    }
}
