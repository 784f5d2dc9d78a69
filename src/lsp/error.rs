// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for language client operations.

use thiserror::Error;

/// Errors raised by a language client.
#[derive(Error, Debug)]
pub enum LspError {
    /// The launcher could not be spawned or `initialize` failed.
    #[error("Failed to start language server: {0}")]
    StartupFailed(String),

    /// The client is not in the ready state.
    #[error("Language server not ready: {0}")]
    NotReady(String),

    /// The stdio channel to the server broke.
    #[error("Language server communication error: {0}")]
    CommunicationError(String),

    #[error("Language server request timed out after {0}ms")]
    Timeout(u64),

    /// The server answered with a JSON-RPC error.
    #[error("Language server error {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LspError {
    pub fn server_error(code: i32, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }
}

/// Result type for language client operations.
pub type LspResult<T> = std::result::Result<T, LspError>;

/// JSON-RPC error codes used when answering server requests.
pub mod error_codes {
    pub const METHOD_NOT_FOUND: i32 = -32601;
}
