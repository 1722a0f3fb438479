// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Error types shared across the bridge.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single exchange with the language server.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The server process went away before the exchange completed.
    #[error("language server connection closed")]
    Closed,

    /// No response arrived within the request timeout.
    #[error("request '{method}' timed out after {timeout:?}")]
    Timeout {
        /// Method of the request that timed out.
        method: String,
        /// How long the client waited.
        timeout: Duration,
    },

    /// The server answered with a JSON-RPC error.
    #[error("server rejected '{method}' ({code}): {message}")]
    Rejected {
        /// Method of the rejected request.
        method: String,
        /// JSON-RPC error code.
        code: i64,
        /// Error message supplied by the server.
        message: String,
    },

    /// Writing to or reading from the server's pipes failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A payload could not be encoded or decoded.
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Failure to read or persist workspace settings.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The settings file could not be read or written.
    #[error("failed to access settings file {path}: {source}")]
    Io {
        /// The settings file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid JSON, or a known key has the wrong
    /// shape.
    #[error("invalid settings in {path}: {source}")]
    Parse {
        /// The settings file.
        path: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// The settings could not be encoded for writing.
    #[error("failed to encode settings for {path}: {source}")]
    Encode {
        /// The settings file.
        path: PathBuf,
        /// Underlying encode error.
        source: serde_json::Error,
    },

    /// The settings file holds something other than a JSON object.
    #[error("settings file {0} does not contain a JSON object")]
    NotAnObject(PathBuf),
}
