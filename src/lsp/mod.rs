// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Typed channel for the `jasmin/*` messages.
pub mod channel;
/// Low-level LSP client for communicating with a server process.
pub mod client;
/// `jasmin/*` notification and request definitions.
pub mod ext;
/// LSP message protocol definitions.
pub mod protocol;

pub use channel::{FileChange, ProtocolChannel, ServerSession};
pub use client::{LspClient, REQUEST_TIMEOUT};
