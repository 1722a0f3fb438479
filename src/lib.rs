// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Jasmin Bridge keeps a Jasmin language server in sync with workspace
//! settings.
//!
//! It persists the master file and namespace folders per workspace, pushes
//! them to the server over `jasmin/*` protocol extensions, and derives the
//! status indicator shown while a Jasmin file is focused.

/// Palette command identifiers.
pub mod commands;
/// Launch and workspace settings.
pub mod config;
/// Reacts to settings, focus and command triggers.
pub mod controller;
/// Jasmin file classification.
pub mod document;
/// Error types shared across modules.
pub mod error;
/// Interactive surface: pickers, messages and the status indicator.
pub mod host;
/// LSP client and the `jasmin/*` extensions.
pub mod lsp;
/// `${workspaceFolder}` substitution and path normalization.
pub mod resolve;
/// Status indicator projection.
pub mod status;
/// Persistent workspace settings with change events.
pub mod store;
