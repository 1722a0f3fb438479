// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Jasmin file associations and the editor's active document.

use std::path::{Path, PathBuf};

/// Language identifier the host assigns to Jasmin documents.
pub const LANGUAGE_ID: &str = "jasmin";

/// Extension of program files, including master files.
pub const PROGRAM_EXTENSION: &str = "jazz";

/// Extension of include files.
pub const INCLUDE_EXTENSION: &str = "jinc";

/// Glob the host watches so external edits reach the server.
pub const WATCH_GLOB: &str = "**/*.{jazz,jinc}";

/// The document focused in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    /// Location of the document on disk.
    pub path: PathBuf,
    /// Language the host assigned, if it assigned one.
    pub language_id: Option<String>,
}

impl ActiveDocument {
    /// A document the host classified only by its path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            language_id: None,
        }
    }

    /// A document with an explicit host language id.
    pub fn with_language(path: impl Into<PathBuf>, language_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language_id: Some(language_id.into()),
        }
    }

    /// True when the document is Jasmin, by declared language or extension.
    #[must_use]
    pub fn is_jasmin(&self) -> bool {
        self.language_id.as_deref() == Some(LANGUAGE_ID) || is_jasmin_path(&self.path)
    }
}

/// True for `.jazz` and `.jinc` files.
#[must_use]
pub fn is_jasmin_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(PROGRAM_EXTENSION | INCLUDE_EXTENSION)
    )
}
