// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Status indicator for the master file configuration.
//!
//! The indicator has no state of its own. Every trigger recomputes it from
//! the active document and the current settings.

use serde::Serialize;
use std::path::Path;

use crate::commands::CommandId;
use crate::document::ActiveDocument;

/// Hover text of the indicator.
pub const TOOLTIP: &str = "Click to change master file";

/// What the status indicator should show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatusState {
    /// The active document is not Jasmin, or there is none.
    Hidden,
    /// A Jasmin document is active but no master file is configured.
    NoMasterFile,
    /// A master file is configured.
    Configured {
        /// Base name of the master file setting.
        master: String,
        /// Number of configured namespaces.
        namespaces: usize,
    },
}

impl StatusState {
    /// Projects the current state onto the indicator. An empty master file
    /// setting counts as unset.
    #[must_use]
    pub fn derive(
        active: Option<&ActiveDocument>,
        master_file: Option<&str>,
        namespace_count: usize,
    ) -> Self {
        if !active.is_some_and(ActiveDocument::is_jasmin) {
            return Self::Hidden;
        }

        match master_file.filter(|raw| !raw.is_empty()) {
            None => Self::NoMasterFile,
            Some(master) => Self::Configured {
                master: base_name(master),
                namespaces: namespace_count,
            },
        }
    }

    /// Whether the indicator is shown at all.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }

    /// Label text, using the host's `$(icon)` syntax. `None` when hidden.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Hidden => None,
            Self::NoMasterFile => Some("$(warning) No Master File".to_string()),
            Self::Configured { master, namespaces } => Some(match namespaces {
                0 => format!("$(file) Master: {master}"),
                1 => format!("$(file) Master: {master} (+1 namespace)"),
                n => format!("$(file) Master: {master} (+{n} namespaces)"),
            }),
        }
    }

    /// Command the host runs when the indicator is clicked.
    #[must_use]
    pub const fn command(&self) -> Option<CommandId> {
        if self.is_visible() {
            Some(CommandId::SetMasterFile)
        } else {
            None
        }
    }
}

/// Last path segment of a settings value, accepting either separator.
fn base_name(raw: &str) -> String {
    let trimmed = raw.trim_end_matches(['/', '\\']);
    let name = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    if name.is_empty() {
        Path::new(raw)
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    } else {
        name.to_string()
    }
}
