// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Commands contributed to the host's command palette.

use std::fmt;
use std::str::FromStr;

/// Identifier of a palette command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// Pick the master file.
    SetMasterFile,
    /// Map a namespace to a folder.
    ConfigureNamespace,
    /// Show the configuration menu.
    ShowConfiguration,
}

impl CommandId {
    /// Every command, in registration order.
    pub const ALL: [Self; 3] = [
        Self::SetMasterFile,
        Self::ConfigureNamespace,
        Self::ShowConfiguration,
    ];

    /// Identifier registered with the host.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SetMasterFile => "jasmin.setMasterFile",
            Self::ConfigureNamespace => "jasmin.configureNamespace",
            Self::ShowConfiguration => "jasmin.showConfiguration",
        }
    }

    /// Human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::SetMasterFile => "Jasmin: Set Master File",
            Self::ConfigureNamespace => "Jasmin: Configure Namespace Path",
            Self::ShowConfiguration => "Jasmin: Show Configuration",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown command '{s}'"))
    }
}

/// A command invocation with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `jasmin.setMasterFile`
    SetMasterFile,
    /// `jasmin.configureNamespace`, optionally naming the namespace.
    ConfigureNamespace(Option<String>),
    /// `jasmin.showConfiguration`
    ShowConfiguration,
}

impl Command {
    /// The palette identifier of this invocation.
    #[must_use]
    pub const fn id(&self) -> CommandId {
        match self {
            Self::SetMasterFile => CommandId::SetMasterFile,
            Self::ConfigureNamespace(_) => CommandId::ConfigureNamespace,
            Self::ShowConfiguration => CommandId::ShowConfiguration,
        }
    }
}
