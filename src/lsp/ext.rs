// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! `jasmin/*` protocol extensions.
//!
//! Message shapes are typed through the `lsp_types` notification and
//! request traits so the wire method and payload cannot drift apart.

use lsp_types::notification::Notification;
use lsp_types::request::Request;
use serde::{Deserialize, Serialize};

/// Tells the server which file is the compilation entry point.
#[derive(Debug)]
pub enum SetMasterFile {}

impl Notification for SetMasterFile {
    type Params = SetMasterFileParams;
    const METHOD: &'static str = "jasmin/setMasterFile";
}

/// Payload of [`SetMasterFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMasterFileParams {
    /// `file://` URI of the resolved master file.
    pub uri: String,
}

/// Tells the server where each namespace lives on disk.
#[derive(Debug)]
pub enum SetNamespacePaths {}

impl Notification for SetNamespacePaths {
    type Params = SetNamespacePathsParams;
    const METHOD: &'static str = "jasmin/setNamespacePaths";
}

/// Payload of [`SetNamespacePaths`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNamespacePathsParams {
    /// One entry per configured namespace.
    pub paths: Vec<NamespacePath>,
}

/// A namespace and its resolved directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePath {
    /// Namespace name.
    pub namespace: String,
    /// Absolute filesystem path (not a URI).
    pub path: String,
}

/// Asks the server which namespaces the master file's dependency graph
/// references.
#[derive(Debug)]
pub enum GetRequiredNamespaces {}

impl Request for GetRequiredNamespaces {
    type Params = GetRequiredNamespacesParams;
    type Result = Option<RequiredNamespaces>;
    const METHOD: &'static str = "jasmin/getRequiredNamespaces";
}

/// Empty payload of [`GetRequiredNamespaces`]; serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequiredNamespacesParams {}

/// Response of [`GetRequiredNamespaces`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredNamespaces {
    /// Namespace names in the order the server reports them.
    #[serde(default)]
    pub namespaces: Vec<String>,
}
