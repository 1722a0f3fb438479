// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Path arithmetic for settings values.
//!
//! Settings hold paths relative to the workspace root, optionally with a
//! `${workspaceFolder}` placeholder. Everything here is string and path
//! manipulation only; nothing touches the filesystem, so a resolved path may
//! point at nothing.

use std::path::{Component, Path, PathBuf};
use url::Url;

/// Placeholder replaced by the workspace root.
pub const WORKSPACE_FOLDER_VAR: &str = "${workspaceFolder}";

/// Resolves a settings path against the workspace root.
///
/// The first `${workspaceFolder}` is substituted with `workspace_root`. A
/// result that is already absolute is returned unchanged; anything else is
/// joined onto the root and lexically normalized.
#[must_use]
pub fn resolve(raw: &str, workspace_root: &Path) -> PathBuf {
    let substituted = raw.replacen(WORKSPACE_FOLDER_VAR, &workspace_root.to_string_lossy(), 1);
    let candidate = PathBuf::from(substituted);

    if candidate.is_absolute() {
        return candidate;
    }

    normalize(&workspace_root.join(candidate))
}

/// Removes `.` and `..` segments without consulting the filesystem.
///
/// `..` above the root is dropped, matching how `path.resolve` treats it.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                out.push(component.as_os_str());
                depth = 0;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(segment) => {
                out.push(segment);
                depth += 1;
            }
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Returns the form of `path` that commands persist into settings.
///
/// Paths inside the workspace become forward-slash relative paths; paths
/// outside it are kept absolute.
#[must_use]
pub fn workspace_relative(path: &Path, workspace_root: &Path) -> String {
    let path = normalize(path);
    let root = normalize(workspace_root);

    match path.strip_prefix(&root) {
        Ok(rest) if rest.as_os_str().is_empty() => ".".to_string(),
        Ok(rest) => rest
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

/// Converts an absolute path into a `file://` URI.
///
/// Returns `None` for relative paths, which have no URI form.
#[must_use]
pub fn file_uri(path: &Path) -> Option<Url> {
    Url::from_file_path(path).ok()
}
