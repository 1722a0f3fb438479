// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Typed send/await wrappers over the server session.
//!
//! The channel holds no state besides the session handle. Without a live
//! session every operation succeeds as a no-op.

use async_trait::async_trait;
use lsp_types::notification::{DidChangeWatchedFiles, Notification};
use lsp_types::request::Request;
use lsp_types::{DidChangeWatchedFilesParams, FileChangeType, FileEvent, Uri};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use url::Url;

use super::ext::{
    GetRequiredNamespaces, GetRequiredNamespacesParams, NamespacePath, SetMasterFile,
    SetMasterFileParams, SetNamespacePaths, SetNamespacePathsParams,
};
use crate::error::ProtocolError;

/// How a watched file changed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChange {
    /// The file was created.
    Created,
    /// The file's content changed.
    Changed,
    /// The file was deleted.
    Deleted,
}

impl From<FileChange> for FileChangeType {
    fn from(change: FileChange) -> Self {
        match change {
            FileChange::Created => Self::CREATED,
            FileChange::Changed => Self::CHANGED,
            FileChange::Deleted => Self::DELETED,
        }
    }
}

/// A connection to the language server that can carry JSON-RPC traffic.
///
/// Implementations must deliver messages in the order the calls are made.
#[async_trait]
pub trait ServerSession: Send + Sync {
    /// Sends a notification.
    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ProtocolError>;

    /// Sends a request and waits, bounded, for its result.
    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ProtocolError>;

    /// Whether the server is still reachable.
    fn is_alive(&self) -> bool;
}

/// Sends the `jasmin/*` messages over an optional session.
#[derive(Clone, Default)]
pub struct ProtocolChannel {
    session: Option<Arc<dyn ServerSession>>,
}

impl ProtocolChannel {
    /// A channel over `session`.
    #[must_use]
    pub fn new(session: Arc<dyn ServerSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// A channel with no session; every operation is a no-op.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Whether a live session is attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.live().is_some()
    }

    fn live(&self) -> Option<&Arc<dyn ServerSession>> {
        self.session.as_ref().filter(|s| s.is_alive())
    }

    /// Sends a typed notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is live but the send fails.
    pub async fn notify<N: Notification>(&self, params: N::Params) -> Result<(), ProtocolError> {
        let Some(session) = self.live() else {
            trace!("No live session, dropping {}", N::METHOD);
            return Ok(());
        };

        let params = serde_json::to_value(params)?;
        debug!("-> {} {}", N::METHOD, params);
        session.send_notification(N::METHOD, params).await
    }

    /// Sends a typed request. Returns `None` when no session is live.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, is rejected, times out, or the
    /// result does not decode.
    pub async fn request<R: Request>(
        &self,
        params: R::Params,
    ) -> Result<Option<R::Result>, ProtocolError> {
        let Some(session) = self.live() else {
            trace!("No live session, skipping {}", R::METHOD);
            return Ok(None);
        };

        let params = serde_json::to_value(params)?;
        debug!("-> {} {}", R::METHOD, params);
        let result = session.send_request(R::METHOD, params).await?;
        debug!("<- {} {}", R::METHOD, result);
        Ok(Some(serde_json::from_value(result)?))
    }

    /// Sends `jasmin/setMasterFile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn set_master_file(&self, uri: &Url) -> Result<(), ProtocolError> {
        self.notify::<SetMasterFile>(SetMasterFileParams {
            uri: uri.to_string(),
        })
        .await
    }

    /// Sends `jasmin/setNamespacePaths`.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn set_namespace_paths(&self, paths: Vec<NamespacePath>) -> Result<(), ProtocolError> {
        self.notify::<SetNamespacePaths>(SetNamespacePathsParams { paths })
            .await
    }

    /// Sends `jasmin/getRequiredNamespaces`.
    ///
    /// A `null` result and a missing session both yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn required_namespaces(&self) -> Result<Vec<String>, ProtocolError> {
        let result = self
            .request::<GetRequiredNamespaces>(GetRequiredNamespacesParams::default())
            .await?;
        Ok(result.flatten().map(|r| r.namespaces).unwrap_or_default())
    }

    /// Forwards an on-disk change of a watched file as
    /// `workspace/didChangeWatchedFiles`.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails. Relative paths are skipped.
    pub async fn did_change_watched_file(
        &self,
        path: &Path,
        change: FileChange,
    ) -> Result<(), ProtocolError> {
        let Some(uri) = Url::from_file_path(path)
            .ok()
            .and_then(|url| url.as_str().parse::<Uri>().ok())
        else {
            warn!("Cannot forward change of {}: not an absolute path", path.display());
            return Ok(());
        };

        self.notify::<DidChangeWatchedFiles>(DidChangeWatchedFilesParams {
            changes: vec![FileEvent::new(uri, change.into())],
        })
        .await
    }
}
