/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::BytesMut;
use lsp_types::{
    ClientCapabilities, ClientInfo, DidChangeWatchedFilesClientCapabilities, InitializeParams,
    InitializeResult, InitializedParams, MessageType, ShowMessageParams, Uri,
    WorkspaceClientCapabilities, WorkspaceFolder,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::channel::ServerSession;
use super::protocol::{self, NotificationMessage, RequestId, RequestMessage, ResponseMessage};
use crate::config::LaunchConfig;
use crate::error::ProtocolError;

/// Default timeout for LSP requests.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>>;

/// Manages communication with the Jasmin language server process.
pub struct LspClient {
    next_id: AtomicI64,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    timeout: Duration,
    _reader_handle: tokio::task::JoinHandle<()>,
    _child: Child,
}

impl LspClient {
    /// Spawns the server described by `launch` and starts the reader task.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn spawn(launch: &LaunchConfig) -> Result<Self> {
        let args: Vec<&str> = launch.args.iter().map(String::as_str).collect();
        Self::spawn_command(&launch.path, &args)
    }

    /// Spawns `program` with `args` and starts the reader task.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub fn spawn_command(program: &str, args: &[&str]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn Jasmin language server: {program}"))?;

        let stdin = child.stdin.take().context("stdin not captured")?;
        let stdout = child.stdout.take().context("stdout not captured")?;

        let stdin = Arc::new(Mutex::new(stdin));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader_handle = tokio::spawn(Self::reader_task(
            stdin.clone(),
            stdout,
            pending.clone(),
            alive.clone(),
        ));

        info!("Spawned Jasmin language server: {} {}", program, args.join(" "));

        Ok(Self {
            next_id: AtomicI64::new(1),
            stdin,
            pending,
            alive,
            timeout: REQUEST_TIMEOUT,
            _reader_handle: reader_handle,
            _child: child,
        })
    }

    /// Overrides the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Background task that reads LSP messages and routes responses to pending requests.
    async fn reader_task(
        stdin: Arc<Mutex<ChildStdin>>,
        stdout: ChildStdout,
        pending: PendingMap,
        alive: Arc<AtomicBool>,
    ) {
        let mut reader = BufReader::new(stdout);
        let mut buffer = BytesMut::with_capacity(8192);

        loop {
            let mut temp = [0u8; 4096];
            match reader.read(&mut temp).await {
                Ok(0) => {
                    debug!("LSP stdout closed");
                    break;
                }
                Ok(n) => {
                    buffer.extend_from_slice(&temp[..n]);
                }
                Err(e) => {
                    error!("Error reading from LSP stdout: {}", e);
                    break;
                }
            }

            loop {
                let message_str = match protocol::try_parse_message(&mut buffer) {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Discarding unparseable LSP input: {}", e);
                        buffer.clear();
                        break;
                    }
                };
                trace!("Received LSP message: {}", message_str);

                let value: Value = match serde_json::from_str(&message_str) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("Failed to parse JSON: {}", e);
                        continue;
                    }
                };

                if let Some(method) = value.get("method").and_then(Value::as_str) {
                    if let Some(id) = value.get("id") {
                        let id = serde_json::from_value(id.clone()).unwrap_or(RequestId::Number(0));
                        Self::answer_server_request(&stdin, id, method).await;
                    } else if let Ok(notification) =
                        serde_json::from_value::<NotificationMessage>(value)
                    {
                        Self::handle_notification(&notification);
                    }
                } else if value.get("id").is_some() {
                    if let Ok(response) = serde_json::from_value::<ResponseMessage>(value)
                        && let Some(id) = &response.id
                    {
                        let mut pending = pending.lock().await;
                        if let Some(sender) = pending.remove(id) {
                            let _ = sender.send(response);
                        } else {
                            warn!("Received response for unknown request id: {:?}", id);
                        }
                    }
                } else {
                    warn!("Unknown message format: {}", message_str);
                }
            }
        }

        alive.store(false, Ordering::SeqCst);
        // Dropping the senders wakes every waiter with a closed channel
        pending.lock().await.clear();
        warn!("LSP reader task exiting - server connection lost");
    }

    /// Replies to a server-to-client request.
    async fn answer_server_request(stdin: &Arc<Mutex<ChildStdin>>, id: RequestId, method: &str) {
        debug!("Received server request: {} (id: {:?})", method, id);

        let response = if method == "window/workDoneProgress/create" {
            ResponseMessage {
                jsonrpc: protocol::JSONRPC_VERSION.to_string(),
                id: Some(id),
                result: Some(Value::Null),
                error: None,
            }
        } else {
            ResponseMessage::method_not_found(id, method)
        };

        match protocol::encode_message(&response) {
            Ok(bytes) => {
                let mut stdin = stdin.lock().await;
                if let Err(e) = stdin.write_all(&bytes).await {
                    warn!("Failed to write response: {}", e);
                } else if let Err(e) = stdin.flush().await {
                    warn!("Failed to flush response: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode response: {}", e),
        }
    }

    /// Handles incoming LSP notifications.
    fn handle_notification(notification: &NotificationMessage) {
        match notification.method.as_str() {
            "window/logMessage" | "window/showMessage" => {
                let Ok(params) =
                    serde_json::from_value::<ShowMessageParams>(notification.params.clone())
                else {
                    warn!("Malformed {} params", notification.method);
                    return;
                };
                match params.typ {
                    MessageType::ERROR => error!("jasmin-lsp: {}", params.message),
                    MessageType::WARNING => warn!("jasmin-lsp: {}", params.message),
                    MessageType::INFO => info!("jasmin-lsp: {}", params.message),
                    _ => debug!("jasmin-lsp: {}", params.message),
                }
            }
            _ => {
                trace!(
                    "Ignoring notification: {} params={}",
                    notification.method, notification.params
                );
            }
        }
    }

    /// Sends a request and waits for the raw result with timeout.
    async fn request_value(&self, method: &str, params: Value) -> Result<Value, ProtocolError> {
        if !self.is_alive() {
            return Err(ProtocolError::Closed);
        }

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = RequestMessage::new(id.clone(), method, params);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.send_message(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(ProtocolError::Closed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(ProtocolError::Timeout {
                    method: method.to_string(),
                    timeout: self.timeout,
                });
            }
        };

        if let Some(error) = response.error {
            return Err(ProtocolError::Rejected {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Sends a typed request.
    async fn request<R: lsp_types::request::Request>(&self, params: R::Params) -> Result<R::Result> {
        let params = serde_json::to_value(params)?;
        let result = self.request_value(R::METHOD, params).await?;
        serde_json::from_value(result).context("Failed to parse LSP response")
    }

    /// Sends a typed notification.
    async fn notify<N: lsp_types::notification::Notification>(&self, params: N::Params) -> Result<()> {
        let notification = NotificationMessage::new(N::METHOD, serde_json::to_value(params)?);
        self.send_message(&notification).await?;
        Ok(())
    }

    /// Sends a JSON-RPC message with Content-Length header.
    async fn send_message<T: serde::Serialize>(&self, message: &T) -> Result<(), ProtocolError> {
        let bytes = protocol::encode_message(message)?;
        trace!("Sending LSP message: {}", String::from_utf8_lossy(&bytes));

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(&bytes).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Performs the LSP initialize handshake.
    ///
    /// `initialization_options` carries the workspace settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the root has no URI form or the handshake fails.
    pub async fn initialize(
        &self,
        root: &Path,
        initialization_options: Option<Value>,
    ) -> Result<InitializeResult> {
        let root_uri: Uri = Url::from_directory_path(root)
            .map_err(|()| anyhow!("Workspace root is not absolute: {}", root.display()))?
            .as_str()
            .parse()
            .map_err(|e| anyhow!("Invalid root path {:?}: {}", root, e))?;

        let params = InitializeParams {
            process_id: Some(std::process::id()),
            client_info: Some(ClientInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ClientCapabilities {
                workspace: Some(WorkspaceClientCapabilities {
                    did_change_watched_files: Some(DidChangeWatchedFilesClientCapabilities {
                        dynamic_registration: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root_uri,
                name: root
                    .file_name()
                    .map_or_else(|| "workspace".to_string(), |s| s.to_string_lossy().to_string()),
            }]),
            initialization_options,
            ..Default::default()
        };

        let result = self
            .request::<lsp_types::request::Initialize>(params)
            .await
            .context("initialize handshake failed")?;

        if let Some(info) = &result.server_info {
            info!(
                "Connected to {} {}",
                info.name,
                info.version.as_deref().unwrap_or("")
            );
        }

        self.notify::<lsp_types::notification::Initialized>(InitializedParams {})
            .await?;

        Ok(result)
    }

    /// Sends shutdown request and exit notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the server does not acknowledge the shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        // shutdown response varies by server (null, true, etc.) - ignore result
        self.request_value("shutdown", Value::Null).await?;
        self.notify::<lsp_types::notification::Exit>(()).await?;
        Ok(())
    }

    /// Returns true if the LSP server connection is still alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerSession for LspClient {
    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ProtocolError> {
        if !self.is_alive() {
            return Err(ProtocolError::Closed);
        }
        self.send_message(&NotificationMessage::new(method, params))
            .await
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ProtocolError> {
        self.request_value(method, params).await
    }

    fn is_alive(&self) -> bool {
        Self::is_alive(self)
    }
}
