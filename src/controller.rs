// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Synchronization controller.
//!
//! Reacts to settings changes, editor focus changes and palette commands.
//! Each trigger resolves the configured paths, pushes them to the server and
//! republishes the status indicator. [`SyncController::run`] takes triggers
//! one at a time, so a pass always finishes before the next one starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::config::SettingKey;
use crate::document::{self, ActiveDocument};
use crate::error::ProtocolError;
use crate::host::{FilePick, Host, MessageLevel, QuickPickItem};
use crate::lsp::ext::NamespacePath;
use crate::lsp::{FileChange, ProtocolChannel};
use crate::resolve::{self, resolve};
use crate::status::StatusState;
use crate::store::{ChangeEvent, ConfigStore, Subscription};

/// Triggers queue depth before senders wait.
const TRIGGER_CAPACITY: usize = 32;

/// Label of the free-text entry in the namespace list.
const CUSTOM_NAMESPACE_LABEL: &str = "$(edit) Custom namespace...";

/// Something the controller reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A palette command was invoked.
    Command(Command),
    /// The focused document changed. `None` when no editor is focused.
    ActiveDocumentChanged(Option<ActiveDocument>),
    /// A watched file changed on disk.
    WatchedFileChanged(PathBuf, FileChange),
    /// The settings storage was edited outside this process.
    SettingsEdited,
    /// Stop the controller.
    Shutdown,
}

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed, nothing sent yet.
    Uninitialized,
    /// Initial state pushed; reacting to triggers.
    Active,
}

/// Owns the session, the settings and the status indicator for one
/// workspace.
pub struct SyncController {
    store: Arc<ConfigStore>,
    channel: ProtocolChannel,
    host: Arc<dyn Host>,
    active: Option<ActiveDocument>,
    phase: Phase,
    subscription: Option<Subscription>,
    synced: Synced,
}

/// Setting values as last sent to the server. `None` until first sent.
#[derive(Debug, Default)]
struct Synced {
    master_file: Option<Option<String>>,
    namespace_paths: Option<BTreeMap<String, String>>,
}

/// Sends triggers to a running controller.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Trigger>,
}

impl ControllerHandle {
    /// Queues a trigger. Returns false once the controller has stopped.
    pub async fn send(&self, trigger: Trigger) -> bool {
        self.tx.send(trigger).await.is_ok()
    }

    /// Queues a palette command.
    pub async fn execute(&self, command: Command) -> bool {
        self.send(Trigger::Command(command)).await
    }

    /// Reports a focus change.
    pub async fn active_document_changed(&self, document: Option<ActiveDocument>) -> bool {
        self.send(Trigger::ActiveDocumentChanged(document)).await
    }

    /// Reports that the settings storage was edited by someone else.
    pub async fn settings_edited(&self) -> bool {
        self.send(Trigger::SettingsEdited).await
    }

    /// Reports an on-disk change of a watched file.
    pub async fn watched_file_changed(&self, path: PathBuf, change: FileChange) -> bool {
        self.send(Trigger::WatchedFileChanged(path, change)).await
    }

    /// Asks the controller to stop after the queued triggers.
    pub async fn shutdown(&self) -> bool {
        self.send(Trigger::Shutdown).await
    }
}

/// Where a namespace entry in the configuration menu leads.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MenuEntry {
    MasterFile,
    Namespace(String),
    CustomNamespace,
}

impl SyncController {
    /// Creates a controller. Nothing is sent until [`Self::activate`].
    #[must_use]
    pub fn new(store: Arc<ConfigStore>, channel: ProtocolChannel, host: Arc<dyn Host>) -> Self {
        Self {
            store,
            channel,
            host,
            active: None,
            phase: Phase::Uninitialized,
            subscription: None,
            synced: Synced::default(),
        }
    }

    /// Sets the document focused at startup.
    #[must_use]
    pub fn with_active_document(mut self, document: Option<ActiveDocument>) -> Self {
        self.active = document;
        self
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The settings this controller synchronizes.
    #[must_use]
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Pushes the persisted state to the server and starts listening for
    /// settings changes.
    pub async fn activate(&mut self) {
        if self.phase == Phase::Active {
            return;
        }

        self.subscription = Some(self.store.subscribe(&SettingKey::ALL));

        self.push_master_file().await;
        if !self.store.namespace_paths().is_empty() {
            self.push_namespace_paths().await;
        }
        self.refresh_status();

        self.phase = Phase::Active;
        info!(
            "Jasmin bridge active (server {})",
            if self.channel.is_connected() {
                "connected"
            } else {
                "not connected"
            }
        );
    }

    /// Releases the settings subscription and hides the indicator.
    pub fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
        self.phase = Phase::Uninitialized;
        self.host.set_status(&StatusState::Hidden);
        info!("Jasmin bridge stopped");
    }

    /// Spawns [`Self::run`] on the runtime and returns a handle to it.
    #[must_use]
    pub fn spawn(self) -> (ControllerHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);
        let task = tokio::spawn(self.run(rx));
        (ControllerHandle { tx }, task)
    }

    /// Activates, then handles triggers and settings changes one at a time
    /// until [`Trigger::Shutdown`] arrives or every handle is dropped.
    pub async fn run(mut self, mut triggers: mpsc::Receiver<Trigger>) {
        self.activate().await;

        let mut changes = self.subscription.take();
        loop {
            // Changes raised by the previous trigger go before the next one
            tokio::select! {
                biased;
                Some(event) = next_change(&mut changes) => self.on_settings_change(event).await,
                trigger = triggers.recv() => match trigger {
                    None | Some(Trigger::Shutdown) => break,
                    Some(trigger) => self.handle(trigger).await,
                },
            }
        }

        self.subscription = changes;
        self.shutdown();
    }

    /// Handles one trigger to completion.
    pub async fn handle(&mut self, trigger: Trigger) {
        debug!("Handling {:?}", trigger);
        match trigger {
            Trigger::Command(command) => self.execute(command).await,
            Trigger::ActiveDocumentChanged(document) => self.on_active_document_changed(document),
            Trigger::WatchedFileChanged(path, change) => {
                self.on_watched_file_changed(&path, change).await;
            }
            Trigger::SettingsEdited => {
                match self.store.reload() {
                    Ok(changed) => debug!("Settings reloaded, changed: {:?}", changed),
                    Err(e) => {
                        warn!("Failed to reload settings: {}", e);
                        self.host.show_message(
                            MessageLevel::Warning,
                            &format!("Failed to reload Jasmin settings: {e}"),
                        );
                    }
                }
                self.process_pending_changes().await;
            }
            Trigger::Shutdown => self.shutdown(),
        }
    }

    /// Runs a palette command.
    pub async fn execute(&mut self, command: Command) {
        match command {
            Command::SetMasterFile => self.set_master_file().await,
            Command::ConfigureNamespace(name) => self.configure_namespace(name).await,
            Command::ShowConfiguration => self.show_configuration().await,
        }
    }

    /// Handles settings changes that were already delivered to this
    /// controller's subscription.
    ///
    /// While [`Self::run`] is driving the controller the subscription is
    /// polled by the run loop instead, and this does nothing.
    pub async fn process_pending_changes(&mut self) {
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_next) {
            self.on_settings_change(event).await;
        }
    }

    async fn on_settings_change(&mut self, event: ChangeEvent) {
        let in_sync = match event.key {
            SettingKey::MasterFile => {
                self.synced.master_file.as_ref() == Some(&self.store.master_file())
            }
            SettingKey::NamespacePaths => {
                self.synced.namespace_paths.as_ref() == Some(&self.store.namespace_paths())
            }
            SettingKey::ServerPath | SettingKey::ServerArgs => false,
        };
        if in_sync {
            debug!("{} already sent to the server ({:?} write)", event.key, event.origin);
            self.refresh_status();
            return;
        }

        match event.key {
            SettingKey::MasterFile => self.on_master_file_changed().await,
            SettingKey::NamespacePaths => self.on_namespace_paths_changed().await,
            SettingKey::ServerPath | SettingKey::ServerArgs => {
                info!("{} changed; restart the language server to apply it", event.key);
            }
        }
    }

    /// The master file setting changed: push it, re-query the required
    /// namespaces and push the namespace map.
    pub async fn on_master_file_changed(&mut self) {
        info!("Master file changed to {:?}", self.store.master_file());
        self.push_master_file().await;

        let required = self.required_namespaces().await;
        let configured = self.store.namespace_paths();
        let missing: Vec<&str> = required
            .iter()
            .filter(|name| !configured.contains_key(*name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            info!("Unconfigured required namespaces: {:?}", missing);
            self.host.show_message(
                MessageLevel::Info,
                &format!(
                    "The master file uses namespaces without a configured path: {}",
                    missing.join(", ")
                ),
            );
        }

        self.push_namespace_paths().await;
        self.refresh_status();
    }

    /// The namespace map changed: push the resolved map.
    pub async fn on_namespace_paths_changed(&mut self) {
        debug!("Namespace paths changed");
        self.push_namespace_paths().await;
        self.refresh_status();
    }

    /// Focus moved to another document, or away from every document.
    pub fn on_active_document_changed(&mut self, document: Option<ActiveDocument>) {
        self.active = document;
        self.refresh_status();
    }

    /// Forwards a change of a watched Jasmin file to the server.
    pub async fn on_watched_file_changed(&self, path: &Path, change: FileChange) {
        if !document::is_jasmin_path(path) {
            return;
        }
        if let Err(e) = self.channel.did_change_watched_file(path, change).await {
            warn!("Failed to forward change of {}: {}", path.display(), e);
        }
    }

    /// `jasmin.setMasterFile`
    pub async fn set_master_file(&mut self) {
        let Some(root) = self.require_workspace() else {
            return;
        };

        let pick = FilePick {
            title: "Select Master Jasmin File".to_string(),
            filter_name: "Jasmin Files".to_string(),
            extensions: vec![document::PROGRAM_EXTENSION.to_string()],
            default_dir: Some(root.clone()),
        };
        let Some(file) = self.host.pick_file(pick).await else {
            debug!("Master file selection cancelled");
            return;
        };

        let relative = resolve::workspace_relative(&file, &root);
        if let Err(e) = self.store.set_master_file(Some(relative)) {
            warn!("Failed to save master file: {}", e);
            self.host
                .show_message(MessageLevel::Error, &format!("Failed to save master file: {e}"));
            return;
        }

        self.on_master_file_changed().await;

        let name = file
            .file_name()
            .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
        self.host
            .show_message(MessageLevel::Info, &format!("Master file set to: {name}"));
    }

    /// `jasmin.configureNamespace`
    pub async fn configure_namespace(&mut self, name: Option<String>) {
        let Some(root) = self.require_workspace() else {
            return;
        };

        let name = match name {
            Some(name) => name,
            None => match self.choose_namespace_name().await {
                Some(name) => name,
                None => return,
            },
        };

        let name = name.trim();
        if name.is_empty() {
            debug!("Empty namespace name, nothing to configure");
            return;
        }

        let Some(folder) = self
            .host
            .pick_folder(&format!("Select folder for namespace '{name}'"), Some(root.as_path()))
            .await
        else {
            debug!("Folder selection for {} cancelled", name);
            return;
        };

        let relative = resolve::workspace_relative(&folder, &root);
        if let Err(e) = self.store.upsert_namespace(name, &relative) {
            warn!("Failed to save namespace path: {}", e);
            self.host.show_message(
                MessageLevel::Error,
                &format!("Failed to save namespace path: {e}"),
            );
            return;
        }

        self.on_namespace_paths_changed().await;
        self.host.show_message(
            MessageLevel::Info,
            &format!("Namespace '{name}' mapped to {relative}"),
        );
    }

    /// `jasmin.showConfiguration`
    pub async fn show_configuration(&mut self) {
        let settings = self.store.settings();
        let required = self.required_namespaces().await;
        let root = self.host.workspace_root();

        let mut items = Vec::new();
        let mut entries = Vec::new();

        let mut master = QuickPickItem::new("$(file) Master File")
            .description(settings.active_master_file().unwrap_or("Not set"));
        if let (Some(raw), Some(root)) = (settings.active_master_file(), &root) {
            master = master.detail(resolve(raw, root).display().to_string());
        }
        items.push(master);
        entries.push(MenuEntry::MasterFile);

        for name in &required {
            let item = match settings.namespace_paths.get(name) {
                Some(path) => QuickPickItem::new(format!("$(check) {name}")).description(path),
                None => QuickPickItem::new(format!("$(circle-slash) {name}"))
                    .description("Not configured"),
            };
            items.push(item);
            entries.push(MenuEntry::Namespace(name.clone()));
        }

        for (name, path) in &settings.namespace_paths {
            if !required.contains(name) {
                items.push(QuickPickItem::new(format!("$(folder) {name}")).description(path));
                entries.push(MenuEntry::Namespace(name.clone()));
            }
        }

        items.push(QuickPickItem::new("$(add) Configure custom namespace..."));
        entries.push(MenuEntry::CustomNamespace);

        let Some(index) = self
            .host
            .quick_pick("Jasmin Configuration", &items)
            .await
        else {
            return;
        };

        match entries.get(index) {
            Some(MenuEntry::MasterFile) => self.set_master_file().await,
            Some(MenuEntry::Namespace(name)) => {
                self.configure_namespace(Some(name.clone())).await;
            }
            Some(MenuEntry::CustomNamespace) => {
                if self.require_workspace().is_none() {
                    return;
                }
                if let Some(name) = self.prompt_namespace_name().await {
                    self.configure_namespace(Some(name)).await;
                }
            }
            None => warn!("Menu selection {} out of range", index),
        }
    }

    /// The current status indicator state.
    #[must_use]
    pub fn status(&self) -> StatusState {
        StatusState::derive(
            self.active.as_ref(),
            self.store.master_file().as_deref(),
            self.store.namespace_paths().len(),
        )
    }

    fn refresh_status(&self) -> StatusState {
        let status = self.status();
        self.host.set_status(&status);
        status
    }

    fn require_workspace(&self) -> Option<PathBuf> {
        let root = self.host.workspace_root();
        if root.is_none() {
            self.host
                .show_message(MessageLevel::Error, "No workspace folder open");
        }
        root
    }

    async fn choose_namespace_name(&self) -> Option<String> {
        let required = self.required_namespaces().await;
        if required.is_empty() {
            return self.prompt_namespace_name().await;
        }

        let configured = self.store.namespace_paths();
        let mut items: Vec<QuickPickItem> = required
            .iter()
            .map(|name| {
                QuickPickItem::new(name.as_str()).description(
                    configured
                        .get(name)
                        .map_or_else(|| "Not configured".to_string(), Clone::clone),
                )
            })
            .collect();
        items.push(QuickPickItem::new(CUSTOM_NAMESPACE_LABEL));

        let index = self
            .host
            .quick_pick("Select namespace to configure", &items)
            .await?;

        match required.get(index) {
            Some(name) => Some(name.clone()),
            None => self.prompt_namespace_name().await,
        }
    }

    async fn prompt_namespace_name(&self) -> Option<String> {
        self.host
            .input("Namespace name", "e.g. Common, Crypto")
            .await
    }

    /// Asks the server for the namespaces the master file needs.
    ///
    /// Failures degrade to an empty list. A response is dropped if the
    /// master file changed while it was in flight.
    async fn required_namespaces(&self) -> Vec<String> {
        let issued_for = self.store.master_file();

        let namespaces = match self.channel.required_namespaces().await {
            Ok(namespaces) => namespaces,
            Err(e) => {
                self.report_failure("get required namespaces", &e);
                return Vec::new();
            }
        };

        if self.store.master_file() != issued_for {
            debug!(
                "Discarding required namespaces computed for {:?}",
                issued_for
            );
            return Vec::new();
        }
        namespaces
    }

    async fn push_master_file(&mut self) {
        let settings = self.store.settings();
        self.synced.master_file = Some(settings.master_file.clone());

        let (Some(raw), Some(root)) = (settings.active_master_file(), self.host.workspace_root())
        else {
            debug!("No master file or workspace, nothing to send");
            return;
        };

        let resolved = resolve(raw, &root);
        let Some(uri) = resolve::file_uri(&resolved) else {
            warn!("Master file {} has no file URI", resolved.display());
            return;
        };

        match self.channel.set_master_file(&uri).await {
            Ok(()) => debug!("Master file set to: {}", uri),
            Err(e) => self.report_failure("set master file", &e),
        }
    }

    async fn push_namespace_paths(&mut self) {
        let configured = self.store.namespace_paths();
        self.synced.namespace_paths = Some(configured.clone());

        let Some(root) = self.host.workspace_root() else {
            debug!("No workspace, namespace paths not sent");
            return;
        };

        let paths = resolve_namespaces(&configured, &root);
        let count = paths.len();
        match self.channel.set_namespace_paths(paths).await {
            Ok(()) => debug!("Sent {} namespace path(s)", count),
            Err(e) => self.report_failure("set namespace paths", &e),
        }
    }

    fn report_failure(&self, action: &str, error: &ProtocolError) {
        warn!("Failed to {}: {}", action, error);
        self.host
            .show_message(MessageLevel::Warning, &format!("Failed to {action}: {error}"));
    }
}

/// Resolves every namespace entry against the workspace root.
///
/// Entries with a blank name are skipped.
#[must_use]
pub fn resolve_namespaces(map: &BTreeMap<String, String>, root: &Path) -> Vec<NamespacePath> {
    map.iter()
        .filter(|(name, _)| {
            let keep = !name.trim().is_empty();
            if !keep {
                warn!("Ignoring namespace entry with an empty name");
            }
            keep
        })
        .map(|(name, raw)| NamespacePath {
            namespace: name.clone(),
            path: resolve(raw, root).to_string_lossy().into_owned(),
        })
        .collect()
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
