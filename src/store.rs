// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Workspace settings storage and change notification.
//!
//! [`ConfigStore`] owns the in-memory copy of [`Settings`] and persists every
//! write through a [`SettingsBackend`]. Each write replaces exactly one key,
//! and subscribers only hear about the keys they asked for.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::{SettingKey, Settings};
use crate::error::StoreError;

/// Buffered change events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Where a settings change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written through this store.
    Local,
    /// Picked up by [`ConfigStore::reload`] after someone else edited the
    /// backing storage.
    External,
}

/// A single setting changed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The setting that changed.
    pub key: SettingKey,
    /// Who changed it.
    pub origin: ChangeOrigin,
}

/// Persistent storage for workspace settings.
pub trait SettingsBackend: Send + Sync {
    /// Reads all settings. Missing storage reads as defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage exists but cannot be read or decoded.
    fn load(&self) -> Result<Settings, StoreError>;

    /// Persists the value of `key` from `settings`, leaving every other key
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    fn save(&self, key: SettingKey, settings: &Settings) -> Result<(), StoreError>;
}

/// Settings held in memory only.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    settings: Mutex<Settings>,
}

impl MemoryBackend {
    /// Creates a backend holding `settings`.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }

    /// Replaces the stored settings without going through a store, the way
    /// an external editor would.
    pub fn replace(&self, settings: Settings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = settings;
    }
}

impl SettingsBackend for MemoryBackend {
    fn load(&self) -> Result<Settings, StoreError> {
        Ok(self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, key: SettingKey, settings: &Settings) -> Result<(), StoreError> {
        let mut stored = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        match key {
            SettingKey::ServerPath => stored.path.clone_from(&settings.path),
            SettingKey::ServerArgs => stored.args.clone_from(&settings.args),
            SettingKey::MasterFile => stored.master_file.clone_from(&settings.master_file),
            SettingKey::NamespacePaths => {
                stored.namespace_paths.clone_from(&settings.namespace_paths);
            }
        }
        Ok(())
    }
}

/// The workspace's `.vscode/settings.json`, holding flat `jasmin.*` keys.
///
/// Keys that do not belong to this integration are preserved on write.
#[derive(Debug, Clone)]
pub struct WorkspaceSettingsFile {
    path: PathBuf,
}

impl WorkspaceSettingsFile {
    /// Settings file of the workspace rooted at `root`.
    #[must_use]
    pub fn for_workspace(root: &Path) -> Self {
        Self {
            path: root.join(".vscode").join("settings.json"),
        }
    }

    /// Settings file at an explicit location.
    #[must_use]
    pub const fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the settings file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if text.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::NotAnObject(self.path.clone())),
            Err(source) => Err(StoreError::Parse {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn field<T: serde::de::DeserializeOwned>(
        &self,
        object: &Map<String, Value>,
        key: SettingKey,
    ) -> Result<Option<T>, StoreError> {
        match object.get(&key.qualified()) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|source| StoreError::Parse {
                    path: self.path.clone(),
                    source,
                }),
        }
    }

    fn write_object(&self, object: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let body = serde_json::to_string_pretty(object).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;

        // Write-then-rename so readers never see a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, format!("{body}\n")).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl SettingsBackend for WorkspaceSettingsFile {
    fn load(&self) -> Result<Settings, StoreError> {
        let object = self.read_object()?;
        Ok(Settings {
            path: self.field(&object, SettingKey::ServerPath)?,
            args: self.field(&object, SettingKey::ServerArgs)?,
            master_file: self.field(&object, SettingKey::MasterFile)?,
            namespace_paths: self
                .field::<BTreeMap<String, String>>(&object, SettingKey::NamespacePaths)?
                .unwrap_or_default(),
        })
    }

    fn save(&self, key: SettingKey, settings: &Settings) -> Result<(), StoreError> {
        let mut object = self.read_object()?;

        let value = match key {
            SettingKey::ServerPath => settings.path.clone().map(Value::String),
            SettingKey::ServerArgs => settings
                .args
                .as_ref()
                .map(|args| args.iter().cloned().map(Value::String).collect()),
            SettingKey::MasterFile => settings.master_file.clone().map(Value::String),
            SettingKey::NamespacePaths => Some(
                settings
                    .namespace_paths
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect::<Map<_, _>>()
                    .into(),
            ),
        };

        match value {
            Some(value) => object.insert(key.qualified(), value),
            None => object.remove(&key.qualified()),
        };

        debug!("Persisting {} to {}", key, self.path.display());
        self.write_object(&object)
    }
}

/// Typed access to the workspace settings with per-key change events.
pub struct ConfigStore {
    backend: Arc<dyn SettingsBackend>,
    current: RwLock<Settings>,
    events: broadcast::Sender<ChangeEvent>,
}

impl ConfigStore {
    /// Creates a store and reads the initial settings from `backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn open(backend: Arc<dyn SettingsBackend>) -> Result<Self, StoreError> {
        let current = backend.load()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            backend,
            current: RwLock::new(current),
            events,
        })
    }

    /// Store over in-memory settings.
    #[must_use]
    pub fn in_memory(settings: Settings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend: Arc::new(MemoryBackend::new(settings.clone())),
            current: RwLock::new(settings),
            events,
        }
    }

    /// Snapshot of all settings.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The configured master file, if any.
    #[must_use]
    pub fn master_file(&self) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .master_file
            .clone()
    }

    /// The configured namespace paths. Empty when none are configured.
    #[must_use]
    pub fn namespace_paths(&self) -> BTreeMap<String, String> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .namespace_paths
            .clone()
    }

    /// Sets or clears the master file.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted; the in-memory value
    /// is then left unchanged.
    pub fn set_master_file(&self, value: Option<String>) -> Result<(), StoreError> {
        self.write(SettingKey::MasterFile, |s| s.master_file = value)
    }

    /// Replaces the whole namespace map.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    pub fn set_namespace_paths(&self, paths: BTreeMap<String, String>) -> Result<(), StoreError> {
        self.write(SettingKey::NamespacePaths, |s| s.namespace_paths = paths)
    }

    /// Inserts or replaces a single namespace entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    pub fn upsert_namespace(&self, name: &str, path: &str) -> Result<(), StoreError> {
        self.write(SettingKey::NamespacePaths, |s| {
            s.namespace_paths.insert(name.to_string(), path.to_string());
        })
    }

    /// Re-reads the backend and announces every key that changed since the
    /// last read or write.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read; the previous values
    /// are kept.
    pub fn reload(&self) -> Result<Vec<SettingKey>, StoreError> {
        let fresh = self.backend.load()?;
        let changed = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let changed = current.changed_keys(&fresh);
            *current = fresh;
            changed
        };

        for key in &changed {
            self.emit(*key, ChangeOrigin::External);
        }
        Ok(changed)
    }

    /// Subscribes to changes of the given keys.
    #[must_use]
    pub fn subscribe(&self, keys: &[SettingKey]) -> Subscription {
        Subscription {
            keys: keys.to_vec(),
            rx: self.events.subscribe(),
        }
    }

    fn write(&self, key: SettingKey, update: impl FnOnce(&mut Settings)) -> Result<(), StoreError> {
        let changed = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let mut next = current.clone();
            update(&mut next);

            if next == *current {
                return Ok(());
            }

            self.backend.save(key, &next)?;
            let changed = current.changed_keys(&next);
            *current = next;
            changed
        };

        for key in changed {
            self.emit(key, ChangeOrigin::Local);
        }
        Ok(())
    }

    fn emit(&self, key: SettingKey, origin: ChangeOrigin) {
        debug!("Setting {} changed ({:?})", key, origin);
        // No subscribers is fine
        let _ = self.events.send(ChangeEvent { key, origin });
    }
}

/// A filtered stream of [`ChangeEvent`]s. Dropping it unsubscribes.
pub struct Subscription {
    keys: Vec<SettingKey>,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Waits for the next change of a subscribed key.
    ///
    /// Returns `None` once the store is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.keys.contains(&event.key) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Settings subscriber lagged, {} change events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns an already-delivered change without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.keys.contains(&event.key) => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    /// Stops receiving events.
    pub fn cancel(self) {
        drop(self);
    }
}
