// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Integration tests for the synchronization controller.
//!
//! A recording session stands in for the language server and a scripted
//! host answers the prompts.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use unwrap/expect for clear failure messages"
)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jasmin_bridge::commands::Command;
use jasmin_bridge::config::Settings;
use jasmin_bridge::controller::{Phase, SyncController, Trigger};
use jasmin_bridge::document::ActiveDocument;
use jasmin_bridge::error::ProtocolError;
use jasmin_bridge::host::{Answer, MessageLevel, ScriptedHost};
use jasmin_bridge::lsp::{FileChange, ProtocolChannel, ServerSession};
use jasmin_bridge::status::StatusState;
use jasmin_bridge::store::{ConfigStore, MemoryBackend, WorkspaceSettingsFile};

const ROOT: &str = "/w/project";

type Hook = Box<dyn Fn() + Send + Sync>;

/// Records every message and answers requests with a fixed reply.
#[derive(Default)]
struct MockSession {
    sent: Mutex<Vec<(String, Value)>>,
    reply: Mutex<Option<Value>>,
    before_reply: Mutex<Option<Hook>>,
    fail_notifications: AtomicBool,
}

impl MockSession {
    fn replying(reply: Value) -> Arc<Self> {
        let session = Self::default();
        *session.reply.lock().unwrap() = Some(reply);
        Arc::new(session)
    }

    fn required(names: &[&str]) -> Arc<Self> {
        Self::replying(json!({ "namespaces": names }))
    }

    fn methods(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    fn params(&self, method: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl ServerSession for MockSession {
    async fn send_notification(&self, method: &str, params: Value) -> Result<(), ProtocolError> {
        self.sent.lock().unwrap().push((method.to_string(), params));
        if self.fail_notifications.load(Ordering::SeqCst) {
            return Err(ProtocolError::Closed);
        }
        Ok(())
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, ProtocolError> {
        self.sent.lock().unwrap().push((method.to_string(), params));
        if let Some(hook) = self.before_reply.lock().unwrap().as_ref() {
            hook();
        }
        self.reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ProtocolError::Rejected {
                method: method.to_string(),
                code: -32603,
                message: "mock failure".to_string(),
            })
    }

    fn is_alive(&self) -> bool {
        true
    }
}

struct Fixture {
    backend: Arc<MemoryBackend>,
    store: Arc<ConfigStore>,
    session: Arc<MockSession>,
    host: Arc<ScriptedHost>,
    controller: SyncController,
}

fn fixture(settings: Settings, session: Arc<MockSession>, root: Option<&str>) -> Fixture {
    let backend = Arc::new(MemoryBackend::new(settings));
    let store = Arc::new(ConfigStore::open(backend.clone()).unwrap());
    let host = Arc::new(ScriptedHost::new(root.map(PathBuf::from)));
    let controller = SyncController::new(
        store.clone(),
        ProtocolChannel::new(session.clone()),
        host.clone(),
    );
    Fixture {
        backend,
        store,
        session,
        host,
        controller,
    }
}

fn settings(master: Option<&str>, namespaces: &[(&str, &str)]) -> Settings {
    Settings {
        master_file: master.map(str::to_string),
        namespace_paths: namespaces
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        ..Settings::default()
    }
}

fn jazz(name: &str) -> Option<ActiveDocument> {
    Some(ActiveDocument::new(Path::new(ROOT).join(name)))
}

#[tokio::test]
async fn test_activation_pushes_master_then_namespaces() {
    let mut f = fixture(
        settings(
            Some("src/main.jazz"),
            &[("Common", "lib/Common"), ("Crypto", "${workspaceFolder}/crypto")],
        ),
        MockSession::required(&[]),
        Some(ROOT),
    );

    f.controller.activate().await;

    assert_eq!(f.controller.phase(), Phase::Active);
    assert_eq!(
        f.session.methods(),
        vec!["jasmin/setMasterFile", "jasmin/setNamespacePaths"]
    );
    assert_eq!(
        f.session.params("jasmin/setMasterFile")[0],
        json!({"uri": "file:///w/project/src/main.jazz"})
    );
    assert_eq!(
        f.session.params("jasmin/setNamespacePaths")[0],
        json!({"paths": [
            {"namespace": "Common", "path": "/w/project/lib/Common"},
            {"namespace": "Crypto", "path": "/w/project/crypto"},
        ]})
    );
}

#[tokio::test]
async fn test_activation_with_nothing_configured_sends_nothing() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));
    f.controller.activate().await;
    assert!(f.session.methods().is_empty());
    assert_eq!(f.host.status(), Some(StatusState::Hidden));
}

#[tokio::test]
async fn test_activation_without_workspace_skips_master_file() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[]),
        MockSession::required(&[]),
        None,
    );
    f.controller.activate().await;
    assert!(f.session.methods().is_empty());
}

#[tokio::test]
async fn test_activation_is_idempotent() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[]),
        MockSession::required(&[]),
        Some(ROOT),
    );
    f.controller.activate().await;
    f.controller.activate().await;
    assert_eq!(f.session.methods(), vec!["jasmin/setMasterFile"]);
}

#[tokio::test]
async fn test_status_text_sequence() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));
    f.controller.activate().await;

    f.controller.on_active_document_changed(jazz("src/main.jazz"));
    assert_eq!(
        f.host.status().and_then(|s| s.text()).as_deref(),
        Some("$(warning) No Master File")
    );

    f.backend.replace(settings(Some("src/main.jazz"), &[]));
    f.controller.handle(Trigger::SettingsEdited).await;
    assert_eq!(
        f.host.status().and_then(|s| s.text()).as_deref(),
        Some("$(file) Master: main.jazz")
    );

    f.backend.replace(settings(
        Some("src/main.jazz"),
        &[("Common", "lib/Common"), ("Crypto", "lib/Crypto")],
    ));
    f.controller.handle(Trigger::SettingsEdited).await;
    assert_eq!(
        f.host.status().and_then(|s| s.text()).as_deref(),
        Some("$(file) Master: main.jazz (+2 namespaces)")
    );

    f.controller
        .on_active_document_changed(Some(ActiveDocument::new("/w/project/README.md")));
    assert_eq!(f.host.status(), Some(StatusState::Hidden));

    f.controller.on_active_document_changed(Some(ActiveDocument::with_language(
        "/w/project/scratch",
        "jasmin",
    )));
    assert!(f.host.status().is_some_and(|s| s.is_visible()));
}

#[tokio::test]
async fn test_external_master_change_runs_full_sequence() {
    let mut f = fixture(
        settings(None, &[("Common", "lib/Common")]),
        MockSession::required(&["Common", "Crypto"]),
        Some(ROOT),
    );
    f.controller.activate().await;
    f.session.clear();

    f.backend
        .replace(settings(Some("src/other.jazz"), &[("Common", "lib/Common")]));
    f.controller.handle(Trigger::SettingsEdited).await;

    assert_eq!(
        f.session.methods(),
        vec![
            "jasmin/setMasterFile",
            "jasmin/getRequiredNamespaces",
            "jasmin/setNamespacePaths"
        ]
    );
    assert_eq!(f.session.params("jasmin/getRequiredNamespaces")[0], json!({}));

    let messages = f.host.messages();
    assert!(
        messages
            .iter()
            .any(|(level, m)| *level == MessageLevel::Info && m.contains("Crypto") && !m.contains("Common")),
        "missing namespaces should be reported: {messages:?}"
    );
}

#[tokio::test]
async fn test_external_namespace_change_pushes_only_paths() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[]),
        MockSession::required(&["Common"]),
        Some(ROOT),
    );
    f.controller.activate().await;
    f.session.clear();

    f.backend
        .replace(settings(Some("main.jazz"), &[("Common", "/abs/common")]));
    f.controller.handle(Trigger::SettingsEdited).await;

    assert_eq!(f.session.methods(), vec!["jasmin/setNamespacePaths"]);
    assert_eq!(
        f.session.params("jasmin/setNamespacePaths")[0],
        json!({"paths": [{"namespace": "Common", "path": "/abs/common"}]})
    );
}

#[tokio::test]
async fn test_clearing_namespaces_externally_sends_empty_list() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[("Common", "lib")]),
        MockSession::required(&[]),
        Some(ROOT),
    );
    f.controller.activate().await;
    f.session.clear();

    f.backend.replace(settings(Some("main.jazz"), &[]));
    f.controller.handle(Trigger::SettingsEdited).await;

    assert_eq!(
        f.session.params("jasmin/setNamespacePaths"),
        vec![json!({"paths": []})]
    );
}

#[tokio::test]
async fn test_set_master_file_command() {
    let mut f = fixture(
        Settings::default(),
        MockSession::required(&["Common"]),
        Some(ROOT),
    );
    f.controller.activate().await;
    f.host
        .push_answers([Answer::File(PathBuf::from("/w/project/src/main.jazz"))]);

    f.controller.execute(Command::SetMasterFile).await;

    assert_eq!(f.store.master_file().as_deref(), Some("src/main.jazz"));
    assert_eq!(
        f.session.methods(),
        vec![
            "jasmin/setMasterFile",
            "jasmin/getRequiredNamespaces",
            "jasmin/setNamespacePaths"
        ]
    );
    assert!(
        f.host
            .messages()
            .contains(&(MessageLevel::Info, "Master file set to: main.jazz".to_string()))
    );

    // The server already has the written value, so the event does not resync
    f.session.clear();
    f.controller.process_pending_changes().await;
    assert!(f.session.methods().is_empty());
}

#[tokio::test]
async fn test_set_master_file_cancelled_changes_nothing() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));
    f.controller.activate().await;
    f.host.push_answers([Answer::Cancel]);

    f.controller.execute(Command::SetMasterFile).await;

    assert_eq!(f.store.master_file(), None);
    assert!(f.session.methods().is_empty());
    assert!(f.host.messages().is_empty());
}

#[tokio::test]
async fn test_set_master_file_rejects_non_program_file() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));
    f.host
        .push_answers([Answer::File(PathBuf::from("/w/project/lib/util.jinc"))]);

    f.controller.execute(Command::SetMasterFile).await;
    assert_eq!(f.store.master_file(), None);
}

#[tokio::test]
async fn test_commands_require_a_workspace() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), None);
    f.host
        .push_answers([Answer::File(PathBuf::from("/w/main.jazz"))]);

    f.controller.execute(Command::SetMasterFile).await;
    f.controller
        .execute(Command::ConfigureNamespace(Some("Common".to_string())))
        .await;

    assert_eq!(f.store.settings(), Settings::default());
    assert_eq!(f.host.remaining_answers(), 1);
    assert_eq!(
        f.host.messages(),
        vec![
            (MessageLevel::Error, "No workspace folder open".to_string()),
            (MessageLevel::Error, "No workspace folder open".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_configure_namespace_without_session_cancelled() {
    let store = Arc::new(ConfigStore::in_memory(Settings::default()));
    let host = Arc::new(ScriptedHost::new(Some(PathBuf::from(ROOT))).with_answers([Answer::Cancel]));
    let mut controller =
        SyncController::new(store.clone(), ProtocolChannel::detached(), host.clone());

    controller.activate().await;
    controller.execute(Command::ConfigureNamespace(None)).await;

    assert!(store.namespace_paths().is_empty());
    assert!(host.messages().is_empty());
}

#[tokio::test]
async fn test_configure_namespace_without_session_persists() {
    let store = Arc::new(ConfigStore::in_memory(Settings::default()));
    let host = Arc::new(ScriptedHost::new(Some(PathBuf::from(ROOT))).with_answers([
        Answer::Text("  Common ".to_string()),
        Answer::Folder(PathBuf::from("/w/project/lib/common")),
    ]));
    let mut controller =
        SyncController::new(store.clone(), ProtocolChannel::detached(), host.clone());

    controller.execute(Command::ConfigureNamespace(None)).await;

    assert_eq!(
        store.namespace_paths(),
        BTreeMap::from([("Common".to_string(), "lib/common".to_string())])
    );
}

#[tokio::test]
async fn test_configure_namespace_blank_name_aborts() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));
    f.host.push_answers([
        Answer::Text("   ".to_string()),
        Answer::Folder(PathBuf::from("/w/project/lib")),
    ]);

    f.controller.execute(Command::ConfigureNamespace(None)).await;

    assert!(f.store.namespace_paths().is_empty());
    assert_eq!(f.host.remaining_answers(), 1);
}

#[tokio::test]
async fn test_configure_namespace_offers_required_names() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[("Common", "lib/Common")]),
        MockSession::required(&["Common", "Crypto"]),
        Some(ROOT),
    );
    f.host.push_answers([
        Answer::PickLabel("Crypto".to_string()),
        Answer::Folder(PathBuf::from("/w/project/lib/Crypto")),
    ]);

    f.controller.execute(Command::ConfigureNamespace(None)).await;

    let lists = f.host.lists();
    let labels: Vec<&str> = lists[0].iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["Common", "Crypto", "$(edit) Custom namespace..."]);
    assert_eq!(lists[0][0].description.as_deref(), Some("lib/Common"));
    assert_eq!(lists[0][1].description.as_deref(), Some("Not configured"));

    assert_eq!(
        f.store.namespace_paths().get("Crypto").map(String::as_str),
        Some("lib/Crypto")
    );
    assert_eq!(
        f.session.methods().last().map(String::as_str),
        Some("jasmin/setNamespacePaths")
    );
}

#[tokio::test]
async fn test_configure_namespace_custom_entry_prompts_for_name() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[]),
        MockSession::required(&["Common"]),
        Some(ROOT),
    );
    f.host.push_answers([
        Answer::PickLabel("Custom".to_string()),
        Answer::Text("Extra".to_string()),
        Answer::Folder(PathBuf::from("/elsewhere/extra")),
    ]);

    f.controller.execute(Command::ConfigureNamespace(None)).await;

    assert_eq!(
        f.store.namespace_paths().get("Extra").map(String::as_str),
        Some("/elsewhere/extra")
    );
}

#[tokio::test]
async fn test_show_configuration_menu_layout() {
    let mut f = fixture(
        settings(
            Some("src/main.jazz"),
            &[("Common", "lib/Common"), ("Local", "lib/Local")],
        ),
        MockSession::required(&["Crypto", "Common"]),
        Some(ROOT),
    );
    f.host.push_answers([Answer::Cancel]);

    f.controller.execute(Command::ShowConfiguration).await;

    let lists = f.host.lists();
    let labels: Vec<&str> = lists[0].iter().map(|i| i.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "$(file) Master File",
            "$(circle-slash) Crypto",
            "$(check) Common",
            "$(folder) Local",
            "$(add) Configure custom namespace...",
        ]
    );
    assert_eq!(lists[0][0].description.as_deref(), Some("src/main.jazz"));
    assert_eq!(
        lists[0][0].detail.as_deref(),
        Some("/w/project/src/main.jazz")
    );
}

#[tokio::test]
async fn test_show_configuration_dispatches_namespace_entry() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[]),
        MockSession::required(&["Crypto"]),
        Some(ROOT),
    );
    f.host.push_answers([
        Answer::PickLabel("Crypto".to_string()),
        Answer::Folder(PathBuf::from("/w/project/crypto")),
    ]);

    f.controller.execute(Command::ShowConfiguration).await;

    assert_eq!(
        f.store.namespace_paths().get("Crypto").map(String::as_str),
        Some("crypto")
    );
}

#[tokio::test]
async fn test_show_configuration_dispatches_master_entry() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));
    f.host.push_answers([
        Answer::Pick(0),
        Answer::File(PathBuf::from("/w/project/top.jazz")),
    ]);

    f.controller.execute(Command::ShowConfiguration).await;

    assert_eq!(f.store.master_file().as_deref(), Some("top.jazz"));
    assert_eq!(f.host.lists().len(), 1);
}

#[tokio::test]
async fn test_required_namespaces_failure_degrades() {
    let session = Arc::new(MockSession::default());
    let mut f = fixture(settings(None, &[("Common", "lib")]), session, Some(ROOT));
    f.host
        .push_answers([Answer::File(PathBuf::from("/w/project/main.jazz"))]);

    f.controller.execute(Command::SetMasterFile).await;

    // The failed query does not stop the namespace push
    assert_eq!(
        f.session.methods(),
        vec![
            "jasmin/setMasterFile",
            "jasmin/getRequiredNamespaces",
            "jasmin/setNamespacePaths"
        ]
    );
    let messages = f.host.messages();
    assert!(
        messages
            .iter()
            .any(|(level, m)| *level == MessageLevel::Warning
                && m.starts_with("Failed to get required namespaces"))
    );
    assert!(
        messages
            .iter()
            .any(|(level, m)| *level == MessageLevel::Info && m == "Master file set to: main.jazz")
    );
}

#[tokio::test]
async fn test_stale_required_namespaces_are_discarded() {
    let mut f = fixture(
        settings(Some("a.jazz"), &[]),
        MockSession::required(&["Common"]),
        Some(ROOT),
    );
    f.controller.activate().await;

    let store = f.store.clone();
    *f.session.before_reply.lock().unwrap() = Some(Box::new(move || {
        store.set_master_file(Some("b.jazz".to_string())).unwrap();
    }));

    f.controller.on_master_file_changed().await;

    // Computed for a.jazz, arrived after the switch to b.jazz
    assert!(
        !f.host
            .messages()
            .iter()
            .any(|(_, m)| m.contains("Common")),
        "stale result should not be reported"
    );

    // The newer master file still reaches the server
    f.session.clear();
    *f.session.before_reply.lock().unwrap() = None;
    f.controller.process_pending_changes().await;
    assert_eq!(
        f.session.params("jasmin/setMasterFile"),
        vec![json!({"uri": "file:///w/project/b.jazz"})]
    );
}

#[tokio::test]
async fn test_empty_master_file_is_not_sent() {
    let mut f = fixture(
        settings(Some(""), &[]),
        MockSession::required(&[]),
        Some(ROOT),
    );
    f.controller = f.controller.with_active_document(jazz("src/main.jazz"));

    f.controller.activate().await;

    assert!(f.session.params("jasmin/setMasterFile").is_empty());
    assert_eq!(f.host.status(), Some(StatusState::NoMasterFile));
    assert_eq!(f.store.master_file(), Some(String::new()));

    f.backend.replace(settings(Some("main.jazz"), &[]));
    f.controller.handle(Trigger::SettingsEdited).await;
    f.backend.replace(settings(Some(""), &[]));
    f.controller.handle(Trigger::SettingsEdited).await;

    assert_eq!(
        f.session.params("jasmin/setMasterFile"),
        vec![json!({"uri": "file:///w/project/main.jazz"})]
    );
    assert_eq!(
        f.host.status().and_then(|s| s.text()).as_deref(),
        Some("$(warning) No Master File")
    );
}

#[tokio::test]
async fn test_notification_failures_do_not_stop_the_sequence() {
    let mut f = fixture(
        settings(None, &[("Common", "lib")]),
        MockSession::required(&["Common"]),
        Some(ROOT),
    );
    f.controller.activate().await;
    f.session.clear();
    f.session.fail_notifications.store(true, Ordering::SeqCst);

    f.backend
        .replace(settings(Some("main.jazz"), &[("Common", "lib")]));
    f.controller.handle(Trigger::SettingsEdited).await;

    assert_eq!(
        f.session.methods(),
        vec![
            "jasmin/setMasterFile",
            "jasmin/getRequiredNamespaces",
            "jasmin/setNamespacePaths"
        ]
    );
    let warnings: Vec<String> = f
        .host
        .messages()
        .into_iter()
        .filter(|(level, _)| *level == MessageLevel::Warning)
        .map(|(_, m)| m)
        .collect();
    assert_eq!(warnings.len(), 2, "{warnings:?}");
    assert!(warnings[0].starts_with("Failed to set master file"));
    assert!(warnings[1].starts_with("Failed to set namespace paths"));
}

#[tokio::test]
async fn test_server_launch_setting_change_sends_nothing() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[]),
        MockSession::required(&[]),
        Some(ROOT),
    );
    f.controller.activate().await;
    f.session.clear();

    let mut edited = settings(Some("main.jazz"), &[]);
    edited.path = Some("/opt/jasmin/bin/jasmin-lsp".to_string());
    f.backend.replace(edited);
    f.controller.handle(Trigger::SettingsEdited).await;

    assert!(f.session.methods().is_empty());
    assert_eq!(
        f.store.settings().path.as_deref(),
        Some("/opt/jasmin/bin/jasmin-lsp")
    );
}

#[tokio::test]
async fn test_null_required_namespaces_read_as_none() {
    let mut f = fixture(
        settings(Some("main.jazz"), &[]),
        MockSession::replying(Value::Null),
        Some(ROOT),
    );
    f.controller.on_master_file_changed().await;
    assert!(f.host.messages().is_empty());
}

#[tokio::test]
async fn test_watched_file_forwarding_filters_extensions() {
    let mut f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));

    f.controller
        .handle(Trigger::WatchedFileChanged(
            PathBuf::from("/w/project/lib/util.jinc"),
            FileChange::Changed,
        ))
        .await;
    f.controller
        .handle(Trigger::WatchedFileChanged(
            PathBuf::from("/w/project/notes.txt"),
            FileChange::Created,
        ))
        .await;

    assert_eq!(
        f.session.params("workspace/didChangeWatchedFiles"),
        vec![json!({"changes": [{"uri": "file:///w/project/lib/util.jinc", "type": 2}]})]
    );
}

#[tokio::test]
async fn test_settings_file_edit_is_picked_up() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let backend = Arc::new(WorkspaceSettingsFile::for_workspace(&root));
    let store = Arc::new(ConfigStore::open(backend.clone()).unwrap());
    let session = MockSession::required(&[]);
    let host = Arc::new(ScriptedHost::new(Some(root.clone())));
    let mut controller =
        SyncController::new(store.clone(), ProtocolChannel::new(session.clone()), host);
    controller.activate().await;

    std::fs::create_dir_all(root.join(".vscode")).unwrap();
    std::fs::write(
        backend.path(),
        r#"{"editor.tabSize": 2, "jasmin.namespacePaths": {"Common": "lib"}}"#,
    )
    .unwrap();
    controller.handle(Trigger::SettingsEdited).await;

    assert_eq!(session.methods(), vec!["jasmin/setNamespacePaths"]);
    assert_eq!(
        session.params("jasmin/setNamespacePaths")[0]["paths"][0]["path"],
        Value::String(root.join("lib").to_string_lossy().into_owned())
    );
}

#[tokio::test]
async fn test_run_loop_serializes_triggers() {
    let f = fixture(Settings::default(), MockSession::required(&[]), Some(ROOT));
    f.host.push_answers([
        Answer::File(PathBuf::from("/w/project/main.jazz")),
        Answer::Folder(PathBuf::from("/w/project/lib/Common")),
    ]);
    let (host, store, session, backend) = (
        f.host.clone(),
        f.store.clone(),
        f.session.clone(),
        f.backend.clone(),
    );

    let (handle, task) = f.controller.spawn();
    assert!(handle.active_document_changed(jazz("main.jazz")).await);
    assert!(handle.execute(Command::SetMasterFile).await);
    assert!(
        handle
            .execute(Command::ConfigureNamespace(Some("Common".to_string())))
            .await
    );

    // Let both commands commit before editing the storage behind the store
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.namespace_paths().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    backend.replace(settings(Some("other.jazz"), &[("Common", "lib/Common")]));
    assert!(handle.settings_edited().await);
    assert!(handle.shutdown().await);
    task.await.unwrap();

    assert_eq!(store.master_file().as_deref(), Some("other.jazz"));
    assert_eq!(
        session.methods(),
        vec![
            // set-master-file command
            "jasmin/setMasterFile",
            "jasmin/getRequiredNamespaces",
            "jasmin/setNamespacePaths",
            // configure-namespace command
            "jasmin/setNamespacePaths",
            // external master change
            "jasmin/setMasterFile",
            "jasmin/getRequiredNamespaces",
            "jasmin/setNamespacePaths",
        ]
    );
    assert_eq!(host.status(), Some(StatusState::Hidden));
    assert!(!handle.execute(Command::ShowConfiguration).await);
}

#[tokio::test]
async fn test_run_loop_syncs_writes_from_other_store_users() {
    let f = fixture(
        settings(Some("a.jazz"), &[]),
        MockSession::required(&[]),
        Some(ROOT),
    );
    let (store, session) = (f.store.clone(), f.session.clone());

    let (handle, task) = f.controller.spawn();
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.methods().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    store.set_master_file(Some("b.jazz".to_string())).unwrap();
    store.upsert_namespace("Common", "lib/Common").unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        // Whichever pass sends it, the map eventually reaches the server
        while !session
            .params("jasmin/setNamespacePaths")
            .last()
            .is_some_and(|p| p["paths"].as_array().is_some_and(|a| !a.is_empty()))
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(handle.shutdown().await);
    task.await.unwrap();

    assert_eq!(
        session.params("jasmin/setMasterFile"),
        vec![
            json!({"uri": "file:///w/project/a.jazz"}),
            json!({"uri": "file:///w/project/b.jazz"}),
        ]
    );
    assert_eq!(
        session.params("jasmin/setNamespacePaths").last(),
        Some(&json!({"paths": [{"namespace": "Common", "path": "/w/project/lib/Common"}]}))
    );
}
