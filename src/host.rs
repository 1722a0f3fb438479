// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The editor surface the controller talks to.
//!
//! [`Host`] covers the observable contracts the controller needs from an
//! editor: the workspace root, pickers, a list selection, text input,
//! message popups and the status indicator. [`ScriptedHost`] answers
//! prompts from a queue, for the command-line front end and for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::status::StatusState;

/// Severity of a popup message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Informational.
    Info,
    /// Non-blocking warning.
    Warning,
    /// Error; the requested action did not happen.
    Error,
}

/// Parameters of a single-file open dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePick {
    /// Dialog title.
    pub title: String,
    /// Name of the file type filter, e.g. "Jasmin Files".
    pub filter_name: String,
    /// Accepted extensions, without the dot.
    pub extensions: Vec<String>,
    /// Directory the dialog opens in.
    pub default_dir: Option<PathBuf>,
}

impl FilePick {
    /// Whether `path` passes the extension filter.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        self.extensions.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }
}

/// One entry of a selection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickPickItem {
    /// Main text, may carry a `$(icon)` prefix.
    pub label: String,
    /// Secondary text shown next to the label.
    pub description: Option<String>,
    /// Extra line shown under the label.
    pub detail: Option<String>,
}

impl QuickPickItem {
    /// An item with only a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: None,
            detail: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the detail line.
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Editor services used by the controller.
///
/// Every prompt returns `None` when the user cancels.
#[async_trait]
pub trait Host: Send + Sync {
    /// Root of the open workspace, if one is open.
    fn workspace_root(&self) -> Option<PathBuf>;

    /// Asks for a single existing file.
    async fn pick_file(&self, pick: FilePick) -> Option<PathBuf>;

    /// Asks for a single folder.
    async fn pick_folder(&self, title: &str, default_dir: Option<&Path>) -> Option<PathBuf>;

    /// Shows a list and returns the index of the chosen item.
    async fn quick_pick(&self, title: &str, items: &[QuickPickItem]) -> Option<usize>;

    /// Asks for a line of text.
    async fn input(&self, prompt: &str, placeholder: &str) -> Option<String>;

    /// Shows a popup message without waiting for it to be dismissed.
    fn show_message(&self, level: MessageLevel, message: &str);

    /// Updates the status indicator.
    fn set_status(&self, status: &StatusState);
}

/// A prepared answer to the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Answer to [`Host::pick_file`].
    File(PathBuf),
    /// Answer to [`Host::pick_folder`].
    Folder(PathBuf),
    /// Answer to [`Host::quick_pick`] by index.
    Pick(usize),
    /// Answer to [`Host::quick_pick`]: the first item whose label contains
    /// the text.
    PickLabel(String),
    /// Answer to [`Host::input`].
    Text(String),
    /// Cancels whatever prompt comes next.
    Cancel,
}

/// A [`Host`] that replays queued answers and records what it was shown.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    root: Option<PathBuf>,
    answers: Mutex<VecDeque<Answer>>,
    messages: Mutex<Vec<(MessageLevel, String)>>,
    lists: Mutex<Vec<Vec<QuickPickItem>>>,
    status: Mutex<Option<StatusState>>,
}

impl ScriptedHost {
    /// A host with the given workspace root.
    #[must_use]
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    /// Queues answers for upcoming prompts.
    #[must_use]
    pub fn with_answers(self, answers: impl IntoIterator<Item = Answer>) -> Self {
        self.push_answers(answers);
        self
    }

    /// Queues more answers.
    pub fn push_answers(&self, answers: impl IntoIterator<Item = Answer>) {
        lock(&self.answers).extend(answers);
    }

    /// Messages shown so far.
    #[must_use]
    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        lock(&self.messages).clone()
    }

    /// Lists presented so far, in order.
    #[must_use]
    pub fn lists(&self) -> Vec<Vec<QuickPickItem>> {
        lock(&self.lists).clone()
    }

    /// The most recent status indicator state.
    #[must_use]
    pub fn status(&self) -> Option<StatusState> {
        lock(&self.status).clone()
    }

    /// Answers not consumed yet.
    #[must_use]
    pub fn remaining_answers(&self) -> usize {
        lock(&self.answers).len()
    }

    fn next_answer(&self, prompt: &str) -> Option<Answer> {
        let answer = lock(&self.answers).pop_front();
        debug!("Prompt '{}' answered with {:?}", prompt, answer);
        answer
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Host for ScriptedHost {
    fn workspace_root(&self) -> Option<PathBuf> {
        self.root.clone()
    }

    async fn pick_file(&self, pick: FilePick) -> Option<PathBuf> {
        match self.next_answer(&pick.title)? {
            Answer::File(path) if pick.accepts(&path) => Some(path),
            Answer::File(path) => {
                warn!(
                    "{} does not match the {} filter",
                    path.display(),
                    pick.filter_name
                );
                None
            }
            _ => None,
        }
    }

    async fn pick_folder(&self, title: &str, _default_dir: Option<&Path>) -> Option<PathBuf> {
        match self.next_answer(title)? {
            Answer::Folder(path) => Some(path),
            _ => None,
        }
    }

    async fn quick_pick(&self, title: &str, items: &[QuickPickItem]) -> Option<usize> {
        lock(&self.lists).push(items.to_vec());
        match self.next_answer(title)? {
            Answer::Pick(index) if index < items.len() => Some(index),
            Answer::PickLabel(text) => items.iter().position(|item| item.label.contains(&text)),
            _ => None,
        }
    }

    async fn input(&self, prompt: &str, _placeholder: &str) -> Option<String> {
        match self.next_answer(prompt)? {
            Answer::Text(text) => Some(text),
            _ => None,
        }
    }

    fn show_message(&self, level: MessageLevel, message: &str) {
        match level {
            MessageLevel::Info => info!("{}", message),
            MessageLevel::Warning => warn!("{}", message),
            MessageLevel::Error => error!("{}", message),
        }
        lock(&self.messages).push((level, message.to_string()));
    }

    fn set_status(&self, status: &StatusState) {
        *lock(&self.status) = Some(status.clone());
    }
}
