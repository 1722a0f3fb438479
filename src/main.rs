// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Jasmin Bridge CLI.
//!
//! Runs the synchronization workflows against a workspace from the command
//! line. Prompts are answered from the arguments instead of a user.

#![allow(clippy::print_stdout, reason = "CLI tool needs to output to stdout")]

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use jasmin_bridge::commands::Command as PaletteCommand;
use jasmin_bridge::config::LaunchConfig;
use jasmin_bridge::controller::{SyncController, resolve_namespaces};
use jasmin_bridge::document::{self, ActiveDocument};
use jasmin_bridge::host::{Answer, MessageLevel, ScriptedHost};
use jasmin_bridge::lsp::{LspClient, ProtocolChannel};
use jasmin_bridge::resolve::resolve;
use jasmin_bridge::store::{ConfigStore, WorkspaceSettingsFile};

/// Command-line arguments for Jasmin Bridge.
#[derive(Parser, Debug)]
#[command(name = "jasmin-bridge")]
#[command(about = "Keeps a Jasmin language server in sync with workspace settings")]
#[command(version = env!("JASMIN_BRIDGE_VERSION"))]
struct Args {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Command,

    /// Workspace root directory. Defaults to the current directory.
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Path to a launch configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Do not start the language server; protocol messages become no-ops.
    #[arg(long, global = true)]
    no_server: bool,
}

/// Subcommands supported by Jasmin Bridge.
#[derive(Subcommand, Debug)]
enum Command {
    /// Print the status indicator label for a focused document.
    Status {
        /// The focused document.
        file: PathBuf,

        /// Language id the editor assigned to the document.
        #[arg(long)]
        language_id: Option<String>,
    },

    /// Push the current settings to the language server.
    Sync,

    /// Set the master file and push it to the server.
    SetMasterFile {
        /// The `.jazz` file compiled as the entry point.
        file: PathBuf,
    },

    /// Map a namespace to a folder and push the namespace paths.
    ConfigureNamespace {
        /// Namespace name. Defaults to the folder's name.
        #[arg(long)]
        name: Option<String>,

        /// Folder holding the namespace's sources.
        folder: PathBuf,
    },

    /// Print the namespaces the master file requires.
    RequiredNamespaces,

    /// Print the current configuration with resolved paths.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jasmin_bridge=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let root = workspace_root(args.root.as_deref())?;
    let store = Arc::new(
        ConfigStore::open(Arc::new(WorkspaceSettingsFile::for_workspace(&root)))
            .context("Failed to read workspace settings")?,
    );

    match args.command {
        Command::Status { file, language_id } => {
            run_status(&root, &store, &file, language_id);
            Ok(())
        }
        Command::Sync => {
            let workspace = Workspace::connect(args.config.clone(), args.no_server, root, store).await?;
            workspace.run(None, Vec::new()).await
        }
        Command::SetMasterFile { file } => {
            let file = absolute(&file)?;
            if file.extension().and_then(|e| e.to_str()) != Some(document::PROGRAM_EXTENSION) {
                bail!("Not a Jasmin program file: {}", file.display());
            }
            let workspace = Workspace::connect(args.config.clone(), args.no_server, root, store).await?;
            workspace
                .run(Some(PaletteCommand::SetMasterFile), vec![Answer::File(file)])
                .await
        }
        Command::ConfigureNamespace { name, folder } => {
            let folder = absolute(&folder)?;
            let name = match name {
                Some(name) => name,
                None => folder
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow!("Cannot derive a namespace name from {}", folder.display()))?,
            };
            let workspace = Workspace::connect(args.config.clone(), args.no_server, root, store).await?;
            workspace
                .run(
                    Some(PaletteCommand::ConfigureNamespace(Some(name))),
                    vec![Answer::Folder(folder)],
                )
                .await
        }
        Command::RequiredNamespaces => {
            let workspace = Workspace::connect(args.config.clone(), args.no_server, root, store).await?;
            workspace.required_namespaces().await
        }
        Command::Show => {
            let workspace = Workspace::connect(args.config.clone(), args.no_server, root, store).await?;
            workspace.show().await
        }
    }
}

fn workspace_root(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(root) => absolute(root),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}

fn run_status(root: &Path, store: &Arc<ConfigStore>, file: &Path, language_id: Option<String>) {
    let path = root.join(file);
    let document = match language_id {
        Some(id) => ActiveDocument::with_language(path, id),
        None => ActiveDocument::new(path),
    };

    let host = Arc::new(ScriptedHost::new(Some(root.to_path_buf())));
    let controller = SyncController::new(store.clone(), ProtocolChannel::detached(), host)
        .with_active_document(Some(document));

    if let Some(text) = controller.status().text() {
        println!("{text}");
    }
}

/// A workspace with its settings and, unless disabled, a running server.
struct Workspace {
    root: PathBuf,
    store: Arc<ConfigStore>,
    client: Option<Arc<LspClient>>,
}

impl Workspace {
    async fn connect(
        config: Option<PathBuf>,
        no_server: bool,
        root: PathBuf,
        store: Arc<ConfigStore>,
    ) -> Result<Self> {
        let client = if no_server {
            None
        } else {
            let settings = store.settings();
            let launch = LaunchConfig::load(config, &settings)?;
            debug!("Launching {} {:?}", launch.path, launch.args);

            match LspClient::spawn(&launch) {
                Ok(client) => {
                    client
                        .initialize(&root, Some(serde_json::to_value(&settings)?))
                        .await?;
                    Some(Arc::new(client))
                }
                Err(e) => {
                    warn!("Language server unavailable, continuing without it: {e:#}");
                    None
                }
            }
        };

        Ok(Self {
            root,
            store,
            client,
        })
    }

    fn channel(&self) -> ProtocolChannel {
        match &self.client {
            Some(client) => ProtocolChannel::new(client.clone()),
            None => ProtocolChannel::detached(),
        }
    }

    fn controller(&self, host: Arc<ScriptedHost>) -> SyncController {
        SyncController::new(self.store.clone(), self.channel(), host)
    }

    /// Activates a controller, runs `command` with the given prompt answers
    /// and reports what the controller said.
    async fn run(self, command: Option<PaletteCommand>, answers: Vec<Answer>) -> Result<()> {
        let host = Arc::new(ScriptedHost::new(Some(self.root.clone())).with_answers(answers));
        let mut controller = self.controller(host.clone());

        controller.activate().await;
        if let Some(command) = command {
            controller.execute(command).await;
        }
        controller.process_pending_changes().await;
        controller.shutdown();

        self.close().await;

        let mut failed = None;
        for (level, message) in host.messages() {
            match level {
                MessageLevel::Info => println!("{message}"),
                MessageLevel::Warning => println!("warning: {message}"),
                MessageLevel::Error => {
                    println!("error: {message}");
                    failed = Some(message);
                }
            }
        }
        if let Some(message) = failed {
            bail!(message);
        }
        if host.remaining_answers() > 0 {
            bail!("Selection was not accepted");
        }
        Ok(())
    }

    async fn required_namespaces(self) -> Result<()> {
        let host = Arc::new(ScriptedHost::new(Some(self.root.clone())));
        let mut controller = self.controller(host);
        controller.activate().await;

        let required = self.channel().required_namespaces().await;
        controller.shutdown();
        self.close().await;

        for name in required? {
            println!("{name}");
        }
        Ok(())
    }

    async fn show(self) -> Result<()> {
        let settings = self.store.settings();
        let required = if self.client.is_some() {
            let host = Arc::new(ScriptedHost::new(Some(self.root.clone())));
            let mut controller = self.controller(host);
            controller.activate().await;
            let required = self.channel().required_namespaces().await;
            controller.shutdown();
            required.unwrap_or_else(|e| {
                warn!("Failed to get required namespaces: {e}");
                Vec::new()
            })
        } else {
            Vec::new()
        };
        self.close().await;

        println!("Workspace: {}", self.root.display());
        match settings.active_master_file() {
            Some(raw) => println!(
                "Master file: {raw} ({})",
                resolve(raw, &self.root).display()
            ),
            None => println!("Master file: not set"),
        }

        let resolved = resolve_namespaces(&settings.namespace_paths, &self.root);
        if resolved.is_empty() && required.is_empty() {
            println!("Namespaces: none");
            return Ok(());
        }

        println!("Namespaces:");
        for entry in &resolved {
            let marker = if required.contains(&entry.namespace) {
                "required"
            } else {
                "configured"
            };
            println!("  {} -> {} [{marker}]", entry.namespace, entry.path);
        }
        for name in required
            .iter()
            .filter(|name| !settings.namespace_paths.contains_key(*name))
        {
            println!("  {name} -> (not configured) [required]");
        }
        Ok(())
    }

    async fn close(&self) {
        if let Some(client) = &self.client
            && client.is_alive()
            && let Err(e) = client.shutdown().await
        {
            warn!("Language server did not shut down cleanly: {e:#}");
        }
    }
}
