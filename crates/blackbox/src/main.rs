//! `bbx` - CLI for blackbox
//!
//! Records errors and user actions into the local store and exports them as
//! diagnostic archives.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use blackbox::cli::{
    Cli, Command, ConfigCommand, ExportCommand, ListCommand, ListSelection, RecordCommand,
    StatusCommand,
};
use blackbox::storage::{Snapshot, SnapshotStore, SqliteStore};
use blackbox::{
    init_logging, Config, DirectoryDownloader, ErrorRecord, HistoryRecord, HostEnvironment,
    Manager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Error(cmd) => handle_error(config, cmd).await,
        Command::History(cmd) => handle_history(config, cmd).await,
        Command::List(cmd) => handle_list(&config, &cmd).await,
        Command::Export(cmd) => handle_export(config, cmd).await,
        Command::Clear => handle_clear(config).await,
        Command::Status(cmd) => handle_status(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let path = config.database_path();
    SqliteStore::open(&path, config.recorder.store_name.clone())
        .with_context(|| format!("failed to open {}", path.display()))
}

fn build_manager(config: Config, store: SqliteStore, download_dir: Option<PathBuf>) -> Manager {
    let dir = download_dir.unwrap_or_else(|| config.download_dir());
    Manager::new(
        config,
        Arc::new(store),
        Arc::new(HostEnvironment),
        Arc::new(DirectoryDownloader::new(dir)),
    )
}

/// A manager starting a new session, with retention applied.
async fn start_session(config: Config) -> anyhow::Result<Manager> {
    let store = open_store(&config)?;
    let manager = build_manager(config, store, None);
    if manager.initialize_retention().await? {
        tracing::debug!("Previous session discarded");
    }
    Ok(manager)
}

async fn handle_error(config: Config, cmd: RecordCommand) -> anyhow::Result<()> {
    let manager = start_session(config).await?;
    let recorded = manager.record_error(ErrorRecord::new(cmd.key, cmd.description))?;
    recorded.persisted().await?;
    println!("Recorded error: {recorded}");
    Ok(())
}

async fn handle_history(config: Config, cmd: RecordCommand) -> anyhow::Result<()> {
    let manager = start_session(config).await?;
    let key = cmd.key.clone();
    manager
        .record_history(HistoryRecord::new(cmd.key, cmd.description))?
        .wait()
        .await?;
    println!("Recorded history: {key}");
    Ok(())
}

async fn load_snapshot(config: &Config) -> anyhow::Result<Snapshot> {
    let store = open_store(config)?;
    Ok(store
        .get(&config.recorder.store_key)
        .await?
        .unwrap_or_default())
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let mut snapshot = load_snapshot(config).await?;
    match cmd.selection() {
        ListSelection::All => {}
        ListSelection::Errors => snapshot.history.clear(),
        ListSelection::History => snapshot.errors.clear(),
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("No records.");
        return Ok(());
    }

    for record in &snapshot.errors {
        println!(
            "{}  error    {}{}",
            record.timestamp().format("%Y-%m-%d %H:%M:%S"),
            record.key(),
            record
                .description()
                .map(|d| format!(" - {d}"))
                .unwrap_or_default()
        );
    }
    for record in &snapshot.history {
        println!(
            "{}  history  {}{}",
            record.timestamp().format("%Y-%m-%d %H:%M:%S"),
            record.key(),
            record
                .description()
                .map(|d| format!(" - {d}"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn handle_export(config: Config, cmd: ExportCommand) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let manager = build_manager(config, store, cmd.output);
    manager.restore().await?;

    let archive = manager.export(!cmd.no_download).await?;

    println!("Archive:  {}", archive.file_name);
    println!("Size:     {} bytes", archive.len());
    println!("BLAKE3:   {}", archive.digest());
    if let Some(path) = &archive.saved_to {
        println!("Saved to: {}", path.display());
    }
    Ok(())
}

async fn handle_clear(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    build_manager(config, store, None).clear().await?;
    println!("All records cleared.");
    Ok(())
}

async fn handle_status(config: &Config, cmd: &StatusCommand) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let snapshot = store
        .get(&config.recorder.store_key)
        .await?
        .unwrap_or_default();
    let updated = store.last_updated(&config.recorder.store_key).await?;
    let mode = if config.recorder.debug {
        "diagnostic"
    } else {
        "normal"
    };

    if cmd.json {
        let status = serde_json::json!({
            "database_path": config.database_path(),
            "mode": mode,
            "errors": snapshot.errors.len(),
            "history": snapshot.history.len(),
            "last_updated": updated,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("bbx status");
        println!("----------");
        println!("Database:      {}", config.database_path().display());
        println!("Mode:          {mode}");
        println!("Errors:        {}", snapshot.errors.len());
        println!("History:       {}", snapshot.history.len());
        match updated {
            Some(at) => println!("Last updated:  {}", at.to_rfc3339()),
            None => println!("Last updated:  never"),
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                let mut shown = config.clone();
                if shown.export.password.is_some() {
                    shown.export.password = Some("********".to_string());
                }
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Recorder]");
                println!("  Diagnostic mode:    {}", config.recorder.debug);
                println!("  Store name:         {}", config.recorder.store_name);
                println!("  Store key:          {}", config.recorder.store_key);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Export]");
                println!("  File prefix:        {}", config.export.file_prefix);
                println!("  File extension:     {}", config.export.file_extension);
                println!("  Debug file name:    {}", config.export.debug_file_name);
                let protected = config.export.active_password().is_some();
                println!("  Protected:          {protected}");
                let strength = config.export.encryption_strength;
                println!("  Encryption:         {strength:?}");
                println!("  Download dir:       {}", config.download_dir().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
