use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tablesess_core::{get_default_config_file, SessionConfig, TableClient};
use tablesess_store::{generate_session_id, SessionData, SessionStore, TableSessionStore};
use tracing::{debug, info};

mod cli;
mod output;

use crate::cli::{Cli, Commands, ConfigCommands};

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Parses a JSON value into a session payload
fn parse_payload(data: &str) -> Result<SessionData> {
    let value: serde_json::Value =
        serde_json::from_str(data).context("Payload is not valid JSON")?;
    Ok(SessionData::from(value))
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Ok(get_default_config_file("tablesess")?),
    }
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let path = config_path(cli)?;
    let mut config = SessionConfig::load(Some(&path))
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    if let Some(table) = &cli.table {
        config.table_name = Some(table.clone());
    }
    if let Some(partition) = &cli.partition {
        config.partition_name = Some(partition.clone());
    }
    Ok(config)
}

fn connect(config: &SessionConfig) -> Result<TableSessionStore<TableClient>> {
    let client = TableClient::from_config(config).context("Failed to initialize table client")?;
    info!(
        "Using table '{}' partition '{}' at {}",
        config.table_name(),
        config.partition_name(),
        client.endpoint()
    );
    Ok(TableSessionStore::from_config(client, config))
}

/// Writes a default config file without reading the existing one
fn init_config(cli: &Cli, force: bool) -> Result<PathBuf> {
    let path = config_path(cli)?;
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    SessionConfig::default()
        .save_to_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote default configuration to {}", path.display().to_string().green());
    Ok(path)
}

fn run_config_command(cli: &Cli, cmd: &ConfigCommands) -> Result<()> {
    match cmd {
        ConfigCommands::Show => output::print_config(&load_config(cli)?)?,
        ConfigCommands::Init { force } => {
            init_config(cli, *force)?;
        }
    }
    Ok(())
}

async fn run_session_command(command: Commands, config: &SessionConfig) -> Result<()> {
    let store = connect(config)?;
    store.open().await.context("Failed to open session table")?;

    match command {
        Commands::Open => {
            info!("Session table '{}' is ready", store.table_name().green());
        }
        Commands::Read { id } => {
            let data = store
                .read(&id)
                .await
                .with_context(|| format!("Failed to read session {}", id))?;
            output::print_session(&id, &data)?;
        }
        Commands::Write { id, data, new } => {
            let payload = parse_payload(&data)?;
            let id = match id {
                Some(id) if !new => id,
                _ => generate_session_id(),
            };
            store
                .write(&id, &payload)
                .await
                .with_context(|| format!("Failed to write session {}", id))?;
            println!("{}", id);
        }
        Commands::Destroy { id } => {
            store
                .destroy(&id)
                .await
                .with_context(|| format!("Failed to destroy session {}", id))?;
            info!("Session {} destroyed", id.green());
        }
        Commands::Gc { lifetime } => {
            let lifetime = lifetime
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.gc_lifetime());
            let report = store
                .gc(lifetime)
                .await
                .context("Failed to collect expired sessions")?;
            output::print_gc_report(&report);
        }
        Commands::Config(_) => bail!("configuration commands do not touch the session table"),
    }

    store.close().await.context("Failed to close session store")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    debug!("Starting tablesess with arguments: {:#?}", cli);

    if let Commands::Config(cmd) = &cli.command {
        return run_config_command(&cli, cmd);
    }

    let config = load_config(&cli)?;
    run_session_command(cli.command, &config).await
}
