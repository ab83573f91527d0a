use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Inspect and maintain web sessions stored in a table service
#[derive(Parser, Debug)]
#[command(name = "tablesess", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (defaults to ~/.config/tablesess/config.toml)
    #[arg(short, long, global = true, env = "TABLESESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the table name
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Override the partition name
    #[arg(long, global = true)]
    pub partition: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make sure the session table exists
    Open,

    /// Print the stored payload of a session
    Read {
        /// Session id
        #[arg(required = true)]
        id: String,
    },

    /// Store a payload for a session
    Write {
        /// Session id
        #[arg(required_unless_present = "new")]
        id: Option<String>,

        /// Payload as JSON; a map, or any value stored as-is
        #[arg(short, long)]
        data: String,

        /// Generate a fresh session id instead of naming one
        #[arg(long, conflicts_with = "id")]
        new: bool,
    },

    /// Delete a session
    Destroy {
        /// Session id
        #[arg(required = true)]
        id: String,
    },

    /// Delete sessions not written for longer than the lifetime
    Gc {
        /// Lifetime in seconds (defaults to the configured gc lifetime)
        #[arg(short, long)]
        lifetime: Option<u64>,
    },

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
