//! Command-line interface for tictactoe_backend.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multiplayer tic-tac-toe backend
#[derive(Parser, Debug)]
#[command(name = "tictactoe_backend")]
#[command(about = "Tic-tac-toe game server with live WebSocket updates", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP and WebSocket server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding the per-game databases
        #[arg(long)]
        storage_dir: Option<PathBuf>,

        /// Seconds before a silent WebSocket is closed
        #[arg(long)]
        idle_timeout_secs: Option<u64>,
    },

    /// Apply pending schema migrations to one game database
    Migrate {
        /// Game to migrate
        #[arg(long)]
        game_id: String,

        /// Directory holding the per-game databases
        #[arg(long, default_value = "storage/games/tictactoe")]
        storage_dir: PathBuf,
    },
}
