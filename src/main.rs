//! Tic-tac-toe backend - CLI entry point.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use tictactoe_backend::{
    AppState, ConnectionRegistry, GameId, GameService, GameStore, ServerConfig, router,
};
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tictactoe_backend=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            storage_dir,
            idle_timeout_secs,
        } => {
            let base = match config {
                Some(path) => ServerConfig::from_file(&path)?,
                None => ServerConfig::default(),
            };
            let config = base.with_overrides(host, port, storage_dir, idle_timeout_secs)?;
            run_server(config).await
        }
        Command::Migrate {
            game_id,
            storage_dir,
        } => run_migrate(game_id, storage_dir),
    }
}

/// Run the HTTP and WebSocket server
#[instrument(skip_all, fields(addr = %config.bind_addr()))]
async fn run_server(config: ServerConfig) -> Result<()> {
    info!(storage_dir = %config.storage_dir().display(), "Starting tic-tac-toe server");

    let store = GameStore::new(config.storage_dir())?;
    let state = AppState::new(
        GameService::new(store),
        ConnectionRegistry::new(),
        *config.idle_timeout_secs(),
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;
    info!("Server ready at http://{}/", config.bind_addr());

    axum::serve(listener, app).await?;
    Ok(())
}

/// Re-apply pending migrations to one game database
#[instrument]
fn run_migrate(game_id: String, storage_dir: PathBuf) -> Result<()> {
    let game_id: GameId = game_id.parse()?;
    let store = GameStore::new(&storage_dir)?;
    let applied = store.migrate(&game_id)?;
    info!(game_id = %game_id, applied, "Migration complete");
    Ok(())
}
