//! Tic-tac-toe backend library
//!
//! Creates games, persists every board state, validates moves, and pushes
//! state updates to connected players over WebSocket.
//!
//! # Architecture
//!
//! - **Game**: board codec, move token parsing and the rules engine
//! - **Db**: one append-only SQLite database per game
//! - **Service**: optimistic read-validate-append use cases
//! - **Registry**: live player connections and game membership
//! - **Api**: axum router for HTTP and WebSocket clients
//!
//! # Example
//!
//! ```no_run
//! use tictactoe_backend::{AppState, ConnectionRegistry, GameService, GameStore, router};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = GameStore::new("storage/games/tictactoe")?;
//! let state = AppState::new(GameService::new(store), ConnectionRegistry::new(), 90);
//! let app = router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod api;
mod config;
mod db;
mod game;
mod registry;
mod service;

// Crate-level exports - Game rules
pub use game::{
    Board, EMPTY_CHAR, ENCODED_LEN, GameId, InvalidGameId, LINES, MalformedBoard, MoveError,
    MoveToken, Outcome, PlayerId, Square, Symbol, TERMINAL_CHAR, TokenError, TurnMarker,
    apply_move, winner,
};

// Crate-level exports - Persistence
pub use db::{
    DbError, DbErrorKind, GameRecord, GameRow, GameStatus, GameStore, GameUpdate, MIGRATIONS,
    NewGameRow,
};

// Crate-level exports - Service
pub use service::{GameError, GameService, MAX_ATTEMPTS};

// Crate-level exports - Connections
pub use registry::{Connection, ConnectionId, ConnectionRegistry, Outbound};

// Crate-level exports - HTTP/WebSocket
pub use api::{
    ApiError, AppState, ChooseSymbolRequest, ClientEnvelope, CreateGameRequest, CreatedGame,
    ErrorBody, GameStateRequest, GameView, MakeMoveRequest, MessageKind, ReplyKind,
    ServerEnvelope, router,
};

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig};
