//! Game orchestration: read the latest record, validate, append.
//!
//! Every mutation is an optimistic read-modify-write against the
//! [`GameStore`]: the append only succeeds if no other record was written
//! since the read, otherwise the whole step is retried on fresh state.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::db::{DbError, DbErrorKind, GameRecord, GameStatus, GameStore, GameUpdate};
use crate::game::{
    Board, GameId, InvalidGameId, MoveError, MoveToken, Outcome, Symbol, TokenError, apply_move,
};

/// Attempts made before a contended mutation gives up with [`GameError::Conflict`].
pub const MAX_ATTEMPTS: usize = 3;

/// Attempts made to find an unused game id.
const CREATE_ATTEMPTS: usize = 5;

/// Errors reported by [`GameService`].
#[derive(Debug, Clone, derive_more::Display, derive_more::From)]
pub enum GameError {
    /// A required request field is empty.
    #[display("Missing required field '{field}'")]
    #[from(ignore)]
    MissingField {
        /// Field name.
        field: &'static str,
    },
    /// The game id is not well formed.
    #[display("{_0}")]
    InvalidGameId(InvalidGameId),
    /// The symbol choice is neither `x` nor `o`.
    #[display("Player choice must be 'x' or 'o', got {value:?}")]
    #[from(ignore)]
    InvalidSymbol {
        /// The raw value.
        value: String,
    },
    /// The move token could not be parsed.
    #[display("{_0}")]
    Token(TokenError),
    /// The move broke a game rule.
    #[display("{_0}")]
    Move(MoveError),
    /// The requested symbol already belongs to another player.
    #[display("Symbol '{symbol}' is already taken")]
    #[from(ignore)]
    SymbolTaken {
        /// The requested symbol.
        symbol: Symbol,
    },
    /// The player already holds the other symbol.
    #[display("Player already plays '{symbol}'")]
    #[from(ignore)]
    AlreadySeated {
        /// The symbol the player holds.
        symbol: Symbol,
    },
    /// Both symbols are assigned.
    #[display("Players already chosen. Game is in progress.")]
    #[from(ignore)]
    PlayersFull,
    /// The game does not exist.
    #[display("Game '{game_id}' not found")]
    #[from(ignore)]
    NotFound {
        /// The requested game.
        game_id: String,
    },
    /// Concurrent updates kept invalidating this one.
    #[display("Game was updated concurrently, please retry")]
    #[from(ignore)]
    Conflict,
    /// Storage failure.
    #[display("{_0}")]
    #[from(ignore)]
    Storage(DbError),
    /// The blocking storage task failed.
    #[display("Internal error: {_0}")]
    #[from(ignore)]
    Internal(String),
}

impl std::error::Error for GameError {}

impl From<DbError> for GameError {
    fn from(err: DbError) -> Self {
        match err.kind {
            DbErrorKind::NotFound => Self::NotFound {
                game_id: err.message,
            },
            DbErrorKind::Conflict => Self::Conflict,
            DbErrorKind::Corrupt | DbErrorKind::Storage => Self::Storage(err),
        }
    }
}

/// Game use cases on top of a [`GameStore`].
#[derive(Debug, Clone)]
pub struct GameService {
    store: Arc<GameStore>,
}

impl GameService {
    /// Creates a service backed by `store`.
    #[instrument(skip(store), fields(base_dir = %store.base_dir().display()))]
    pub fn new(store: GameStore) -> Self {
        info!("Creating game service");
        Self {
            store: Arc::new(store),
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &GameStore {
        &self.store
    }

    /// Runs a synchronous store operation on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> Result<T, GameError>
    where
        T: Send + 'static,
        F: FnOnce(&GameStore) -> Result<T, DbError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| {
                error!(error = %e, "Storage task failed");
                GameError::Internal(e.to_string())
            })?;
        result.map_err(|e| {
            if e.kind == DbErrorKind::NotFound {
                debug!(error = %e, "Game not found");
            } else if e.kind != DbErrorKind::Conflict {
                error!(error = %e, "Storage failure");
            }
            GameError::from(e)
        })
    }

    /// Creates a new game with a blank board and returns its first record.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MissingField`] if `player` is empty, or a storage
    /// error.
    #[instrument(skip(self))]
    pub async fn create_game(&self, player: &str) -> Result<GameRecord, GameError> {
        require("player_uuid", player)?;

        for attempt in 1..=CREATE_ATTEMPTS {
            let game_id = GameId::generate();
            let id = game_id.clone();
            match self.blocking(move |store| store.create(&id, &Board::new())).await {
                Ok(record) => {
                    info!(game_id = %game_id, player, "Game created");
                    return Ok(record);
                }
                Err(GameError::Conflict) => {
                    warn!(game_id = %game_id, attempt, "Generated game id collided");
                }
                Err(e) => return Err(e),
            }
        }

        Err(GameError::Internal(
            "Could not allocate a unique game id".to_string(),
        ))
    }

    /// Loads the current state of a game.
    ///
    /// # Errors
    ///
    /// Returns an input error for empty or malformed fields,
    /// [`GameError::NotFound`] for unknown games, or a storage error.
    #[instrument(skip(self))]
    pub async fn game_state(&self, player: &str, game_id: &str) -> Result<GameRecord, GameError> {
        require("player_uuid", player)?;
        let game_id = parse_game_id(game_id)?;
        self.latest(&game_id).await
    }

    async fn latest(&self, game_id: &GameId) -> Result<GameRecord, GameError> {
        let id = game_id.clone();
        self.blocking(move |store| store.latest(&id))
            .await
            .map_err(|e| match e {
                GameError::NotFound { .. } => GameError::NotFound {
                    game_id: game_id.to_string(),
                },
                other => other,
            })
    }

    /// Assigns `choice` (`x` or `o`) to `player`.
    ///
    /// Choosing the symbol one already holds returns the current state
    /// without writing a new record.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidSymbol`] for anything but `x`/`o`,
    /// [`GameError::PlayersFull`] once both symbols are assigned,
    /// [`GameError::SymbolTaken`] if another player holds the symbol, or
    /// [`GameError::AlreadySeated`] if the player holds the other symbol.
    #[instrument(skip(self))]
    pub async fn choose_symbol(
        &self,
        player: &str,
        game_id: &str,
        choice: &str,
    ) -> Result<GameRecord, GameError> {
        require("player_uuid", player)?;
        let game_id = parse_game_id(game_id)?;
        let symbol: Symbol = choice.parse().map_err(|_| GameError::InvalidSymbol {
            value: choice.to_string(),
        })?;

        let record = self
            .mutate(&game_id, |current| {
                if current.holder(symbol).map(String::as_str) == Some(player) {
                    debug!(%symbol, "Player already holds symbol");
                    return Ok(None);
                }
                if current.player_x().is_some() && current.player_o().is_some() {
                    return Err(GameError::PlayersFull);
                }
                if current.holder(symbol).is_some() {
                    return Err(GameError::SymbolTaken { symbol });
                }
                if let Some(held) = current.symbol_of(player) {
                    return Err(GameError::AlreadySeated { symbol: held });
                }
                Ok(Some(
                    GameUpdate::from_record(current).with_holder(symbol, player.to_string()),
                ))
            })
            .await?;

        info!(game_id = %game_id, player, %symbol, "Player symbol chosen");
        Ok(record)
    }

    /// Applies a move token such as `"x5"` for `player`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Token`] for a malformed token, or
    /// [`GameError::Move`] when the player does not hold the token's symbol
    /// or the move breaks a rule. Nothing is written on error.
    #[instrument(skip(self))]
    pub async fn make_move(
        &self,
        player: &str,
        game_id: &str,
        token: &str,
    ) -> Result<GameRecord, GameError> {
        require("player_uuid", player)?;
        let game_id = parse_game_id(game_id)?;
        require("move", token)?;
        let token: MoveToken = token.parse()?;
        let symbol = *token.symbol();

        let record = self
            .mutate(&game_id, |current| {
                if current.holder(symbol).map(String::as_str) != Some(player) {
                    return Err(MoveError::NotYourTurn { symbol }.into());
                }

                let (board, outcome) = apply_move(current.board(), symbol, *token.index())?;
                let status = match outcome {
                    Outcome::Continue => GameStatus::Active,
                    Outcome::Won(_) => GameStatus::Won(player.to_string()),
                    Outcome::Tied => GameStatus::Tied,
                };
                Ok(Some(
                    GameUpdate::from_record(current)
                        .with_board(board)
                        .with_status(status),
                ))
            })
            .await?;

        info!(
            game_id = %game_id,
            player,
            board = %record.board(),
            status = ?record.status(),
            "Move applied"
        );
        Ok(record)
    }

    /// Optimistic read-modify-write loop.
    ///
    /// `step` sees the latest record and returns the update to append, or
    /// `None` to leave the game unchanged.
    async fn mutate<F>(&self, game_id: &GameId, step: F) -> Result<GameRecord, GameError>
    where
        F: Fn(&GameRecord) -> Result<Option<GameUpdate>, GameError>,
    {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = self.latest(game_id).await?;
            let Some(update) = step(&current)? else {
                return Ok(current);
            };

            let id = game_id.clone();
            let expected = *current.revision();
            match self
                .blocking(move |store| store.append(&id, expected, &update))
                .await
            {
                Ok(record) => return Ok(record),
                Err(GameError::Conflict) => {
                    warn!(game_id = %game_id, attempt, expected, "Concurrent update, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        warn!(game_id = %game_id, "Giving up after repeated conflicts");
        Err(GameError::Conflict)
    }
}

fn require(field: &'static str, value: &str) -> Result<(), GameError> {
    if value.trim().is_empty() {
        Err(GameError::MissingField { field })
    } else {
        Ok(())
    }
}

fn parse_game_id(raw: &str) -> Result<GameId, GameError> {
    require("game_id", raw)?;
    Ok(raw.parse()?)
}
