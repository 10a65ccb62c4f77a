//! Database models and domain types.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use derive_setters::Setters;
use diesel::prelude::*;
use tracing::instrument;

use crate::db::{DbError, schema};
use crate::game::{Board, GameId, PlayerId, Symbol, TurnMarker, winner};

/// One persisted state of a game.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::game)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GameRow {
    id: i32,
    board: String,
    player_x: Option<String>,
    player_o: Option<String>,
    last_update: NaiveDateTime,
    status: String,
}

/// Insertable row for appending a new game state.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::game)]
pub struct NewGameRow {
    board: String,
    player_x: Option<String>,
    player_o: Option<String>,
    last_update: NaiveDateTime,
    status: String,
}

/// Lifecycle status of a game.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GameStatus {
    /// Moves are still accepted.
    Active,
    /// The named player completed a line.
    Won(PlayerId),
    /// The board filled without a winner.
    Tied,
}

impl GameStatus {
    /// Converts status to the string stored in the database.
    ///
    /// A win is stored as the winner's identity.
    pub fn to_db_string(&self) -> String {
        match self {
            Self::Active => "active".to_string(),
            Self::Tied => "tied".to_string(),
            Self::Won(player) => player.clone(),
        }
    }

    /// Parses status from the string stored in the database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the string is empty.
    #[instrument(skip(s), fields(s = %s))]
    pub fn from_db_string(s: &str) -> Result<Self, DbError> {
        match s {
            "active" => Ok(Self::Active),
            "tied" => Ok(Self::Tied),
            "" => Err(DbError::corrupt("Empty game status")),
            winner => Ok(Self::Won(winner.to_string())),
        }
    }
}

/// Decoded current state of a game, as returned by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct GameRecord {
    game_id: GameId,
    revision: i32,
    board: Board,
    player_x: Option<PlayerId>,
    player_o: Option<PlayerId>,
    last_update: NaiveDateTime,
    status: GameStatus,
}

impl GameRecord {
    /// Decodes a stored row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the board or status is corrupt.
    #[instrument(skip(row), fields(game_id = %game_id, revision = row.id))]
    pub fn from_row(game_id: GameId, row: GameRow) -> Result<Self, DbError> {
        let board = Board::decode(&row.board)?;
        let stored = GameStatus::from_db_string(&row.status)?;
        let mut record = Self {
            game_id,
            revision: row.id,
            board,
            player_x: row.player_x,
            player_o: row.player_o,
            last_update: row.last_update,
            status: GameStatus::Active,
        };
        record.status = record.reconcile(stored);
        Ok(record)
    }

    /// Resolves the stored status against the board.
    ///
    /// A win is stored as the winner's identity, so a player named `active`
    /// or `tied` reads back as that status. A finished board with a
    /// complete line always reports `Won` for the line's holder.
    fn reconcile(&self, stored: GameStatus) -> GameStatus {
        if self.board.turn() != TurnMarker::Terminal {
            return stored;
        }
        match winner(&self.board) {
            Some(symbol) if !matches!(stored, GameStatus::Won(_)) => self
                .holder(symbol)
                .cloned()
                .map_or(stored, GameStatus::Won),
            None if stored == GameStatus::Active => GameStatus::Tied,
            _ => stored,
        }
    }

    /// Returns the player holding `symbol`, if assigned.
    pub fn holder(&self, symbol: Symbol) -> Option<&PlayerId> {
        match symbol {
            Symbol::X => self.player_x.as_ref(),
            Symbol::O => self.player_o.as_ref(),
        }
    }

    /// Returns the symbol held by `player`, if any.
    pub fn symbol_of(&self, player: &str) -> Option<Symbol> {
        if self.player_x.as_deref() == Some(player) {
            Some(Symbol::X)
        } else if self.player_o.as_deref() == Some(player) {
            Some(Symbol::O)
        } else {
            None
        }
    }
}

/// Full content of the next row to append for a game.
#[derive(Debug, Clone, PartialEq, Eq, new, Getters, Setters)]
#[setters(prefix = "with_")]
pub struct GameUpdate {
    board: Board,
    player_x: Option<PlayerId>,
    player_o: Option<PlayerId>,
    status: GameStatus,
}

impl GameUpdate {
    /// Starts an update that carries the record's current values forward.
    pub fn from_record(record: &GameRecord) -> Self {
        Self {
            board: record.board,
            player_x: record.player_x.clone(),
            player_o: record.player_o.clone(),
            status: record.status.clone(),
        }
    }

    /// Sets the holder of `symbol`.
    pub fn with_holder(self, symbol: Symbol, player: PlayerId) -> Self {
        match symbol {
            Symbol::X => self.with_player_x(Some(player)),
            Symbol::O => self.with_player_o(Some(player)),
        }
    }

    /// Converts into an insertable row stamped with `now`.
    pub(crate) fn to_row(&self, now: NaiveDateTime) -> NewGameRow {
        NewGameRow::new(
            self.board.encode(),
            self.player_x.clone(),
            self.player_o.clone(),
            now,
            self.status.to_db_string(),
        )
    }
}
