//! Per-game SQLite record store.
//!
//! Every game lives in its own database file, `<base_dir>/<game_id>.db`,
//! holding an append-only `game` table. The row with the highest id is the
//! current state and its id is the game's revision.

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::dsl::max;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, GameRecord, GameRow, GameStatus, GameUpdate, schema};
use crate::game::{Board, GameId};

/// Schema migrations applied to every game database.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Repository of game record streams, one SQLite file per game.
#[derive(Debug, Clone)]
pub struct GameStore {
    base_dir: PathBuf,
}

impl GameStore {
    /// Creates a store rooted at `base_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the directory cannot be created.
    #[instrument(skip(base_dir), fields(base_dir = %base_dir.as_ref().display()))]
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, DbError> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir).map_err(|e| {
            DbError::new(format!(
                "Failed to create storage dir '{}': {}",
                base_dir.display(),
                e
            ))
        })?;
        info!(path = %base_dir.display(), "Creating GameStore");
        Ok(Self { base_dir })
    }

    /// Returns the storage directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the database file for `game_id`.
    pub fn path_for(&self, game_id: &GameId) -> PathBuf {
        self.base_dir.join(format!("{}.db", game_id))
    }

    /// Whether a database file exists for `game_id`.
    pub fn exists(&self, game_id: &GameId) -> bool {
        self.path_for(game_id).is_file()
    }

    /// Establishes a connection, creating the file if it does not exist.
    #[instrument(skip(self))]
    fn connection(&self, game_id: &GameId) -> Result<SqliteConnection, DbError> {
        let path = self.path_for(game_id);
        debug!(path = %path.display(), "Establishing connection");
        let url = path
            .to_str()
            .ok_or_else(|| DbError::new(format!("Non UTF-8 database path '{}'", path.display())))?;
        let mut conn = SqliteConnection::establish(url)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", url, e)))?;
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS))?;
        Ok(conn)
    }

    /// Connects to an existing game database.
    fn existing_connection(&self, game_id: &GameId) -> Result<SqliteConnection, DbError> {
        if !self.exists(game_id) {
            debug!(game_id = %game_id, "Game database missing");
            return Err(DbError::not_found(format!("Game '{}' not found", game_id)));
        }
        self.connection(game_id)
    }

    fn run_migrations(conn: &mut SqliteConnection) -> Result<usize, DbError> {
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migrations failed: {}", e)))?;
        Ok(applied.len())
    }

    /// Applies any pending schema migrations to an existing game database.
    ///
    /// Returns the number of migrations applied.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the game does not exist or a migration fails.
    #[instrument(skip(self))]
    pub fn migrate(&self, game_id: &GameId) -> Result<usize, DbError> {
        let mut conn = self.existing_connection(game_id)?;
        let applied = Self::run_migrations(&mut conn)?;
        info!(game_id = %game_id, applied, "Migrations applied");
        Ok(applied)
    }

    /// Creates the game's database and inserts its first record.
    ///
    /// The first record has no players assigned and status `active`.
    ///
    /// # Errors
    ///
    /// Returns a conflict [`DbError`] if the game already exists, or a
    /// storage error if the database cannot be initialized.
    #[instrument(skip(self, board), fields(board = %board))]
    pub fn create(&self, game_id: &GameId, board: &Board) -> Result<GameRecord, DbError> {
        if self.exists(game_id) {
            warn!(game_id = %game_id, "Game id already in use");
            return Err(DbError::conflict(format!("Game '{}' already exists", game_id)));
        }

        let mut conn = self.connection(game_id)?;
        Self::run_migrations(&mut conn)?;

        let first = GameUpdate::new(*board, None, None, GameStatus::Active);
        let row = diesel::insert_into(schema::game::table)
            .values(&first.to_row(Utc::now().naive_utc()))
            .returning(GameRow::as_returning())
            .get_result(&mut conn)?;

        info!(game_id = %game_id, revision = row.id(), "Game created");
        GameRecord::from_row(game_id.clone(), row)
    }

    /// Loads the record with the highest revision.
    ///
    /// # Errors
    ///
    /// Returns a not-found [`DbError`] if the game does not exist, or a
    /// corrupt-record error if the stored board cannot be decoded.
    #[instrument(skip(self))]
    pub fn latest(&self, game_id: &GameId) -> Result<GameRecord, DbError> {
        let mut conn = self.existing_connection(game_id)?;

        let row = schema::game::table
            .order(schema::game::id.desc())
            .select(GameRow::as_select())
            .first(&mut conn)
            .optional()?
            .ok_or_else(|| DbError::not_found(format!("Game '{}' has no records", game_id)))?;

        debug!(
            game_id = %game_id,
            revision = row.id(),
            board = %row.board(),
            "Latest record loaded"
        );
        GameRecord::from_row(game_id.clone(), row)
    }

    /// Appends `update` as the next record, provided the current revision is
    /// still `expected_revision`.
    ///
    /// The check and the insert run in one immediate transaction, so two
    /// writers that read the same revision cannot both succeed.
    ///
    /// # Errors
    ///
    /// Returns a conflict [`DbError`] if another record was appended since
    /// `expected_revision` was read.
    #[instrument(skip(self, update), fields(board = %update.board(), status = ?update.status()))]
    pub fn append(
        &self,
        game_id: &GameId,
        expected_revision: i32,
        update: &GameUpdate,
    ) -> Result<GameRecord, DbError> {
        let mut conn = self.existing_connection(game_id)?;

        let row = conn.immediate_transaction::<_, DbError, _>(|conn| {
            let current: Option<i32> = schema::game::table
                .select(max(schema::game::id))
                .get_result(conn)?;

            if current != Some(expected_revision) {
                warn!(
                    game_id = %game_id,
                    expected_revision,
                    current = ?current,
                    "Stale revision, refusing append"
                );
                return Err(DbError::conflict(format!(
                    "Game '{}' changed: expected revision {}, found {:?}",
                    game_id, expected_revision, current
                )));
            }

            let row = diesel::insert_into(schema::game::table)
                .values(&update.to_row(Utc::now().naive_utc()))
                .returning(GameRow::as_returning())
                .get_result(conn)?;
            Ok(row)
        })?;

        info!(game_id = %game_id, revision = row.id(), "Record appended");
        GameRecord::from_row(game_id.clone(), row)
    }
}
