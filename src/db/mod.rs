//! Durable per-game record store.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::{DbError, DbErrorKind};
pub use models::{GameRecord, GameRow, GameStatus, GameUpdate, NewGameRow};
pub use repository::{GameStore, MIGRATIONS};
