//! Tic-tac-toe domain: board codec, move rules, move tokens, identifiers.

mod board;
mod id;
mod rules;
mod token;

pub use board::{
    Board, EMPTY_CHAR, ENCODED_LEN, MalformedBoard, Square, Symbol, TERMINAL_CHAR, TurnMarker,
};
pub use id::{GameId, InvalidGameId};
pub use rules::{LINES, MoveError, Outcome, apply_move, winner};
pub use token::{MoveToken, TokenError};

/// Opaque player identity supplied by clients.
pub type PlayerId = String;
