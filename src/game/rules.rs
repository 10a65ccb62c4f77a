//! Move validation and resolution.
//!
//! [`apply_move`] is a pure function of (board, move): it never mutates its
//! input and always yields the same result for the same arguments.

use super::board::{Board, Square, Symbol, TurnMarker};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Winning triples in canonical order: rows, columns, diagonals.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The game continues with the other symbol to move.
    Continue,
    /// The move completed a line.
    Won(Symbol),
    /// The move filled the board without completing a line.
    Tied,
}

/// Reason a move was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// Cell index outside 0-8.
    #[display("Cell {index} is out of range (expected 0-8)")]
    OutOfRange {
        /// The requested index.
        index: usize,
    },
    /// The requesting symbol is not the one to move.
    #[display("It's not {symbol}'s turn")]
    NotYourTurn {
        /// The symbol that attempted to move.
        symbol: Symbol,
    },
    /// The board already carries the terminal marker.
    #[display("Game is already over")]
    GameAlreadyOver,
    /// The target cell is not empty.
    #[display("Cell {index} is already occupied")]
    CellOccupied {
        /// The requested index.
        index: usize,
    },
}

impl std::error::Error for MoveError {}

/// Applies `symbol` at `index`, returning the new board and the outcome.
///
/// Checks run in order: range, occupancy, game over, turn.
///
/// # Errors
///
/// Returns a [`MoveError`] describing the first failed check; the input
/// board is left untouched.
#[instrument(fields(board = %board))]
pub fn apply_move(
    board: &Board,
    symbol: Symbol,
    index: usize,
) -> Result<(Board, Outcome), MoveError> {
    let square = board.get(index).ok_or(MoveError::OutOfRange { index })?;

    if square != Square::Empty {
        return Err(MoveError::CellOccupied { index });
    }

    match board.turn() {
        TurnMarker::Terminal => return Err(MoveError::GameAlreadyOver),
        TurnMarker::Next(expected) if expected != symbol => {
            return Err(MoveError::NotYourTurn { symbol });
        }
        TurnMarker::Next(_) => {}
    }

    let mut squares = *board.squares();
    squares[index] = Square::Occupied(symbol);
    let placed = Board::from_parts(squares, TurnMarker::Terminal);

    let (turn, outcome) = if winner(&placed) == Some(symbol) {
        (TurnMarker::Terminal, Outcome::Won(symbol))
    } else if placed.is_full() {
        (TurnMarker::Terminal, Outcome::Tied)
    } else {
        (TurnMarker::Next(symbol.opponent()), Outcome::Continue)
    };

    let next = Board::from_parts(squares, turn);
    debug!(next = %next, ?outcome, "Move applied");
    Ok((next, outcome))
}

/// Returns the symbol owning the first complete line, if any.
pub fn winner(board: &Board) -> Option<Symbol> {
    LINES.iter().find_map(|&[a, b, c]| {
        let sq = board.get(a)?;
        match sq {
            Square::Occupied(symbol) if Some(sq) == board.get(b) && Some(sq) == board.get(c) => {
                Some(symbol)
            }
            _ => None,
        }
    })
}
