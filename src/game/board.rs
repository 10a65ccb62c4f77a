//! Board representation and its 10-character wire/storage encoding.
//!
//! The encoded form is nine cells in row-major order followed by the turn
//! marker, e.g. `x.o......o`. Cells are `.` (empty), `x` or `o`; the turn
//! marker is `x`, `o`, or `.` once the game is over.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::instrument;

/// Character used for an empty cell.
pub const EMPTY_CHAR: char = '.';

/// Character used for the turn marker once the game is over.
pub const TERMINAL_CHAR: char = '.';

/// Length of an encoded board (9 cells + turn marker).
pub const ENCODED_LEN: usize = 10;

/// One of the two playing symbols.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Symbol {
    /// X (moves first).
    X,
    /// O (moves second).
    O,
}

impl Symbol {
    /// Returns the other symbol.
    pub fn opponent(self) -> Self {
        match self {
            Symbol::X => Symbol::O,
            Symbol::O => Symbol::X,
        }
    }

    /// Character used for this symbol in the encoded board.
    pub fn as_char(self) -> char {
        match self {
            Symbol::X => 'x',
            Symbol::O => 'o',
        }
    }

    /// Parses an encoded-board character. Only lowercase is accepted.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'x' => Some(Symbol::X),
            'o' => Some(Symbol::O),
            _ => None,
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Square {
    /// Empty square.
    Empty,
    /// Square holding a symbol.
    Occupied(Symbol),
}

impl Square {
    fn as_char(self) -> char {
        match self {
            Square::Empty => EMPTY_CHAR,
            Square::Occupied(symbol) => symbol.as_char(),
        }
    }

    fn from_char(c: char) -> Option<Self> {
        if c == EMPTY_CHAR {
            Some(Square::Empty)
        } else {
            Symbol::from_char(c).map(Square::Occupied)
        }
    }
}

/// The trailing turn marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnMarker {
    /// The game is active and this symbol moves next.
    Next(Symbol),
    /// The game has ended.
    Terminal,
}

impl TurnMarker {
    fn as_char(self) -> char {
        match self {
            TurnMarker::Next(symbol) => symbol.as_char(),
            TurnMarker::Terminal => TERMINAL_CHAR,
        }
    }

    fn from_char(c: char) -> Option<Self> {
        if c == TERMINAL_CHAR {
            Some(TurnMarker::Terminal)
        } else {
            Symbol::from_char(c).map(TurnMarker::Next)
        }
    }
}

/// Error returned when an encoded board cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum MalformedBoard {
    /// The string is not exactly 10 characters long.
    #[display("Malformed board: expected 10 characters, got {len}")]
    Length {
        /// Number of characters found.
        len: usize,
    },
    /// A character is outside the allowed set for its position.
    #[display("Malformed board: invalid character {found:?} at index {index}")]
    InvalidChar {
        /// Index of the offending character.
        index: usize,
        /// The offending character.
        found: char,
    },
}

impl std::error::Error for MalformedBoard {}

/// 3x3 tic-tac-toe board plus the turn marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Board {
    squares: [Square; 9],
    turn: TurnMarker,
}

impl Board {
    /// Creates a blank board with X to move.
    pub fn new() -> Self {
        Self {
            squares: [Square::Empty; 9],
            turn: TurnMarker::Next(Symbol::X),
        }
    }

    /// Creates a board from its parts.
    pub fn from_parts(squares: [Square; 9], turn: TurnMarker) -> Self {
        Self { squares, turn }
    }

    /// Gets the square at the given index (0-8).
    pub fn get(&self, index: usize) -> Option<Square> {
        self.squares.get(index).copied()
    }

    /// Returns all squares in row-major order.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Returns the turn marker.
    pub fn turn(&self) -> TurnMarker {
        self.turn
    }

    /// Whether every square is occupied.
    pub fn is_full(&self) -> bool {
        self.squares.iter().all(|s| *s != Square::Empty)
    }

    /// Number of occupied squares.
    pub fn occupied(&self) -> usize {
        self.squares.iter().filter(|s| **s != Square::Empty).count()
    }

    /// Encodes the board as its 10-character string.
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(ENCODED_LEN);
        out.extend(self.squares.iter().map(|s| s.as_char()));
        out.push(self.turn.as_char());
        out
    }

    /// Decodes a 10-character string.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedBoard`] if the length is wrong or a character is
    /// outside the allowed set for its position.
    #[instrument(level = "trace")]
    pub fn decode(encoded: &str) -> Result<Self, MalformedBoard> {
        let chars: Vec<char> = encoded.chars().collect();
        if chars.len() != ENCODED_LEN {
            return Err(MalformedBoard::Length { len: chars.len() });
        }

        let mut squares = [Square::Empty; 9];
        for (index, (slot, &c)) in squares.iter_mut().zip(&chars).enumerate() {
            *slot = Square::from_char(c).ok_or(MalformedBoard::InvalidChar { index, found: c })?;
        }

        let last = chars[ENCODED_LEN - 1];
        let turn = TurnMarker::from_char(last).ok_or(MalformedBoard::InvalidChar {
            index: ENCODED_LEN - 1,
            found: last,
        })?;

        Ok(Self { squares, turn })
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Board {
    type Err = MalformedBoard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl From<Board> for String {
    fn from(board: Board) -> Self {
        board.encode()
    }
}

impl TryFrom<String> for Board {
    type Error = MalformedBoard;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::decode(&value)
    }
}
