//! Parsing of the 2-character move token sent by clients (e.g. `"x5"`).

use super::board::Symbol;
use std::str::FromStr;

/// A parsed move token: the symbol and a 0-based cell index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_getters::Getters)]
pub struct MoveToken {
    symbol: Symbol,
    index: usize,
}

/// Reason a move token was rejected.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum TokenError {
    /// Not a symbol followed by a single digit.
    #[display("Malformed move {token:?}: expected a symbol and a cell digit, e.g. \"x5\"")]
    Malformed {
        /// The raw token.
        token: String,
    },
    /// The digit is not in 1-9.
    #[display("Cell {digit} is out of range (expected 1-9)")]
    OutOfRange {
        /// The raw digit.
        digit: u32,
    },
}

impl std::error::Error for TokenError {}

impl FromStr for MoveToken {
    type Err = TokenError;

    /// The symbol is case-insensitive; the digit is 1-based.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || TokenError::Malformed {
            token: s.to_string(),
        };

        let mut chars = s.chars();
        let (Some(sym), Some(digit), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(malformed());
        };

        let symbol = Symbol::from_char(sym.to_ascii_lowercase()).ok_or_else(malformed)?;
        let digit = digit.to_digit(10).ok_or_else(malformed)?;
        if !(1..=9).contains(&digit) {
            return Err(TokenError::OutOfRange { digit });
        }

        Ok(Self {
            symbol,
            index: digit as usize - 1,
        })
    }
}
