//! Game identifiers.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::instrument;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const GENERATED_LEN: usize = 9;
const MAX_LEN: usize = 64;

/// Opaque game identifier.
///
/// Restricted to `[a-z0-9]{1,64}` because it names the game's database file.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

/// Error returned for a string that is not a valid [`GameId`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("Invalid game id {_0:?}: expected 1-64 characters of [a-z0-9]")]
pub struct InvalidGameId(pub String);

impl std::error::Error for InvalidGameId {}

impl GameId {
    /// Generates a fresh random identifier.
    #[instrument]
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let id: String = (0..GENERATED_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for GameId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for GameId {
    type Err = InvalidGameId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= MAX_LEN
            && s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidGameId(s.to_string()))
        }
    }
}

impl TryFrom<String> for GameId {
    type Error = InvalidGameId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_valid() {
        let id = GameId::generate();
        assert_eq!(id.as_str().len(), GENERATED_LEN);
        assert_eq!(id.as_str().parse::<GameId>().unwrap(), id);
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(GameId::generate(), GameId::generate());
    }

    #[test]
    fn test_rejects_path_characters() {
        for raw in ["", "../etc", "ABC", "a b", "game.db"] {
            assert!(raw.parse::<GameId>().is_err(), "{raw:?} should be rejected");
        }
        assert!("x".repeat(65).parse::<GameId>().is_err());
    }
}
