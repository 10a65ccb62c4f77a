//! JSON payloads exchanged over HTTP and WebSocket.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

use crate::db::GameRecord;
use crate::game::{Board, GameId, PlayerId};

/// Client-facing view of a game's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct GameView {
    game_id: GameId,
    /// Encoded board, e.g. `"....x...."` plus the turn marker.
    game_state: Board,
    player_x: Option<PlayerId>,
    player_o: Option<PlayerId>,
    /// `active`, `tied`, or the winner's identity.
    status: String,
    revision: i32,
    /// Seconds since the Unix epoch.
    last_update: i64,
}

impl From<&GameRecord> for GameView {
    fn from(record: &GameRecord) -> Self {
        Self {
            game_id: record.game_id().clone(),
            game_state: *record.board(),
            player_x: record.player_x().clone(),
            player_o: record.player_o().clone(),
            status: record.status().to_db_string(),
            revision: *record.revision(),
            last_update: record.last_update().and_utc().timestamp(),
        }
    }
}

/// Response body of `POST /api/v1/game/create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedGame {
    /// Identifier of the new game.
    pub game_id: GameId,
}

/// Body of `POST /api/v1/game/create`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGameRequest {
    /// Requesting player.
    #[serde(default)]
    pub player_uuid: String,
}

/// Body of `POST /api/v1/game/state`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameStateRequest {
    /// Requesting player.
    #[serde(default)]
    pub player_uuid: String,
    /// Target game.
    #[serde(default)]
    pub game_id: String,
}

/// Body of `POST /api/v1/game/choose`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChooseSymbolRequest {
    /// Requesting player.
    #[serde(default)]
    pub player_uuid: String,
    /// Target game.
    #[serde(default)]
    pub game_id: String,
    /// `x` or `o`.
    #[serde(default)]
    pub choice: String,
}

/// Body of `POST /api/v1/game/move`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MakeMoveRequest {
    /// Requesting player.
    #[serde(default)]
    pub player_uuid: String,
    /// Target game.
    #[serde(default)]
    pub game_id: String,
    /// Move token such as `x5`.
    #[serde(default, rename = "move")]
    pub token: String,
}

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// Inbound WebSocket envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientEnvelope {
    /// Sending player.
    #[serde(default)]
    pub player_uuid: String,
    /// Game the message refers to.
    #[serde(default)]
    pub game_id: String,
    /// Message kind, see [`MessageKind`].
    #[serde(default)]
    pub message: String,
}

/// Recognized inbound WebSocket message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    /// Keepalive.
    Heartbeat,
    /// Bind this connection to the player and join the game.
    Register,
    /// Join the game without rebinding the connection.
    JoinGame,
    /// Drop the player's connection and memberships.
    LeaveGame,
    /// Ask for the current game view.
    GetGameState,
}

/// Outbound WebSocket reply kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReplyKind {
    /// Keepalive answer.
    Heartbeat,
    /// Registration accepted.
    Registered,
    /// Membership added.
    JoinedGame,
    /// Player unregistered.
    LeftGame,
    /// Carries a [`GameView`].
    GameState,
    /// The message kind was not recognized.
    UnknownMessage,
    /// The frame was not a valid envelope.
    InvalidMessage,
    /// The request failed; see `error`.
    Error,
}

/// Outbound WebSocket envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    /// Reply kind.
    pub message: ReplyKind,
    /// Game the reply refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    /// Game view for `game_state` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<GameView>,
    /// Failure description for `error` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerEnvelope {
    /// A bare reply of `kind`.
    pub fn reply(kind: ReplyKind) -> Self {
        Self {
            message: kind,
            game_id: None,
            state: None,
            error: None,
        }
    }

    /// A reply of `kind` about `game_id`.
    pub fn for_game(kind: ReplyKind, game_id: impl Into<String>) -> Self {
        Self {
            game_id: Some(game_id.into()),
            ..Self::reply(kind)
        }
    }

    /// A `game_state` push carrying `view`.
    pub fn game_state(view: GameView) -> Self {
        Self {
            message: ReplyKind::GameState,
            game_id: Some(view.game_id.to_string()),
            state: Some(view),
            error: None,
        }
    }

    /// An `error` reply.
    pub fn error(game_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::for_game(ReplyKind::Error, game_id)
        }
    }
}
