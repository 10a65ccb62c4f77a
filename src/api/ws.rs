//! WebSocket endpoint.
//!
//! Each socket gets a writer task draining its outbound queue and a read
//! loop that handles one envelope at a time. Replies are queued on the
//! socket's own connection, so they work before registration.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::api::AppState;
use crate::api::protocol::{ClientEnvelope, GameView, MessageKind, ReplyKind, ServerEnvelope};
use crate::game::GameId;
use crate::registry::{Connection, Outbound};
use crate::service::GameError;

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[instrument(skip_all, fields(connection))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = Connection::new(tx);
    tracing::Span::current().record("connection", tracing::field::display(connection.id()));
    info!("WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                Outbound::Text(text) => {
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        debug!(error = %e, "Write failed, stopping writer");
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let idle = Duration::from_secs(state.idle_timeout_secs());
    loop {
        let next = match tokio::time::timeout(idle, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                info!(idle_secs = idle.as_secs(), "Connection idle, closing");
                break;
            }
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                handle_text(&state, &connection, text.as_str()).await;
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!("Client closed connection");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "Read failed");
                break;
            }
        }
    }

    state.registry().unregister_connection(connection.id());
    connection.close();
    drop(connection);
    let _ = writer.await;
    info!("WebSocket disconnected");
}

/// Handles one inbound text frame.
#[instrument(skip(state, connection, text), fields(connection = %connection.id()))]
pub(crate) async fn handle_text(state: &AppState, connection: &Connection, text: &str) {
    let envelope: ClientEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Invalid message");
            connection.send_json(&ServerEnvelope::reply(ReplyKind::InvalidMessage));
            return;
        }
    };

    let Ok(kind) = envelope.message.parse::<MessageKind>() else {
        warn!(message = %envelope.message, "Unknown message");
        connection.send_json(&ServerEnvelope::reply(ReplyKind::UnknownMessage));
        return;
    };
    debug!(%kind, player = %envelope.player_uuid, game_id = %envelope.game_id, "Message received");

    let reply = match kind {
        MessageKind::Heartbeat => ServerEnvelope::reply(ReplyKind::Heartbeat),
        MessageKind::Register => match membership(&envelope) {
            Ok((player, game_id)) => {
                state.registry().register(player, connection.clone());
                state.registry().join_game(player, &game_id);
                ServerEnvelope::for_game(ReplyKind::Registered, game_id.to_string())
            }
            Err(e) => ServerEnvelope::error(envelope.game_id.clone(), e.to_string()),
        },
        MessageKind::JoinGame => match membership(&envelope) {
            Ok((player, game_id)) => {
                state.registry().join_game(player, &game_id);
                ServerEnvelope::for_game(ReplyKind::JoinedGame, game_id.to_string())
            }
            Err(e) => ServerEnvelope::error(envelope.game_id.clone(), e.to_string()),
        },
        MessageKind::LeaveGame => {
            if !envelope.player_uuid.is_empty() {
                state.registry().unregister(&envelope.player_uuid);
            }
            ServerEnvelope::for_game(ReplyKind::LeftGame, envelope.game_id.clone())
        }
        MessageKind::GetGameState => match state
            .service()
            .game_state(&envelope.player_uuid, &envelope.game_id)
            .await
        {
            Ok(record) => ServerEnvelope::game_state(GameView::from(&record)),
            Err(e) => ServerEnvelope::error(envelope.game_id.clone(), e.to_string()),
        },
    };

    connection.send_json(&reply);
}

fn membership(envelope: &ClientEnvelope) -> Result<(&str, GameId), GameError> {
    if envelope.player_uuid.trim().is_empty() {
        return Err(GameError::MissingField {
            field: "player_uuid",
        });
    }
    if envelope.game_id.trim().is_empty() {
        return Err(GameError::MissingField { field: "game_id" });
    }
    let game_id = envelope.game_id.parse()?;
    Ok((envelope.player_uuid.as_str(), game_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GameStore;
    use crate::registry::ConnectionRegistry;
    use crate::service::GameService;
    use serde_json::Value;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let service = GameService::new(GameStore::new(dir.path()).unwrap());
        let state = AppState::new(service, ConnectionRegistry::new(), 90);
        (dir, state)
    }

    fn connection() -> (Connection, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    fn next_json(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Value {
        match rx.try_recv().unwrap() {
            Outbound::Text(text) => serde_json::from_str(&text).unwrap(),
            Outbound::Close => panic!("unexpected close"),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_before_register() {
        let (_dir, state) = setup();
        let (conn, mut rx) = connection();

        handle_text(&state, &conn, r#"{"message":"heartbeat"}"#).await;

        assert_eq!(next_json(&mut rx)["message"], "heartbeat");
        assert!(!state.registry().is_connected("alice"));
    }

    #[tokio::test]
    async fn test_invalid_and_unknown_messages() {
        let (_dir, state) = setup();
        let (conn, mut rx) = connection();

        handle_text(&state, &conn, "not json").await;
        assert_eq!(next_json(&mut rx)["message"], "invalid_message");

        handle_text(&state, &conn, r#"{"message":"dance","player_uuid":"a"}"#).await;
        assert_eq!(next_json(&mut rx)["message"], "unknown_message");
    }

    #[tokio::test]
    async fn test_register_join_and_leave() {
        let (_dir, state) = setup();
        let (conn, mut rx) = connection();
        let game: GameId = "abc123".parse().unwrap();

        handle_text(
            &state,
            &conn,
            r#"{"message":"register","player_uuid":"alice","game_id":"abc123"}"#,
        )
        .await;
        let reply = next_json(&mut rx);
        assert_eq!(reply["message"], "registered");
        assert_eq!(reply["game_id"], "abc123");
        assert!(state.registry().is_connected("alice"));
        assert_eq!(state.registry().members(&game), vec!["alice".to_string()]);

        handle_text(
            &state,
            &conn,
            r#"{"message":"leave_game","player_uuid":"alice","game_id":"abc123"}"#,
        )
        .await;
        assert_eq!(next_json(&mut rx)["message"], "left_game");
        assert!(!state.registry().is_connected("alice"));
        assert!(state.registry().members(&game).is_empty());
    }

    #[tokio::test]
    async fn test_join_game_adds_membership_without_binding() {
        let (_dir, state) = setup();
        let (conn, mut rx) = connection();
        let game: GameId = "abc123".parse().unwrap();

        handle_text(
            &state,
            &conn,
            r#"{"message":"join_game","player_uuid":"carol","game_id":"abc123"}"#,
        )
        .await;

        let reply = next_json(&mut rx);
        assert_eq!(reply["message"], "joined_game");
        assert_eq!(reply["game_id"], "abc123");
        assert_eq!(state.registry().members(&game), vec!["carol".to_string()]);
        assert!(!state.registry().is_connected("carol"));
        assert_eq!(state.registry().unregister_connection(conn.id()), None);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_game_id() {
        let (_dir, state) = setup();
        let (conn, mut rx) = connection();

        handle_text(
            &state,
            &conn,
            r#"{"message":"register","player_uuid":"alice","game_id":"../etc"}"#,
        )
        .await;
        assert_eq!(next_json(&mut rx)["message"], "error");
        assert!(!state.registry().is_connected("alice"));
    }

    #[tokio::test]
    async fn test_get_game_state_returns_view() {
        let (_dir, state) = setup();
        let (conn, mut rx) = connection();
        let record = state.service().create_game("alice").await.unwrap();
        let msg = format!(
            r#"{{"message":"get_game_state","player_uuid":"alice","game_id":"{}"}}"#,
            record.game_id()
        );

        handle_text(&state, &conn, &msg).await;

        let reply = next_json(&mut rx);
        assert_eq!(reply["message"], "game_state");
        assert_eq!(reply["state"]["game_state"], ".........x");
        assert_eq!(reply["state"]["status"], "active");
    }

    #[tokio::test]
    async fn test_get_game_state_unknown_game() {
        let (_dir, state) = setup();
        let (conn, mut rx) = connection();

        handle_text(
            &state,
            &conn,
            r#"{"message":"get_game_state","player_uuid":"alice","game_id":"nosuch"}"#,
        )
        .await;

        let reply = next_json(&mut rx);
        assert_eq!(reply["message"], "error");
        assert!(reply["error"].as_str().unwrap().contains("not found"));
    }
}
