//! Live connection registry for pushing game updates to players.
//!
//! Maps each player to exactly one live connection, each connection back to
//! its player, and each game to the set of players following it. All maps
//! sit behind one mutex; socket I/O never happens under the lock because
//! connections are just handles to per-socket outbound queues.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::game::{GameId, PlayerId};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
#[display("conn-{_0}")]
pub struct ConnectionId(u64);

/// Frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text frame carrying serialized JSON.
    Text(String),
    /// Close the connection.
    Close,
}

/// Handle to a live connection's outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    /// Wraps the sending half of a connection's outbound queue.
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            tx,
        }
    }

    /// Returns the connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a text frame. Returns `false` if the connection is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.tx.send(Outbound::Text(text)).is_ok()
    }

    /// Serializes `payload` and queues it. Returns `false` on failure.
    pub fn send_json<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!(connection = %self.id, error = %e, "Failed to serialize payload");
                false
            }
        }
    }

    /// Queues a close frame.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    connections: HashMap<PlayerId, Connection>,
    owners: HashMap<ConnectionId, PlayerId>,
    games: HashMap<GameId, HashSet<PlayerId>>,
}

impl RegistryState {
    fn remove_player(&mut self, player: &str) -> Option<Connection> {
        let removed = self.connections.remove(player);
        if let Some(conn) = &removed {
            self.owners.remove(&conn.id());
        }
        self.games.retain(|_, members| {
            members.remove(player);
            !members.is_empty()
        });
        removed
    }
}

/// Shared registry of live connections and game membership.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating connection registry");
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `player` to `connection`.
    ///
    /// A previous connection for the same player is closed immediately and
    /// forgotten, so its own teardown will not unregister the player. A
    /// connection serves one player at a time: if it was bound to another
    /// player, that player is unregistered first.
    #[instrument(skip(self, connection), fields(connection = %connection.id()))]
    pub fn register(&self, player: &str, connection: Connection) {
        let superseded = {
            let id = connection.id();
            let mut state = self.lock();
            let displaced = state
                .owners
                .get(&id)
                .filter(|owner| owner.as_str() != player)
                .cloned();
            if let Some(owner) = displaced {
                info!(previous_owner = %owner, "Connection rebound, unregistering previous owner");
                state.remove_player(&owner);
            }
            state.owners.insert(id, player.to_string());
            let previous = state.connections.insert(player.to_string(), connection);
            let previous = previous.filter(|prev| prev.id() != id);
            if let Some(prev) = &previous {
                state.owners.remove(&prev.id());
            }
            previous
        };

        match superseded {
            Some(prev) => {
                info!(player, previous = %prev.id(), "Player reconnected, closing old connection");
                prev.close();
            }
            None => info!(player, "Player connected"),
        }
    }

    /// Adds `player` to the membership set of `game_id`. Idempotent.
    #[instrument(skip(self))]
    pub fn join_game(&self, player: &str, game_id: &GameId) {
        let inserted = self
            .lock()
            .games
            .entry(game_id.clone())
            .or_default()
            .insert(player.to_string());
        debug!(inserted, "Player joined game");
    }

    /// Removes the player's connection and every game membership.
    #[instrument(skip(self))]
    pub fn unregister(&self, player: &str) {
        let removed = self.lock().remove_player(player);
        info!(had_connection = removed.is_some(), "Player unregistered");
    }

    /// Teardown hook for a closed connection.
    ///
    /// Unregisters the owning player only if `connection_id` is still that
    /// player's current connection. Returns the player that was removed.
    #[instrument(skip(self))]
    pub fn unregister_connection(&self, connection_id: ConnectionId) -> Option<PlayerId> {
        let mut state = self.lock();
        let player = state.owners.remove(&connection_id)?;
        let current = state
            .connections
            .get(&player)
            .is_some_and(|c| c.id() == connection_id);
        if current {
            state.remove_player(&player);
            info!(player = %player, "Connection closed, player unregistered");
            Some(player)
        } else {
            debug!(player = %player, "Stale connection closed");
            None
        }
    }

    /// Sends `payload` to `player` if connected. Failures are logged and dropped.
    #[instrument(skip(self, payload))]
    pub fn send_to_player<T: Serialize + ?Sized>(&self, player: &str, payload: &T) {
        let connection = self.lock().connections.get(player).cloned();
        match connection {
            Some(conn) => {
                if !conn.send_json(payload) {
                    warn!(player, connection = %conn.id(), "Send failed, dropping message");
                }
            }
            None => debug!(player, "No live connection, skipping"),
        }
    }

    /// Sends `payload` to every member of `game_id`. Delivery order is unspecified.
    #[instrument(skip(self, payload))]
    pub fn send_to_game<T: Serialize + ?Sized>(&self, game_id: &GameId, payload: &T) {
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to serialize game payload");
                return;
            }
        };

        let recipients: Vec<(PlayerId, Option<Connection>)> = {
            let state = self.lock();
            state
                .games
                .get(game_id)
                .map(|members| {
                    members
                        .iter()
                        .map(|p| (p.clone(), state.connections.get(p).cloned()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut delivered = 0usize;
        for (player, connection) in &recipients {
            match connection {
                Some(conn) if conn.send_text(text.clone()) => delivered += 1,
                Some(conn) => {
                    warn!(player = %player, connection = %conn.id(), "Send failed, dropping")
                }
                None => debug!(player = %player, "Member has no live connection"),
            }
        }
        debug!(members = recipients.len(), delivered, "Game fan-out complete");
    }

    /// Whether `player` has a live connection.
    pub fn is_connected(&self, player: &str) -> bool {
        self.lock().connections.contains_key(player)
    }

    /// Current members of `game_id`, sorted.
    pub fn members(&self, game_id: &GameId) -> Vec<PlayerId> {
        let mut members: Vec<PlayerId> = self
            .lock()
            .games
            .get(game_id)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection() -> (Connection, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    fn game(id: &str) -> GameId {
        id.parse().unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(frame);
        }
        out
    }

    #[test]
    fn test_send_to_player_without_connection_is_noop() {
        let registry = ConnectionRegistry::new();
        registry.send_to_player("ghost", &json!({"message": "hi"}));
        assert!(!registry.is_connected("ghost"));
    }

    #[test]
    fn test_reregister_delivers_only_to_newest() {
        let registry = ConnectionRegistry::new();
        let (c1, mut rx1) = connection();
        let (c2, mut rx2) = connection();

        registry.register("alice", c1);
        registry.register("alice", c2);
        registry.send_to_player("alice", &json!({"message": "ping"}));

        assert_eq!(drain(&mut rx1), vec![Outbound::Close]);
        assert_eq!(
            drain(&mut rx2),
            vec![Outbound::Text(r#"{"message":"ping"}"#.to_string())]
        );
    }

    #[test]
    fn test_register_twice_on_same_connection_keeps_it_open() {
        let registry = ConnectionRegistry::new();
        let (c, mut rx) = connection();
        let id = c.id();

        registry.register("alice", c.clone());
        registry.register("alice", c);

        assert!(drain(&mut rx).is_empty());
        assert_eq!(registry.unregister_connection(id), Some("alice".to_string()));
    }

    #[test]
    fn test_stale_connection_teardown_keeps_player() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = connection();
        let (c2, _rx2) = connection();
        let old_id = c1.id();
        let g = game("abc123");

        registry.register("alice", c1);
        registry.join_game("alice", &g);
        registry.register("alice", c2);

        assert_eq!(registry.unregister_connection(old_id), None);
        assert!(registry.is_connected("alice"));
        assert_eq!(registry.members(&g), vec!["alice".to_string()]);
    }

    #[test]
    fn test_rebinding_connection_releases_previous_player() {
        let registry = ConnectionRegistry::new();
        let (c, _rx) = connection();
        let id = c.id();
        let g = game("g1");

        registry.register("alice", c.clone());
        registry.join_game("alice", &g);
        registry.register("bob", c);
        registry.join_game("bob", &g);

        assert!(!registry.is_connected("alice"));
        assert_eq!(registry.members(&g), vec!["bob".to_string()]);

        assert_eq!(registry.unregister_connection(id), Some("bob".to_string()));
        assert!(!registry.is_connected("alice"));
        assert!(!registry.is_connected("bob"));
        assert!(registry.members(&g).is_empty());
    }

    #[test]
    fn test_connection_teardown_unregisters_owner() {
        let registry = ConnectionRegistry::new();
        let (c1, _rx1) = connection();
        let id = c1.id();
        let g = game("abc123");

        registry.register("bob", c1);
        registry.join_game("bob", &g);

        assert_eq!(registry.unregister_connection(id), Some("bob".to_string()));
        assert!(!registry.is_connected("bob"));
        assert!(registry.members(&g).is_empty());
    }

    #[test]
    fn test_unregister_stops_game_fanout() {
        let registry = ConnectionRegistry::new();
        let (ca, mut rxa) = connection();
        let (cb, mut rxb) = connection();
        let g = game("g1");

        registry.register("a", ca);
        registry.register("b", cb);
        registry.join_game("a", &g);
        registry.join_game("b", &g);
        registry.unregister("a");
        registry.send_to_game(&g, &json!({"message": "game_state"}));

        assert!(drain(&mut rxa).is_empty());
        assert_eq!(drain(&mut rxb).len(), 1);
    }

    #[test]
    fn test_join_game_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (c, mut rx) = connection();
        let g = game("g1");

        registry.register("a", c);
        registry.join_game("a", &g);
        registry.join_game("a", &g);
        registry.send_to_game(&g, &json!({"n": 1}));

        assert_eq!(registry.members(&g), vec!["a".to_string()]);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_membership_without_connection() {
        let registry = ConnectionRegistry::new();
        let g = game("g1");
        registry.join_game("offline", &g);
        registry.send_to_game(&g, &json!({"n": 1}));
        assert_eq!(registry.members(&g), vec!["offline".to_string()]);
    }

    #[test]
    fn test_send_to_closed_receiver_is_swallowed() {
        let registry = ConnectionRegistry::new();
        let (c, rx) = connection();
        let g = game("g1");
        registry.register("a", c);
        registry.join_game("a", &g);
        drop(rx);

        registry.send_to_player("a", &json!({"n": 1}));
        registry.send_to_game(&g, &json!({"n": 2}));
        assert!(registry.is_connected("a"));
    }
}
