//! Fan-out of server events to the WebSocket connections of a room.

use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    dto::event::ServerEvent,
    state::{ConnectionId, SharedState},
};

/// Serialize a payload and push it onto a connection's writer channel.
///
/// Serialization failure is a permanent error (bug in code); it is logged and
/// swallowed. A closed writer channel is reported so the caller can drop the
/// connection from the roster.
pub fn send_to_connection(
    tx: &mpsc::UnboundedSender<Message>,
    event: &ServerEvent,
) -> Result<(), ()> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize event `{event:?}`, dropping it");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

/// Send one event to every connection in a room.
///
/// Connections whose writer channel is closed are removed from the roster;
/// their identifiers are returned for logging.
pub fn broadcast(state: &SharedState, room_id: &str, event: &ServerEvent) -> Vec<ConnectionId> {
    let mut dead = Vec::new();
    for connection in state.room_connections(room_id) {
        if send_to_connection(&connection.tx, event).is_err() {
            dead.push(connection.id);
        }
    }
    for id in &dead {
        state.connections().remove(id);
        debug!(connection = %id, room = %room_id, "dropped unreachable connection");
    }
    dead
}

/// Broadcast a base event, substituting a per-player override where one exists.
///
/// Used when one player must see more than the room does, like the drawer
/// receiving the secret word inside an otherwise identical announcement.
pub fn send_differentiated(
    state: &SharedState,
    room_id: &str,
    base: &ServerEvent,
    overrides: &HashMap<String, ServerEvent>,
) -> Vec<ConnectionId> {
    let mut dead = Vec::new();
    for connection in state.room_connections(room_id) {
        let event = overrides.get(&connection.player_id).unwrap_or(base);
        if send_to_connection(&connection.tx, event).is_err() {
            dead.push(connection.id);
        }
    }
    for id in &dead {
        state.connections().remove(id);
        debug!(connection = %id, room = %room_id, "dropped unreachable connection");
    }
    dead
}

/// Send one event to every connection a player holds in a room.
pub fn send_to_player(state: &SharedState, room_id: &str, player_id: &str, event: &ServerEvent) {
    for connection in state.room_connections(room_id) {
        if connection.player_id == player_id && send_to_connection(&connection.tx, event).is_err() {
            state.connections().remove(&connection.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::{AppState, PlayerConnection}};
    use uuid::Uuid;

    fn connect(
        state: &SharedState,
        room: &str,
        player: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state.connections().insert(
            id,
            PlayerConnection {
                id,
                player_id: player.to_string(),
                room_id: room.to_string(),
                owner: false,
                tx,
            },
        );
        (id, rx)
    }

    #[tokio::test]
    async fn broadcast_evicts_closed_connections() {
        let state = AppState::new(AppConfig::default());
        let (_a, mut rx_a) = connect(&state, "room", "alice");
        let (b, rx_b) = connect(&state, "room", "bob");
        let (_c, mut rx_c) = connect(&state, "other", "carol");
        drop(rx_b);

        let event = ServerEvent::ActionRejected {
            code: "wrong_answer".to_string(),
            message: "nope".to_string(),
        };
        let dead = broadcast(&state, "room", &event);

        assert_eq!(dead, vec![b]);
        assert!(!state.connections().contains_key(&b));
        assert!(rx_a.try_recv().is_ok());
        // Other rooms are untouched.
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn differentiated_broadcast_substitutes_per_player() {
        let state = AppState::new(AppConfig::default());
        let (_a, mut rx_a) = connect(&state, "room", "alice");
        let (_b, mut rx_b) = connect(&state, "room", "bob");

        let base = ServerEvent::ActionRejected {
            code: "base".to_string(),
            message: String::new(),
        };
        let mut overrides = HashMap::new();
        overrides.insert(
            "bob".to_string(),
            ServerEvent::ActionRejected {
                code: "special".to_string(),
                message: String::new(),
            },
        );
        send_differentiated(&state, "room", &base, &overrides);

        let Some(Message::Text(alice_payload)) = rx_a.try_recv().ok() else {
            panic!("alice received nothing");
        };
        let Some(Message::Text(bob_payload)) = rx_b.try_recv().ok() else {
            panic!("bob received nothing");
        };
        assert!(alice_payload.contains("base"));
        assert!(bob_payload.contains("special"));
    }
}
