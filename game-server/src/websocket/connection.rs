use game_types::ServerMessage;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One live WebSocket, with the outgoing half modeled as an unbounded
/// channel so game logic never blocks on a slow socket.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub player_index: Option<usize>,
    pub connected_at: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            player_index: None,
            connected_at: Instant::now(),
            sender,
        };
        (connection, receiver)
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }
}

/// Registry of live connections and their player bindings. A connection
/// starts anonymous and gains a player index once its registration is
/// accepted; the binding is dropped with the connection, the player is not.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    player_to_connection: RwLock<HashMap<usize, ConnectionId>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            player_to_connection: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (connection, receiver) = Connection::new(id);
        let mut connections = self.connections.write().await;
        connections.insert(id, connection);
        receiver
    }

    /// Removes the connection and returns the player index it was bound to,
    /// if any, so the caller can mark that player disconnected.
    pub async fn remove_connection(&self, id: ConnectionId) -> Option<usize> {
        let player_index = {
            let mut connections = self.connections.write().await;
            connections.remove(&id).and_then(|conn| conn.player_index)
        };

        if let Some(index) = player_index {
            let mut player_to_connection = self.player_to_connection.write().await;
            player_to_connection.remove(&index);
        }

        player_index
    }

    pub async fn bind_player(&self, id: ConnectionId, player_index: usize) {
        {
            let mut connections = self.connections.write().await;
            if let Some(connection) = connections.get_mut(&id) {
                connection.player_index = Some(player_index);
            }
        }
        let mut player_to_connection = self.player_to_connection.write().await;
        player_to_connection.insert(player_index, id);
    }

    pub async fn player_of(&self, id: ConnectionId) -> Option<usize> {
        let connections = self.connections.read().await;
        connections.get(&id).and_then(|conn| conn.player_index)
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        match connections.get(&id) {
            Some(connection) => connection.send_message(message),
            None => Err("Connection not found".to_string()),
        }
    }

    pub async fn send_to_player(&self, player_index: usize, message: ServerMessage) {
        let connection_id = {
            let player_to_connection = self.player_to_connection.read().await;
            player_to_connection.get(&player_index).copied()
        };

        if let Some(id) = connection_id {
            // A closed channel here just means the player raced a disconnect
            let _ = self.send_to_connection(id, message).await;
        }
    }

    /// Sends to every live connection, bound or not; spectators waiting in
    /// the lobby see the same event stream as players.
    pub async fn broadcast(&self, message: ServerMessage) {
        let connections = self.connections.read().await;
        for connection in connections.values() {
            let _ = connection.send_message(message.clone());
        }
    }

    // Test helper
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
