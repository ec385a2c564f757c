use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};
use warp::ws::{Message, WebSocket};

use crate::orchestrator::Orchestrator;
use game_types::ClientMessage;

pub mod connection;
pub mod handlers;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;

pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    orchestrator: Arc<Orchestrator>,
) {
    let connection_id = ConnectionId::new();
    info!("New WebSocket connection: {}", connection_id);

    let (mut ws_sender, mut ws_receiver) = websocket.split();

    // Create connection and get receiver for outgoing messages
    let message_receiver = connection_manager.create_connection(connection_id).await;

    let message_handler = MessageHandler::new(
        connection_id,
        connection_manager.clone(),
        orchestrator.clone(),
    );

    // Handle incoming messages
    let incoming_handler = {
        let message_handler = message_handler.clone();
        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => handle_frame(msg, &message_handler, connection_id).await,
                    Err(e) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }
        }
    };

    // Handle outgoing messages
    let outgoing_handler = {
        async move {
            let mut receiver = message_receiver;

            while let Some(message) = receiver.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize message: {:?}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(Message::text(json)).await {
                    warn!("Failed to send message to {}: {:?}", connection_id, e);
                    break;
                }
            }
        }
    };

    // Run both handlers concurrently
    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
    }

    // Cleanup: the handler removes the connection and flags the player
    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
}

/// Decodes and dispatches one frame. Protocol violations (malformed JSON,
/// unknown or multiply-tagged messages) are dropped with a log line; the
/// connection stays open.
async fn handle_frame(msg: Message, message_handler: &MessageHandler, connection_id: ConnectionId) {
    if !msg.is_text() {
        return;
    }

    let Ok(text) = msg.to_str() else {
        return;
    };

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => message_handler.handle_message(client_message).await,
        Err(error) => {
            warn!(%connection_id, %error, "dropping unrecognized message");
        }
    }
}
