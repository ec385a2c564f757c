use std::sync::Arc;
use tracing::warn;

use crate::orchestrator::Orchestrator;
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use game_core::SessionError;
use game_types::{ClientMessage, Icon, ServerMessage};

/// Per-connection dispatch of client intents. State violations come back
/// as `Error{Message}` to this connection only; the state machine never
/// moves on an error.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    orchestrator: Arc<Orchestrator>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            orchestrator,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        let result = match message {
            ClientMessage::PlayerDetailsResp { name, icon } => {
                self.handle_register(name, icon).await
            }
            ClientMessage::PlayerResponse { response } => {
                self.orchestrator
                    .submit_response(self.connection_id, &response)
                    .await
            }
        };

        if let Err(error) = result {
            self.send_error(error).await;
        }
    }

    pub async fn handle_disconnect(&self) {
        self.orchestrator.handle_disconnect(self.connection_id).await;
    }

    async fn handle_register(&self, name: String, icon: String) -> Result<(), SessionError> {
        // The client validated these already; re-validate anyway, it is
        // not trusted
        let icon = icon
            .parse::<Icon>()
            .map_err(|_| SessionError::UnknownIcon(icon))?;
        self.orchestrator
            .register(self.connection_id, &name, icon)
            .await
    }

    async fn send_error(&self, error: SessionError) {
        warn!(connection = %self.connection_id, %error, "rejected client intent");
        let _ = self
            .connection_manager
            .send_to_connection(
                self.connection_id,
                ServerMessage::Error {
                    message: error.to_string(),
                },
            )
            .await;
    }
}
