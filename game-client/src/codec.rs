use game_types::{ClientMessage, ServerMessage};
use tracing::warn;

/// Decodes one frame off the wire. Malformed JSON, unknown tags and
/// multiply-tagged objects are protocol violations: logged and swallowed,
/// never fatal to the connection.
pub fn decode_server_message(text: &str) -> Option<ServerMessage> {
    match serde_json::from_str(text) {
        Ok(message) => Some(message),
        Err(error) => {
            warn!(%error, frame = text, "ignoring unrecognized server message");
            None
        }
    }
}

/// Encodes an intent for the wire. Serialization of these closed types
/// cannot fail in practice; a failure here is a bug worth surfacing.
pub fn encode_client_message(message: &ClientMessage) -> String {
    serde_json::to_string(message).expect("client messages always serialize")
}
