use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{AnswerIndex, Icon, PlayerState};

/// Client->server intents. One JSON object per message with exactly one
/// top-level key; serde's externally tagged representation enforces the
/// single-tag rule at decode time.
///
/// `Icon` and `Response` stay raw strings here so a bad value is a state
/// violation answered with `Error`, not a dropped frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ClientMessage {
    #[serde(rename_all = "PascalCase")]
    PlayerDetailsResp { name: String, icon: String },
    #[serde(rename_all = "PascalCase")]
    PlayerResponse { response: String },
}

/// Server->client events, broadcast to every connection in the session
/// except `Welcome`, `Error` and `PlayerResult`, which are per-connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServerMessage {
    #[serde(rename_all = "PascalCase")]
    Welcome { target_score: u32 },
    #[serde(rename_all = "PascalCase")]
    Error { message: String },
    #[serde(rename_all = "PascalCase")]
    AboutToStart { seconds: u32 },
    #[serde(rename_all = "PascalCase")]
    PresentQuestion {
        round: u32,
        word_to_guess: String,
        definitions: Vec<String>,
    },
    #[serde(rename_all = "PascalCase")]
    PlayerResult {
        correct: bool,
        #[ts(type = "string")]
        correct_answer: AnswerIndex,
    },
    #[serde(rename_all = "PascalCase")]
    RoundSummary { player_states: Vec<PlayerState> },
    #[serde(rename_all = "PascalCase")]
    Summary { winner: String, icon: Icon },
}
